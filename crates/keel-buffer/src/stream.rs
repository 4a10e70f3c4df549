//! FIFO byte buffer with exact-capacity storage.

use std::fmt;
use std::io;

use parking_lot::Mutex;
use tracing::trace;

/// A growable FIFO byte buffer whose storage never carries unused capacity.
///
/// Every `write` reallocates storage to `old_len + written` and every `read`
/// reallocates it to hold only the unread suffix, so the allocated size is
/// always the number of unread bytes. This trades a copy per operation for
/// bounded retention, which suits short protocol fragments staged per
/// connection rather than bulk transfer.
///
/// All operations take the same mutex, so a concurrent `read` never observes
/// a partially applied `write`.
///
/// The buffer is always open: [`close`](Self::close) does nothing, since the
/// lifecycle of the owning connection is managed elsewhere.
pub struct ByteStreamBuffer {
    storage: Mutex<Box<[u8]>>,
}

impl ByteStreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            storage: Mutex::new(Box::default()),
        }
    }

    /// Append `bytes` to the end of the stream.
    ///
    /// Returns the number of bytes accepted, which is always `bytes.len()`.
    pub fn write(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }

        let mut storage = self.storage.lock();
        let mut grown = Vec::with_capacity(storage.len() + bytes.len());
        grown.extend_from_slice(&storage);
        grown.extend_from_slice(bytes);
        *storage = grown.into_boxed_slice();

        trace!(written = bytes.len(), size = storage.len(), "buffer write");
        bytes.len()
    }

    /// Remove and return up to `capacity` bytes from the front of the stream.
    ///
    /// Returns exactly `min(capacity, size())` bytes. Reading an empty
    /// buffer yields an empty vector.
    pub fn read(&self, capacity: usize) -> Vec<u8> {
        let mut storage = self.storage.lock();
        let count = capacity.min(storage.len());
        if count == 0 {
            return Vec::new();
        }

        let head = storage[..count].to_vec();
        *storage = Box::from(&storage[count..]);

        trace!(read = count, size = storage.len(), "buffer read");
        head
    }

    /// Fill `dst` from the front of the stream, returning the byte count.
    pub fn read_into(&self, dst: &mut [u8]) -> usize {
        let mut storage = self.storage.lock();
        let count = dst.len().min(storage.len());
        if count == 0 {
            return 0;
        }

        dst[..count].copy_from_slice(&storage[..count]);
        *storage = Box::from(&storage[count..]);

        trace!(read = count, size = storage.len(), "buffer read");
        count
    }

    /// Number of unread bytes.
    pub fn size(&self) -> usize {
        self.storage.lock().len()
    }

    /// Check if there are no unread bytes.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Copy of the unread bytes, leaving the stream untouched.
    pub fn snapshot(&self) -> Vec<u8> {
        self.storage.lock().to_vec()
    }

    /// Discard every held byte.
    pub fn reset(&self) {
        *self.storage.lock() = Box::default();
    }

    /// Always `true`.
    pub fn is_open(&self) -> bool {
        true
    }

    /// No-op.
    pub fn close(&self) {}
}

impl Default for ByteStreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ByteStreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStreamBuffer")
            .field("size", &self.size())
            .finish()
    }
}

impl fmt::Display for ByteStreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteStreamBuffer[size={}]", self.size())
    }
}

impl io::Read for &ByteStreamBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf))
    }
}

impl io::Write for &ByteStreamBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ByteStreamBuffer::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for ByteStreamBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf))
    }
}

impl io::Write for ByteStreamBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ByteStreamBuffer::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
