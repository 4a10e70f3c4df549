//! Connection-scoped byte staging buffer.
//!
//! This crate provides [`ByteStreamBuffer`], a FIFO byte container used to
//! accumulate streamed bytes from an I/O reader and drain them from protocol
//! logic with bounded reads:
//! - No slack capacity: storage is always exactly the unread length
//! - Growable on write, compacted on read
//! - Every operation serialized by one mutex
//!
//! # Example
//!
//! ```rust
//! use keel_buffer::ByteStreamBuffer;
//!
//! let buffer = ByteStreamBuffer::new();
//! buffer.write(b"ab");
//! buffer.write(b"cd");
//! assert_eq!(buffer.read(3), b"abc");
//! assert_eq!(buffer.size(), 1);
//! ```

mod stream;

pub use stream::ByteStreamBuffer;
