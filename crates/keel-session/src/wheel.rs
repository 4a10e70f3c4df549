//! Hashed timing wheel for periodic tasks.
//!
//! A task added with a delay of `N` ticks fires every `N` ticks until it is
//! cancelled. One tick is one second when driven by [`TimingWheel::spawn`];
//! [`TimingWheel::tick`] advances the wheel by hand.

use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::DEFAULT_WHEEL_SLOTS;
use crate::error::Result;

/// Wall-clock length of one tick.
pub const TICK: Duration = Duration::from_secs(1);

/// A cancellable unit of work fired by a [`Scheduler`].
pub trait WheelTask: Send + Sync {
    /// Execute one firing.
    fn run(&self) -> Result<()>;

    /// Stop future firings. Idempotent.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// Periodic executor that fires a task every `delay_ticks` ticks.
pub trait Scheduler: Send + Sync {
    /// Arm `task` to fire after `delay_ticks`, then again every
    /// `delay_ticks` until it cancels.
    fn add_task(&self, task: Arc<dyn WheelTask>, delay_ticks: u64) -> Result<()>;
}

struct Entry {
    task: Arc<dyn WheelTask>,
    interval: u64,
    /// Full revolutions left before the entry is due.
    rounds: u64,
}

struct WheelState {
    slots: Vec<Vec<Entry>>,
    cursor: usize,
}

impl WheelState {
    fn place(&mut self, task: Arc<dyn WheelTask>, interval: u64) {
        let len = self.slots.len() as u64;
        let slot = ((self.cursor as u64 + interval % len) % len) as usize;
        let rounds = (interval - 1) / len;
        self.slots[slot].push(Entry {
            task,
            interval,
            rounds,
        });
    }
}

/// Hashed timing wheel implementing [`Scheduler`].
pub struct TimingWheel {
    state: Mutex<WheelState>,
}

impl TimingWheel {
    /// Create a wheel with `slots` buckets (at least one).
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            state: Mutex::new(WheelState {
                slots: (0..slots).map(|_| Vec::new()).collect(),
                cursor: 0,
            }),
        }
    }

    /// Number of slots in one revolution.
    pub fn slots(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Number of armed, non-cancelled tasks.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .flatten()
            .filter(|e| !e.task.is_cancelled())
            .count()
    }

    /// Advance the wheel by one tick, firing every task that is due.
    ///
    /// Returns the number of tasks run. Cancelled tasks are dropped when
    /// their slot comes up. Tasks run without the wheel lock held, so they
    /// may add new tasks. A failing task is logged and stays armed.
    pub fn tick(&self) -> usize {
        let due = {
            let mut state = self.state.lock();
            state.cursor = (state.cursor + 1) % state.slots.len();
            let cursor = state.cursor;
            let entries = mem::take(&mut state.slots[cursor]);

            let mut due = Vec::new();
            for mut entry in entries {
                if entry.task.is_cancelled() {
                    continue;
                }
                if entry.rounds > 0 {
                    entry.rounds -= 1;
                    state.slots[cursor].push(entry);
                } else {
                    due.push(entry);
                }
            }
            trace!(cursor = cursor, due = due.len(), "timing wheel tick");
            due
        };

        let mut fired = 0;
        let mut rearm = Vec::with_capacity(due.len());
        for entry in due {
            // Cancellation may land between the slot scan and this firing
            if entry.task.is_cancelled() {
                continue;
            }
            if let Err(e) = entry.task.run() {
                warn!(error = %e, "Timing wheel task failed");
            }
            fired += 1;
            if !entry.task.is_cancelled() {
                rearm.push(entry);
            }
        }

        if !rearm.is_empty() {
            let mut state = self.state.lock();
            for entry in rearm {
                state.place(entry.task, entry.interval);
            }
        }

        fired
    }

    /// Drive the wheel from a tokio interval, one tick per [`TICK`].
    ///
    /// The driver holds only a weak reference and stops once the wheel is
    /// dropped.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let wheel: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(wheel) = wheel.upgrade() else {
                    debug!("Timing wheel dropped, stopping driver");
                    break;
                };
                wheel.tick();
            }
        })
    }
}

impl Default for TimingWheel {
    fn default() -> Self {
        Self::new(DEFAULT_WHEEL_SLOTS)
    }
}

impl Scheduler for TimingWheel {
    fn add_task(&self, task: Arc<dyn WheelTask>, delay_ticks: u64) -> Result<()> {
        let interval = delay_ticks.max(1);
        self.state.lock().place(task, interval);
        trace!(interval = interval, "Task added to timing wheel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTask {
        runs: AtomicUsize,
        cancelled: AtomicBool,
        cancel_after: Option<usize>,
        fail: bool,
    }

    impl WheelTask for CountingTask {
        fn run(&self) -> Result<()> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.cancel_after == Some(runs) {
                self.cancel();
            }
            if self.fail {
                return Err(Error::Store("unavailable".to_string()));
            }
            Ok(())
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    fn tick_n(wheel: &TimingWheel, n: usize) {
        for _ in 0..n {
            wheel.tick();
        }
    }

    #[test]
    fn test_fires_after_delay_then_periodically() {
        let wheel = TimingWheel::new(8);
        let task = Arc::new(CountingTask::default());
        wheel.add_task(task.clone(), 3).unwrap();

        tick_n(&wheel, 2);
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        wheel.tick();
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);

        tick_n(&wheel, 3);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_longer_than_revolution() {
        let wheel = TimingWheel::new(4);
        let task = Arc::new(CountingTask::default());
        wheel.add_task(task.clone(), 10).unwrap();

        tick_n(&wheel, 9);
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        wheel.tick();
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);

        tick_n(&wheel, 10);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_equal_to_revolution() {
        let wheel = TimingWheel::new(4);
        let task = Arc::new(CountingTask::default());
        wheel.add_task(task.clone(), 4).unwrap();

        tick_n(&wheel, 3);
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);
        wheel.tick();
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_delay_treated_as_one_tick() {
        let wheel = TimingWheel::new(4);
        let task = Arc::new(CountingTask::default());
        wheel.add_task(task.clone(), 0).unwrap();

        wheel.tick();
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let wheel = TimingWheel::new(4);
        let task = Arc::new(CountingTask::default());
        wheel.add_task(task.clone(), 1).unwrap();
        assert_eq!(wheel.pending(), 1);

        task.cancel();
        task.cancel();
        assert_eq!(wheel.pending(), 0);

        tick_n(&wheel, 8);
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_self_cancel_stops_firing() {
        let wheel = TimingWheel::new(4);
        let task = Arc::new(CountingTask {
            cancel_after: Some(2),
            ..Default::default()
        });
        wheel.add_task(task.clone(), 1).unwrap();

        tick_n(&wheel, 10);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
        assert_eq!(wheel.pending(), 0);
    }

    #[test]
    fn test_failing_task_stays_armed() {
        let wheel = TimingWheel::new(4);
        let task = Arc::new(CountingTask {
            fail: true,
            ..Default::default()
        });
        wheel.add_task(task.clone(), 1).unwrap();

        tick_n(&wheel, 3);
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);
        assert_eq!(wheel.pending(), 1);
    }

    #[test]
    fn test_slots_clamped() {
        assert_eq!(TimingWheel::new(0).slots(), 1);
        assert_eq!(TimingWheel::default().slots(), DEFAULT_WHEEL_SLOTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_driver_ticks_each_second() {
        let wheel = Arc::new(TimingWheel::new(8));
        let task = Arc::new(CountingTask::default());
        wheel.add_task(task.clone(), 2).unwrap();

        let handle = wheel.spawn();

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);

        handle.abort();
    }
}
