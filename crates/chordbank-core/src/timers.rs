//! Timer abstraction used by the scheduler session.
//!
//! The session decides *what* each timer means and keeps the armed set; a
//! host only knows how to wake the session up after a delay. Browser
//! front-ends back this with `setTimeout`, while tests and the native player
//! use [`VirtualTimers`], a manually advanced clock.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use fnv::FnvHashSet;

use crate::error::TimerError;

/// Session-unique timer identifier. Never reused within a process run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

pub trait TimerHost {
    /// Arrange for the session's `on_timer(id)` to run after `delay`.
    fn arm(&mut self, id: TimerId, delay: Duration) -> Result<(), TimerError>;

    /// Prevent a previously armed timer from firing. Unknown ids are ignored.
    fn cancel(&mut self, id: TimerId);

    /// Called by the session once a timer has been delivered.
    fn acknowledge(&mut self, _id: TimerId) {}
}

/// Deterministic timer queue driven by explicit clock advances.
#[derive(Debug, Default)]
pub struct VirtualTimers {
    now: Duration,
    seq: u64,
    queue: BinaryHeap<Reverse<(Duration, u64, TimerId)>>,
    live: FnvHashSet<TimerId>,
}

impl VirtualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of timers armed and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Pop the earliest live timer due at or before `until`, moving the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerId> {
        while let Some(Reverse((due, _, id))) = self.queue.peek().copied() {
            if due > until {
                return None;
            }
            self.queue.pop();
            if self.live.remove(&id) {
                self.now = self.now.max(due);
                return Some(id);
            }
        }
        None
    }

    /// Move the clock forward without firing anything. Time never runs backwards.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl TimerHost for VirtualTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) -> Result<(), TimerError> {
        let due = self.now + delay;
        self.seq += 1;
        self.queue.push(Reverse((due, self.seq, id)));
        self.live.insert(id);
        Ok(())
    }

    fn cancel(&mut self, id: TimerId) {
        self.live.remove(&id);
    }
}
