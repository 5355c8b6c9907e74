//! Nullable delay: records requested waits and returns immediately.

use std::cell::RefCell;
use std::time::Duration;

use payout_utils::Delay;

#[derive(Default)]
pub struct NullDelay {
    waits: RefCell<Vec<Duration>>,
}

impl NullDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requested waits in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }

    /// Total time the caller would have slept.
    pub fn total(&self) -> Duration {
        self.waits.borrow().iter().sum()
    }
}

impl Delay for NullDelay {
    async fn sleep(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}
