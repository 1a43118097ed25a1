//! Cancellable deadline for coalescing bursts of work
//!
//! Time is always passed in by the caller so the control loop can drive it
//! from the runtime clock and tests can drive it by hand.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// Cancel any pending deadline and start a fresh quiet period from `now`
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the quiet period has elapsed
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_before_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.schedule(start);
        assert!(!debouncer.take_due(start + Duration::from_millis(499)));
        assert!(debouncer.is_pending());
    }

    #[test]
    fn test_due_once() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.schedule(start);
        assert!(debouncer.take_due(start + Duration::from_millis(500)));
        assert!(!debouncer.take_due(start + Duration::from_millis(900)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_reschedule_pushes_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.schedule(start);
        debouncer.schedule(start + Duration::from_millis(400));
        assert!(!debouncer.take_due(start + Duration::from_millis(600)));
        assert!(debouncer.take_due(start + Duration::from_millis(900)));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.schedule(start);
        debouncer.cancel();
        assert_eq!(debouncer.deadline(), None);
        assert!(!debouncer.take_due(start + Duration::from_secs(1)));
    }
}
