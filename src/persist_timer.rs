use std::time::{Duration, Instant};

/// Single cancelable debounce deadline; scheduling again replaces it.
#[derive(Debug)]
pub struct PersistTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl PersistTimer {
    pub fn new(delay: Duration) -> PersistTimer {
        PersistTimer {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

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

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut timer = PersistTimer::new(DELAY);
        timer.schedule(start);
        assert!(!timer.take_due(start + Duration::from_millis(999)));
        assert!(timer.take_due(start + DELAY));
        assert!(!timer.take_due(start + DELAY * 2));
        assert!(!timer.is_scheduled());
    }

    #[test]
    fn test_reschedule_replaces_deadline() {
        let start = Instant::now();
        let mut timer = PersistTimer::new(DELAY);
        timer.schedule(start);
        timer.schedule(start + Duration::from_millis(600));
        assert!(!timer.take_due(start + DELAY));
        assert!(timer.take_due(start + Duration::from_millis(1600)));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut timer = PersistTimer::new(DELAY);
        timer.schedule(start);
        timer.cancel();
        assert_eq!(timer.deadline(), None);
        assert!(!timer.take_due(start + DELAY));
    }
}
