use std::time::{Duration, Instant};

/// Decides when the active query is re-fetched in the background.
///
/// A poll is due once the interval has elapsed since the last one, but never
/// inside the quiet period that follows a local mutation.
pub struct PollingScheduler {
    interval: Duration,
    quiet_period: Duration,
    next_poll: Instant,
    quiet_until: Option<Instant>,
}

impl PollingScheduler {
    pub fn new(interval: Duration, quiet_period: Duration, now: Instant) -> Self {
        Self {
            interval,
            quiet_period,
            next_poll: now + interval,
            quiet_until: None,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        now >= self.next_poll && self.quiet_until.map_or(true, |quiet| now >= quiet)
    }

    pub fn note_mutation(&mut self, now: Instant) {
        self.quiet_until = Some(now + self.quiet_period);
    }

    pub fn mark_polled(&mut self, now: Instant) {
        self.next_poll = now + self.interval;
    }

    /// Restart the interval, e.g. after the active query changed.
    pub fn reset(&mut self, now: Instant) {
        self.next_poll = now + self.interval;
    }

    pub fn next_poll(&self) -> Instant {
        match self.quiet_until {
            Some(quiet) if quiet > self.next_poll => quiet,
            _ => self.next_poll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_after_interval() {
        let t0 = Instant::now();
        let scheduler = PollingScheduler::new(Duration::from_secs(60), Duration::from_secs(3), t0);
        assert!(!scheduler.due(t0 + Duration::from_secs(59)));
        assert!(scheduler.due(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_mutation_defers_poll() {
        let t0 = Instant::now();
        let mut scheduler =
            PollingScheduler::new(Duration::from_secs(60), Duration::from_secs(3), t0);
        scheduler.note_mutation(t0 + Duration::from_secs(59));

        assert!(!scheduler.due(t0 + Duration::from_secs(61)));
        assert!(scheduler.due(t0 + Duration::from_secs(62)));
        assert_eq!(scheduler.next_poll(), t0 + Duration::from_secs(62));
    }

    #[test]
    fn test_mark_polled_restarts_interval() {
        let t0 = Instant::now();
        let mut scheduler =
            PollingScheduler::new(Duration::from_secs(60), Duration::from_secs(3), t0);
        let t1 = t0 + Duration::from_secs(60);
        scheduler.mark_polled(t1);
        assert!(!scheduler.due(t1 + Duration::from_secs(30)));
        assert!(scheduler.due(t1 + Duration::from_secs(60)));
    }
}
