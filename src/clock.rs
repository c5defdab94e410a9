use std::thread;
use std::time::Duration;

/// Where simulated latency is spent.
pub trait Clock {
    /// Blocks the caller for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Real time: every simulated delay blocks the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Records requested delays instead of sleeping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordingClock {
    pub delays: Vec<Duration>,
}

impl RecordingClock {
    pub fn last(&self) -> Option<Duration> {
        self.delays.last().copied()
    }

    pub fn clear(&mut self) {
        self.delays.clear();
    }
}

impl Clock for RecordingClock {
    fn sleep(&mut self, duration: Duration) {
        self.delays.push(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, RecordingClock, ThreadClock};
    use std::time::{Duration, Instant};

    #[test]
    fn thread_clock_blocks() {
        let start = Instant::now();
        ThreadClock.sleep(Duration::from_millis(2));
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn recording_clock_keeps_every_delay() {
        let mut clock = RecordingClock::default();
        clock.sleep(Duration::from_millis(1));
        clock.sleep(Duration::from_micros(500));
        assert_eq!(clock.delays.len(), 2);
        assert_eq!(clock.delays[0], Duration::from_millis(1));
        assert_eq!(clock.last(), Some(Duration::from_micros(500)));
    }
}
