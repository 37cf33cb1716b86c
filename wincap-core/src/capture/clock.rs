//! Capture-relative clock
//!
//! Video and audio arrive from unrelated OS timers. Both are expressed as
//! time elapsed since `start()` so the muxer can align them.

use parking_lot::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct CaptureClock {
    start: RwLock<Instant>,
}

impl CaptureClock {
    pub fn new() -> Self {
        Self {
            start: RwLock::new(Instant::now()),
        }
    }

    /// Restart the clock at "now"
    pub fn reset(&self) {
        *self.start.write() = Instant::now();
    }

    pub fn start_instant(&self) -> Instant {
        *self.start.read()
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.start.read().elapsed()
    }

    /// Convert an absolute instant to capture-relative time.
    /// Instants before the start map to zero.
    pub fn relative(&self, at: Instant) -> Duration {
        at.saturating_duration_since(*self.start.read())
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_before_start_is_zero() {
        let before = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let clock = CaptureClock::new();
        assert_eq!(clock.relative(before), Duration::ZERO);
    }

    #[test]
    fn test_reset_moves_start_forward() {
        let clock = CaptureClock::new();
        let first = clock.start_instant();
        std::thread::sleep(Duration::from_millis(2));
        clock.reset();
        assert!(clock.start_instant() > first);
        assert!(clock.elapsed() < Duration::from_secs(1));
    }
}
