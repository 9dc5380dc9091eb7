//! Rate-limited pointer sampling.
//!
//! Pointer movement arrives in bursts. Samples are accepted at most once per
//! throttle window: the first sample of a window is taken immediately, later
//! ones replace a pending value that becomes current once the window closes.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::types::Point;

#[derive(Debug, Default)]
struct Samples {
    position: Point,
    accepted_at: Option<Instant>,
    pending: Option<Point>,
}

#[derive(Debug)]
pub struct PointerTracker {
    interval: Duration,
    samples: Mutex<Samples>,
}

impl PointerTracker {
    pub fn new(interval: Duration) -> Self {
        PointerTracker {
            interval,
            samples: Mutex::new(Samples::default()),
        }
    }

    /// Record a screen-space sample. Returns whether it became current
    /// immediately.
    pub fn record(&self, point: Point) -> bool {
        self.record_at(point, Instant::now())
    }

    pub fn record_at(&self, point: Point, now: Instant) -> bool {
        let mut samples = self.samples();
        self.promote_pending(&mut samples, now);
        match samples.accepted_at {
            Some(at) if now.duration_since(at) < self.interval => {
                samples.pending = Some(point);
                false
            }
            _ => {
                samples.position = point;
                samples.accepted_at = Some(now);
                samples.pending = None;
                true
            }
        }
    }

    /// The last accepted sample.
    pub fn position(&self) -> Point {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> Point {
        let mut samples = self.samples();
        self.promote_pending(&mut samples, now);
        samples.position
    }

    /// A pending sample becomes current at the end of its window.
    fn promote_pending(&self, samples: &mut Samples, now: Instant) {
        let (Some(pending), Some(at)) = (samples.pending, samples.accepted_at) else {
            return;
        };
        let window_end = at + self.interval;
        if now >= window_end {
            samples.position = pending;
            samples.accepted_at = Some(window_end);
            samples.pending = None;
        }
    }

    fn samples(&self) -> MutexGuard<'_, Samples> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn first_sample_is_taken_immediately() {
        let tracker = PointerTracker::new(WINDOW);
        let t0 = Instant::now();
        assert!(tracker.record_at(Point::new(5.0, 6.0), t0));
        assert_eq!(tracker.position_at(t0), Point::new(5.0, 6.0));
    }

    #[test]
    fn bursts_are_coalesced_to_the_latest_sample() {
        let tracker = PointerTracker::new(WINDOW);
        let t0 = Instant::now();
        tracker.record_at(Point::new(1.0, 1.0), t0);
        for i in 1..=5 {
            let accepted = tracker.record_at(
                Point::new(10.0 * i as f64, 0.0),
                t0 + Duration::from_millis(20 * i),
            );
            assert!(!accepted);
        }
        assert_eq!(tracker.position_at(t0 + Duration::from_millis(150)), Point::new(1.0, 1.0));
        assert_eq!(tracker.position_at(t0 + WINDOW), Point::new(50.0, 0.0));
    }

    #[test]
    fn trailing_sample_opens_the_next_window() {
        let tracker = PointerTracker::new(WINDOW);
        let t0 = Instant::now();
        tracker.record_at(Point::new(1.0, 1.0), t0);
        tracker.record_at(Point::new(2.0, 2.0), t0 + Duration::from_millis(100));
        // Promoted at t0+200, so a sample at t0+300 is still inside its window.
        assert!(!tracker.record_at(Point::new(3.0, 3.0), t0 + Duration::from_millis(300)));
        assert_eq!(tracker.position_at(t0 + Duration::from_millis(300)), Point::new(2.0, 2.0));
        // (3,3) is promoted at t0+400 and (4,4) waits for t0+600.
        assert!(!tracker.record_at(Point::new(4.0, 4.0), t0 + Duration::from_millis(450)));
        assert_eq!(tracker.position_at(t0 + Duration::from_millis(450)), Point::new(3.0, 3.0));
        assert_eq!(tracker.position_at(t0 + Duration::from_millis(600)), Point::new(4.0, 4.0));
        assert!(tracker.record_at(Point::new(5.0, 5.0), t0 + Duration::from_millis(900)));
    }
}
