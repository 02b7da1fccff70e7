//! Remaining-time estimation with a warm-up period
//!
//! Tiles finishing right after the monitor starts are mostly tiles that were
//! already in flight, which would inflate the rate. The first `warmup` tiles
//! are skipped and the rate is measured from the moment they are done.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct EtaEstimator {
    warmup: usize,
    first_seen: Option<usize>,
    baseline: Option<(Instant, usize)>,
}

impl EtaEstimator {
    pub fn new(warmup: usize) -> Self {
        Self {
            warmup,
            first_seen: None,
            baseline: None,
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Record an observation and return the estimated time remaining
    ///
    /// `None` until the warm-up is over and at least one tile has finished
    /// since the baseline.
    pub fn observe(&mut self, processed: usize, total: usize, now: Instant) -> Option<Duration> {
        let first = *self.first_seen.get_or_insert(processed);

        if self.baseline.is_none() && processed >= first + self.warmup {
            self.baseline = Some((now, processed));
        }

        let (since, at) = self.baseline?;
        let done = processed.checked_sub(at).filter(|d| *d > 0)?;
        let remaining = total.saturating_sub(processed);
        let per_tile = now.saturating_duration_since(since).as_secs_f64() / done as f64;

        Some(Duration::from_secs_f64(per_tile * remaining as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_during_warmup() {
        let mut eta = EtaEstimator::new(10);
        let t0 = Instant::now();
        assert_eq!(eta.observe(5, 100, t0), None);
        assert_eq!(eta.observe(14, 100, t0 + Duration::from_secs(60)), None);
        assert!(!eta.has_baseline());
    }

    #[test]
    fn test_rate_measured_from_baseline() {
        let mut eta = EtaEstimator::new(10);
        let t0 = Instant::now();
        eta.observe(0, 100, t0);

        // Warm-up done after a burst of in-flight tiles
        assert_eq!(eta.observe(10, 100, t0 + Duration::from_secs(10)), None);
        assert!(eta.has_baseline());

        // 10 more tiles in 100s -> 10s per tile, 80 left
        let remaining = eta.observe(20, 100, t0 + Duration::from_secs(110)).unwrap();
        assert_eq!(remaining.as_secs(), 800);
    }

    #[test]
    fn test_zero_warmup() {
        let mut eta = EtaEstimator::new(0);
        let t0 = Instant::now();
        assert_eq!(eta.observe(50, 100, t0), None);
        let remaining = eta.observe(60, 100, t0 + Duration::from_secs(20)).unwrap();
        assert_eq!(remaining.as_secs(), 80);
    }

    #[test]
    fn test_finished() {
        let mut eta = EtaEstimator::new(0);
        let t0 = Instant::now();
        eta.observe(0, 10, t0);
        let remaining = eta.observe(10, 10, t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(remaining, Duration::ZERO);
    }
}
