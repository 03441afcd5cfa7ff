use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Bounded, chronological history of frame-rate samples
///
/// Samples are appended at the back; once the history holds more than
/// `capacity` entries the oldest one is evicted. Not internally synchronized,
/// the owner decides how to share it.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<f64>,
    capacity: usize,
    stats: HistoryStats,
}

/// Counters for history activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    /// Total samples recorded
    pub samples_recorded: u64,
    /// Samples pushed out by newer ones
    pub samples_evicted: u64,
    /// Lowest sample seen since creation
    pub min_sample: Option<f64>,
    /// Highest sample seen since creation
    pub max_sample: Option<f64>,
}

impl SampleHistory {
    /// Create a new history holding at most `capacity` samples
    ///
    /// # Example
    /// ```
    /// use quality_governor::history::SampleHistory;
    ///
    /// let mut history = SampleHistory::new(3);
    /// history.record(60.0);
    /// history.record(30.0);
    /// assert_eq!(history.average(), 45.0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Sample history capacity must be greater than 0");
        }

        debug!("Created sample history with capacity {}", capacity);

        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            stats: HistoryStats::default(),
        }
    }

    /// Append a sample, evicting the oldest one once capacity is exceeded
    pub fn record(&mut self, sample: f64) {
        self.samples.push_back(sample);
        self.stats.samples_recorded += 1;
        self.stats.min_sample = Some(self.stats.min_sample.map_or(sample, |m| m.min(sample)));
        self.stats.max_sample = Some(self.stats.max_sample.map_or(sample, |m| m.max(sample)));

        while self.samples.len() > self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.stats.samples_evicted += 1;
                trace!("Evicted sample {:.1} from history", evicted);
            }
        }

        trace!(
            "Recorded sample {:.1} ({}/{} slots used)",
            sample,
            self.samples.len(),
            self.capacity
        );
    }

    /// Arithmetic mean of the held samples, `0.0` when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently recorded sample
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Held samples, oldest first
    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn stats(&self) -> HistoryStats {
        self.stats
    }

    /// Drop all held samples. Counters are kept.
    pub fn clear(&mut self) {
        debug!("Clearing sample history");
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_creation() {
        let history = SampleHistory::new(10);
        assert_eq!(history.capacity(), 10);
        assert!(history.is_empty());
        assert_eq!(history.average(), 0.0);
        assert_eq!(history.latest(), None);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        SampleHistory::new(0);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut history = SampleHistory::new(4);
        for i in 0..25 {
            history.record(i as f64);
            assert!(history.len() <= 4);
        }
        assert!(history.is_full());
        assert_eq!(history.stats().samples_recorded, 25);
        assert_eq!(history.stats().samples_evicted, 21);
    }

    #[test]
    fn test_average_of_partial_history() {
        let mut history = SampleHistory::new(10);
        history.record(60.0);
        history.record(40.0);
        history.record(20.0);
        assert_eq!(history.average(), 40.0);
        assert_eq!(history.samples(), vec![60.0, 40.0, 20.0]);
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut history = SampleHistory::new(3);
        history.record(0.0);
        history.record(30.0);
        history.record(60.0);
        assert_eq!(history.average(), 30.0);

        history.record(90.0);
        assert_eq!(history.samples(), vec![30.0, 60.0, 90.0]);
        assert_eq!(history.average(), 60.0);
        assert_eq!(history.latest(), Some(90.0));
    }

    #[test]
    fn test_zero_is_a_valid_sample() {
        let mut history = SampleHistory::new(2);
        history.record(0.0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.average(), 0.0);
        assert_eq!(history.stats().min_sample, Some(0.0));
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut history = SampleHistory::new(3);
        history.record(10.0);
        history.record(20.0);
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.stats().samples_recorded, 2);
        assert_eq!(history.stats().max_sample, Some(20.0));
    }
}
