use crate::stat::{LeapArray, MetricTrait};
use crate::utils::curr_time_millis;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Completion counters of one window span of a breaker: how many calls
/// finished, and how many of them tripped the rule's condition (a traced
/// error or a slow response, depending on the strategy).
#[derive(Debug, Default)]
pub struct OutcomeBucket {
    tripping: AtomicU64,
    finished: AtomicU64,
}

impl MetricTrait for OutcomeBucket {
    fn reset(&self) {
        self.tripping.store(0, Ordering::SeqCst);
        self.finished.store(0, Ordering::SeqCst);
    }
}

impl OutcomeBucket {
    pub fn record(&self, tripped: bool) {
        if tripped {
            self.tripping.fetch_add(1, Ordering::SeqCst);
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    pub fn tripping(&self) -> u64 {
        self.tripping.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }
}

/// The sliding outcome window every breaker judges its rule against.
pub type OutcomeLeapArray = LeapArray<OutcomeBucket>;

impl OutcomeLeapArray {
    /// Records one completed call into the bucket of the current instant.
    pub fn record_completion(&self, tripped: bool) -> Result<()> {
        self.current_slot()?.metric().record(tripped);
        Ok(())
    }

    /// `(tripping, finished)` summed over the valid window.
    pub fn window_totals(&self) -> (u64, u64) {
        self.fold_valid(curr_time_millis(), (0, 0), |(tripping, finished), bucket| {
            (tripping + bucket.tripping(), finished + bucket.finished())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_and_total() {
        let stat = OutcomeLeapArray::new(2, 10000).unwrap();
        stat.record_completion(false).unwrap();
        stat.record_completion(true).unwrap();
        stat.record_completion(true).unwrap();
        assert_eq!(stat.window_totals(), (2, 3));
    }

    #[test]
    fn clear_empties_the_window() {
        let stat = OutcomeLeapArray::new(2, 10000).unwrap();
        stat.record_completion(true).unwrap();
        stat.clear();
        assert_eq!(stat.window_totals(), (0, 0));
    }

    #[test]
    fn bucket_reset() {
        let bucket = OutcomeBucket::default();
        bucket.record(true);
        bucket.record(false);
        bucket.reset();
        assert_eq!(bucket.tripping(), 0);
        assert_eq!(bucket.finished(), 0);
    }
}
