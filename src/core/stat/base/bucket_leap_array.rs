use super::{LeapArray, MetricBucket};
use crate::base::{MetricEvent, WriteStat, DEFAULT_STATISTIC_MAX_RT};
use crate::utils::curr_time_millis;
use crate::Result;
use std::cmp;

/// a specialization of `LeapArray<T>` with `MetricBucket`
pub type BucketLeapArray = LeapArray<MetricBucket>;

impl WriteStat for BucketLeapArray {
    fn add_count(&self, event: MetricEvent, count: u64) {
        // slot_for only fails on a clock running backwards
        let _ = self.add_count_with_time(curr_time_millis(), event, count);
    }
}

impl BucketLeapArray {
    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) -> Result<()> {
        self.slot_for(now)?.metric().add(event, count);
        Ok(())
    }

    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.fold_valid(now, 0, |acc, bucket| acc + bucket.get(event))
    }

    /// Count of the given event in the bucket one span back.
    pub fn count_previous(&self, event: MetricEvent) -> u64 {
        self.previous_slot(curr_time_millis())
            .map(|slot| slot.metric().get(event))
            .unwrap_or(0)
    }

    /// The largest per-bucket count of the given event in the valid window.
    pub fn max_of_single_bucket(&self, event: MetricEvent) -> u64 {
        self.fold_valid(curr_time_millis(), 0, |acc, bucket| {
            cmp::max(acc, bucket.get(event))
        })
    }

    pub fn min_rt(&self) -> u64 {
        self.fold_valid(curr_time_millis(), DEFAULT_STATISTIC_MAX_RT, |acc, bucket| {
            cmp::min(acc, bucket.min_rt())
        })
    }
}
