use super::BucketLeapArray;
use crate::{
    base::{ConcurrencyStat, MetricEvent, ReadStat, StatNode, WriteStat},
    config,
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// The sliding-window value object shared by every node kind. It keeps two
/// leap arrays: a short one driving realtime rate decisions and a long one
/// for minute-granularity reporting, plus the in-flight call gauge.
#[derive(Debug)]
pub struct StatisticNode {
    concurrency: AtomicU32,
    /// realtime window, 1 s / 2 buckets by default
    second: Arc<BucketLeapArray>,
    /// minute-level window, 60 s / 60 buckets by default
    minute: Arc<BucketLeapArray>,
}

impl Default for StatisticNode {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticNode {
    pub fn new() -> Self {
        let second = BucketLeapArray::new(
            config::metric_stat_sample_count(),
            config::metric_stat_interval_ms(),
        )
        .unwrap();
        let minute = BucketLeapArray::new(
            config::global_stat_sample_count_total(),
            config::global_stat_interval_ms_total(),
        )
        .unwrap();
        StatisticNode {
            concurrency: AtomicU32::new(0),
            second: Arc::new(second),
            minute: Arc::new(minute),
        }
    }

    fn interval_s(&self) -> f64 {
        self.second.interval_ms() as f64 / 1000.0
    }

    /// Per-second rate of the busiest bucket in the minute-level window.
    /// Feeds the BBR-style capacity estimation of the system slot.
    pub fn max_avg(&self, event: MetricEvent) -> f64 {
        self.minute.max_of_single_bucket(event) as f64 * 1000.0 / self.minute.span_ms() as f64
    }

    pub fn minute_sum(&self, event: MetricEvent) -> u64 {
        self.minute.count(event)
    }
}

impl ReadStat for StatisticNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.second.count(event) as f64 / self.interval_s()
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.second.count_previous(event) as f64 * 1000.0 / self.second.span_ms() as f64
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.second.count(event)
    }

    fn min_rt(&self) -> f64 {
        self.second.min_rt() as f64
    }

    fn avg_rt(&self) -> f64 {
        let complete = self.second.count(MetricEvent::Complete);
        if complete == 0 {
            return 0f64;
        }
        self.second.count(MetricEvent::Rt) as f64 / complete as f64
    }
}

impl WriteStat for StatisticNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.second.add_count(event, count);
        self.minute.add_count(event, count);
    }
}

impl ConcurrencyStat for StatisticNode {
    fn current_concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::SeqCst)
    }

    fn increase_concurrency(&self) {
        self.concurrency.fetch_add(1, Ordering::SeqCst);
    }

    fn decrease_concurrency(&self) {
        self.concurrency.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StatNode for StatisticNode {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn qps_counts_current_window() {
        let node = StatisticNode::new();
        node.add_count(MetricEvent::Pass, 5);
        assert!((node.qps(MetricEvent::Pass) - 5.0).abs() < f64::EPSILON);
        assert_eq!(node.sum(MetricEvent::Pass), 5);
        assert_eq!(node.minute_sum(MetricEvent::Pass), 5);
    }

    #[test]
    fn avg_rt_needs_completions() {
        let node = StatisticNode::new();
        assert!(node.avg_rt() < f64::EPSILON);
        node.add_count(MetricEvent::Rt, 300);
        node.add_count(MetricEvent::Complete, 3);
        assert!((node.avg_rt() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrency_gauge() {
        let node = StatisticNode::new();
        node.increase_concurrency();
        node.increase_concurrency();
        assert_eq!(node.current_concurrency(), 2);
        node.decrease_concurrency();
        assert_eq!(node.current_concurrency(), 1);
    }
}
