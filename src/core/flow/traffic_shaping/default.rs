use super::{Calculator, Checker, Rule};
use crate::core::base::{
    BlockType, ConcurrencyStat, MetricEvent, ReadStat, StatNode, TokenResult, WriteStat,
};
use crate::core::flow::rule::FlowGrade;
use crate::{config, utils};
use std::sync::Arc;

/// Provides the threshold of the rule unchanged.
#[derive(Debug)]
pub struct DirectCalculator {
    threshold: f64,
}

impl DirectCalculator {
    pub fn new(threshold: f64) -> Self {
        DirectCalculator { threshold }
    }
}

impl Calculator for DirectCalculator {
    fn calculate_allowed_threshold(
        &self,
        _node: &Arc<dyn StatNode>,
        _batch_count: u32,
        _prioritized: bool,
    ) -> f64 {
        self.threshold
    }
}

/// Rejects directly once the measured value plus the requested batch would
/// exceed the allowed threshold. A prioritized QPS request may instead
/// borrow tokens from the upcoming window: it waits until the realtime
/// window slides (at most one bucket length) and records the borrowed
/// amount as occupied passes.
#[derive(Debug)]
pub struct RejectChecker {
    rule: Arc<Rule>,
}

impl RejectChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        RejectChecker { rule }
    }
}

impl Checker for RejectChecker {
    fn do_check(
        &self,
        node: Arc<dyn StatNode>,
        batch_count: u32,
        threshold: f64,
        prioritized: bool,
    ) -> TokenResult {
        let cur_count = match self.rule.grade {
            FlowGrade::Thread => node.current_concurrency() as f64,
            FlowGrade::Qps => node.qps(MetricEvent::Pass),
        };
        if cur_count + batch_count as f64 <= threshold {
            return TokenResult::new_pass();
        }
        if prioritized && self.rule.grade == FlowGrade::Qps {
            // borrow from the next window, bounded by one bucket length
            let bucket_len_ms =
                (config::metric_stat_interval_ms() / config::metric_stat_sample_count()) as u64;
            let now = utils::curr_time_millis();
            let wait_ms = bucket_len_ms - now % bucket_len_ms;
            node.add_count(MetricEvent::OccupiedPass, batch_count as u64);
            return TokenResult::new_should_wait(utils::milli2nano(wait_ms));
        }
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            "flow reject check blocked".into(),
            self.rule.clone(),
            Arc::new(cur_count),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MockStatNode;

    fn node_with_qps(qps: f64) -> Arc<dyn StatNode> {
        let mut node = MockStatNode::new();
        node.expect_qps().return_const(qps);
        Arc::new(node)
    }

    #[test]
    fn qps_below_threshold_passes() {
        let checker = RejectChecker::new(Arc::new(Rule {
            resource: "abc".into(),
            threshold: 5.0,
            ..Default::default()
        }));
        let res = checker.do_check(node_with_qps(4.0), 1, 5.0, false);
        assert!(res.is_pass());
    }

    #[test]
    fn qps_at_threshold_blocks() {
        let checker = RejectChecker::new(Arc::new(Rule {
            resource: "abc".into(),
            threshold: 5.0,
            ..Default::default()
        }));
        let res = checker.do_check(node_with_qps(5.0), 1, 5.0, false);
        assert!(res.is_blocked());
    }

    #[test]
    fn thread_grade_reads_concurrency() {
        let checker = RejectChecker::new(Arc::new(Rule {
            resource: "abc".into(),
            grade: FlowGrade::Thread,
            threshold: 2.0,
            ..Default::default()
        }));
        let mut node = MockStatNode::new();
        node.expect_current_concurrency().return_const(2u32);
        let res = checker.do_check(Arc::new(node), 1, 2.0, false);
        assert!(res.is_blocked());
    }

    #[test]
    fn prioritized_request_borrows_ahead() {
        let checker = RejectChecker::new(Arc::new(Rule {
            resource: "abc".into(),
            threshold: 5.0,
            ..Default::default()
        }));
        let mut node = MockStatNode::new();
        node.expect_qps().return_const(5.0f64);
        node.expect_add_count().once().return_const(());
        let res = checker.do_check(Arc::new(node), 1, 5.0, true);
        assert!(res.is_wait());
        // the wait never exceeds one bucket of the realtime window
        assert!(res.nanos_to_wait() <= 500 * 1_000_000);
    }
}
