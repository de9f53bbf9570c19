//! Throttling indicates that pending requests will be throttled,
//! wait in queue (until free capacity is available)

use super::{Checker, Rule};
use crate::base::{BlockType, StatNode, TokenResult};
use crate::utils;
use std::convert::TryInto;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

static BLOCK_MSG_QUEUEING: &str = "flow throttling check blocked, estimated queueing time exceeds max_queueing_time_ms";

/// Leaky bucket pacing: consecutive admissions are spread
/// `batch / threshold` seconds apart; callers that would have to wait
/// longer than the configured bound are rejected.
#[derive(Debug)]
pub struct ThrottlingChecker {
    rule: Arc<Rule>,
    max_queueing_time_ns: i64,
    stat_interval_ns: i64,
    last_passed_time: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let timeout_ms = rule.max_queueing_time_ms;
        ThrottlingChecker {
            rule,
            max_queueing_time_ns: utils::milli2nano(timeout_ms as u64) as i64,
            stat_interval_ns: utils::milli2nano(1000) as i64,
            last_passed_time: AtomicI64::new(0),
        }
    }
}

impl Checker for ThrottlingChecker {
    // queueing already spreads the load ahead in time, so the prioritized
    // flag adds nothing here
    fn do_check(
        &self,
        _node: Arc<dyn StatNode>,
        batch_count: u32,
        threshold: f64,
        _prioritized: bool,
    ) -> TokenResult {
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        if threshold <= 0.0 {
            return TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                BLOCK_MSG_QUEUEING.into(),
                self.rule.clone(),
                Arc::new(threshold),
            );
        }
        let batch_count = batch_count as f64;
        if batch_count > threshold {
            return TokenResult::new_blocked(BlockType::Flow);
        }

        // nanoseconds give enough resolution to control the queueing time
        let curr_nano: i64 = utils::curr_time_nanos().try_into().unwrap();

        // the interval between two admissions
        let interval_ns = (batch_count.ceil() / threshold * (self.stat_interval_ns as f64)) as i64;

        let loaded_last_passed_time = self.last_passed_time.load(Ordering::SeqCst);
        // expected pass time of this request
        let expected_time = loaded_last_passed_time + interval_ns;
        if expected_time <= curr_nano
            && self
                .last_passed_time
                .compare_exchange(
                    loaded_last_passed_time,
                    curr_nano,
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
        {
            // the pace allows immediate admission
            return TokenResult::new_pass();
        }
        // a request went through recently; estimate the queueing time
        let estimated_queue_duration =
            self.last_passed_time.load(Ordering::SeqCst) + interval_ns - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            return TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                BLOCK_MSG_QUEUEING.into(),
                self.rule.clone(),
                Arc::new(estimated_queue_duration),
            );
        }
        // claim the slot, then re-validate the wait under the advanced head
        let expected_time = self
            .last_passed_time
            .fetch_add(interval_ns, Ordering::SeqCst)
            + interval_ns;
        let estimated_queue_duration = expected_time - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            // give the claimed interval back
            self.last_passed_time
                .fetch_sub(interval_ns, Ordering::SeqCst);
            return TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                BLOCK_MSG_QUEUEING.into(),
                self.rule.clone(),
                Arc::new(estimated_queue_duration),
            );
        }
        if estimated_queue_duration > 0 {
            TokenResult::new_should_wait(estimated_queue_duration.try_into().unwrap())
        } else {
            TokenResult::new_should_wait(0)
        }
    }
}
