use super::*;
use crate::logging;
use std::sync::Arc;

#[derive(Debug)]
pub struct ErrorCountBreaker {
    breaker: BreakerBase,
    min_request_amount: u64,
    error_count_threshold: u64,
    stat: Arc<OutcomeLeapArray>,
}

impl ErrorCountBreaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = OutcomeLeapArray::new(bucket_count, interval).unwrap();
        Self::new_with_stat(rule, Arc::new(stat))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<OutcomeLeapArray>) -> Self {
        let min_request_amount = rule.min_request_amount;
        let error_count_threshold = rule.threshold as u64;
        Self {
            breaker: BreakerBase::new(rule),
            min_request_amount,
            error_count_threshold,
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorCountBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<OutcomeLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, _rt: u64, err: &Option<Error>) {
        let erred = err.is_some();
        if let Err(err) = self.stat.record_completion(erred) {
            logging::error!(
                "[ErrorCountBreaker] failed to record a completion, rule: {:?}, reason: {:?}",
                self.breaker.rule,
                err
            );
            return;
        }

        match self.current_state() {
            State::HalfOpen => {
                if erred {
                    let (error_count, _) = self.stat.window_totals();
                    self.breaker.from_half_open_to_open(Arc::new(error_count));
                } else {
                    self.breaker.from_half_open_to_closed();
                    self.reset_metric();
                }
            }
            State::Closed => {
                let (error_count, total_count) = self.stat.window_totals();
                if total_count >= self.min_request_amount
                    && error_count >= self.error_count_threshold
                {
                    self.breaker.from_closed_to_open(Arc::new(error_count));
                }
            }
            State::Open => {}
        }
    }
}
