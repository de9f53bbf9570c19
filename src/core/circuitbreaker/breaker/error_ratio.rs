use super::*;
use crate::logging;
use std::sync::Arc;

#[derive(Debug)]
pub struct ErrorRatioBreaker {
    breaker: BreakerBase,
    min_request_amount: u64,
    error_ratio_threshold: f64,
    stat: Arc<OutcomeLeapArray>,
}

impl ErrorRatioBreaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = OutcomeLeapArray::new(bucket_count, interval).unwrap();
        Self::new_with_stat(rule, Arc::new(stat))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<OutcomeLeapArray>) -> Self {
        let min_request_amount = rule.min_request_amount;
        let error_ratio_threshold = rule.threshold;
        Self {
            breaker: BreakerBase::new(rule),
            min_request_amount,
            error_ratio_threshold,
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorRatioBreaker {
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
                "[ErrorRatioBreaker] failed to record a completion, rule: {:?}, reason: {:?}",
                self.breaker.rule,
                err
            );
            return;
        }

        match self.current_state() {
            State::HalfOpen => {
                if erred {
                    self.breaker.from_half_open_to_open(Arc::new(1));
                } else {
                    self.breaker.from_half_open_to_closed();
                    self.reset_metric();
                }
            }
            State::Closed => {
                let (error_count, total_count) = self.stat.window_totals();
                if total_count >= self.min_request_amount {
                    let error_ratio = error_count as f64 / total_count as f64;
                    if error_ratio >= self.error_ratio_threshold {
                        self.breaker.from_closed_to_open(Arc::new(error_ratio));
                    }
                }
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ratio_rule() -> Arc<Rule> {
        Arc::new(Rule {
            resource: "error_ratio_res".into(),
            strategy: BreakerStrategy::ErrorRatio,
            retry_timeout_ms: 2000,
            min_request_amount: 5,
            stat_interval_ms: 10000,
            threshold: 0.5,
            ..Default::default()
        })
    }

    #[test]
    fn ratio_below_threshold_stays_closed() {
        let breaker = ErrorRatioBreaker::new(ratio_rule());
        // 4 successes + 3 errors: total 7, ratio 3/7 < 0.5
        for _ in 0..4 {
            breaker.on_request_complete(0, &None);
        }
        for _ in 0..3 {
            breaker.on_request_complete(0, &Some(Error::msg("biz error")));
        }
        assert_eq!(breaker.current_state(), State::Closed);
        // one more error: ratio 4/8 = 0.5 -> Open
        breaker.on_request_complete(0, &Some(Error::msg("biz error")));
        assert_eq!(breaker.current_state(), State::Open);
    }

    #[test]
    fn probe_outcomes() {
        let breaker = ErrorRatioBreaker::new(ratio_rule());

        breaker.set_state(State::HalfOpen);
        breaker.on_request_complete(0, &Some(Error::msg("probe error")));
        assert_eq!(breaker.current_state(), State::Open);

        breaker.set_state(State::HalfOpen);
        breaker.on_request_complete(0, &None);
        assert_eq!(breaker.current_state(), State::Closed);
    }
}
