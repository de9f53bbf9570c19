use super::*;
use crate::logging;
use std::sync::Arc;

#[derive(Debug)]
pub struct SlowRtBreaker {
    breaker: BreakerBase,
    max_allowed_rt: u64,
    max_slow_request_ratio: f64,
    min_request_amount: u64,
    stat: Arc<OutcomeLeapArray>,
}

impl SlowRtBreaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let interval = rule.stat_interval_ms;
        let bucket_count = rule.get_rule_stat_sliding_window_bucket_count();
        let stat = OutcomeLeapArray::new(bucket_count, interval).unwrap();
        Self::new_with_stat(rule, Arc::new(stat))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<OutcomeLeapArray>) -> Self {
        let max_allowed_rt = rule.max_allowed_rt_ms;
        let max_slow_request_ratio = rule.threshold;
        let min_request_amount = rule.min_request_amount;
        Self {
            breaker: BreakerBase::new(rule),
            max_allowed_rt,
            max_slow_request_ratio,
            min_request_amount,
            stat,
        }
    }
}

impl CircuitBreakerTrait for SlowRtBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<OutcomeLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, rt: u64, _err: &Option<Error>) {
        let slow = rt > self.max_allowed_rt;
        if let Err(err) = self.stat.record_completion(slow) {
            logging::error!(
                "[SlowRtBreaker] failed to record a completion, rule: {:?}, reason: {:?}",
                self.breaker.rule,
                err
            );
            return;
        }

        match self.current_state() {
            State::HalfOpen => {
                if slow {
                    // the probe failed
                    self.breaker.from_half_open_to_open(Arc::new(1.0));
                } else {
                    // the probe succeeded
                    self.breaker.from_half_open_to_closed();
                    self.reset_metric();
                }
            }
            State::Closed => {
                let (slow_count, total_count) = self.stat.window_totals();
                if total_count >= self.min_request_amount {
                    let slow_ratio = slow_count as f64 / total_count as f64;
                    if slow_ratio >= self.max_slow_request_ratio {
                        self.breaker.from_closed_to_open(Arc::new(slow_ratio));
                    }
                }
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::test::probe_rule;
    use super::*;

    #[test]
    fn stays_closed_below_min_request_amount() {
        let breaker = SlowRtBreaker::new(probe_rule(BreakerStrategy::SlowRequestRatio));
        // nine slow requests are still below min_request_amount = 10
        for _ in 0..9 {
            breaker.on_request_complete(100, &None);
        }
        assert_eq!(breaker.current_state(), State::Closed);
    }

    #[test]
    fn opens_on_slow_ratio() {
        let breaker = SlowRtBreaker::new(probe_rule(BreakerStrategy::SlowRequestRatio));
        // 5 fast + 5 slow out of 10: ratio 0.5 >= threshold 0.5
        for _ in 0..5 {
            breaker.on_request_complete(10, &None);
        }
        for _ in 0..5 {
            breaker.on_request_complete(100, &None);
        }
        assert_eq!(breaker.current_state(), State::Open);
        assert!(breaker.next_retry_timestamp_ms() > 0);
    }
}
