//! `WarmUpCalculator` is based on the **token bucket** algorithm: the
//! allowed rate climbs from `threshold / cold_factor` to `threshold` over
//! the warm-up period as the stored tokens drain below the warning line.

use super::{Calculator, Rule};
use crate::base::{MetricEvent, ReadStat, StatNode};
use crate::{config, logging, utils};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug)]
pub struct WarmUpCalculator {
    threshold: f64,
    cold_factor: u32,
    warning_token: u64,
    max_token: u64,
    slope: f64,
    stored_tokens: AtomicU64,
    last_filled_time: AtomicU64,
}

impl WarmUpCalculator {
    pub fn new(rule: Arc<Rule>) -> Self {
        let mut cold_factor = rule.warm_up_cold_factor;
        if cold_factor <= 1 {
            cold_factor = config::warm_up_cold_factor();
            logging::warn!(
                "[WarmUpCalculator::new] warm_up_cold_factor not set, using the default cold factor {}",
                cold_factor
            );
        };
        let threshold = rule.threshold;
        let warm_up_period = rule.warm_up_period_sec as f64;

        let cold_factor_plus = (cold_factor + 1) as f64;
        let cold_factor_minus = (cold_factor - 1) as f64;
        let warning_token = (warm_up_period * threshold / cold_factor_minus) as u64;
        let max_token = warning_token + 2 * (warm_up_period * threshold / cold_factor_plus) as u64;
        let slope = cold_factor_minus / threshold / (max_token - warning_token) as f64;

        WarmUpCalculator {
            cold_factor,
            warning_token,
            max_token,
            slope,
            threshold,
            stored_tokens: AtomicU64::new(0),
            last_filled_time: AtomicU64::new(0),
        }
    }

    fn sync_token(&self, pass_qps: f64) {
        let mut curr_time = utils::curr_time_millis();
        curr_time -= curr_time % 1000;

        let old_last_fill_time = self.last_filled_time.load(Ordering::SeqCst);
        if curr_time <= old_last_fill_time {
            return;
        }

        let old_value = self.stored_tokens.load(Ordering::SeqCst);
        let new_value = self.cool_down_tokens(curr_time, pass_qps);

        if self
            .stored_tokens
            .compare_exchange(old_value, new_value, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            let prev_value = self
                .stored_tokens
                .fetch_sub(pass_qps as u64, Ordering::SeqCst);
            if prev_value < pass_qps as u64 {
                // the subtraction overflowed, clamp to an empty bucket
                self.stored_tokens.store(0, Ordering::SeqCst);
            }
            self.last_filled_time.store(curr_time, Ordering::SeqCst);
        }
    }

    fn cool_down_tokens(&self, curr_time: u64, pass_qps: f64) -> u64 {
        let old_value = self.stored_tokens.load(Ordering::SeqCst);
        let mut new_value = old_value;
        let last_time = self.last_filled_time.load(Ordering::SeqCst);
        // tokens refill while consumption stays below the warning line
        if old_value < self.warning_token
            || pass_qps < (self.threshold / self.cold_factor as f64).floor()
        {
            new_value =
                old_value + ((curr_time - last_time) as f64 * self.threshold / 1000.0) as u64;
        }

        std::cmp::min(new_value, self.max_token)
    }
}

impl Calculator for WarmUpCalculator {
    fn calculate_allowed_threshold(
        &self,
        node: &Arc<dyn StatNode>,
        _batch_count: u32,
        _prioritized: bool,
    ) -> f64 {
        let previous_qps = node.qps_previous(MetricEvent::Pass);
        self.sync_token(previous_qps);
        let rest_token = self.stored_tokens.load(Ordering::SeqCst);

        if rest_token >= self.warning_token {
            // still warming up: derive the allowed QPS from the slope
            let above_token = rest_token - self.warning_token;
            utils::next_after(1.0 / (above_token as f64 * self.slope + 1.0 / self.threshold))
        } else {
            self.threshold
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MockStatNode;

    fn rule(threshold: f64, period: u32, factor: u32) -> Arc<Rule> {
        Arc::new(Rule {
            resource: "warm_up_res".into(),
            threshold,
            warm_up_period_sec: period,
            warm_up_cold_factor: factor,
            control_behavior: crate::flow::ControlBehavior::WarmUp,
            ..Default::default()
        })
    }

    #[test]
    fn token_lines() {
        let calc = WarmUpCalculator::new(rule(100.0, 10, 3));
        // warning = period * threshold / (factor - 1), max adds the slope span
        assert_eq!(calc.warning_token, 500);
        assert_eq!(calc.max_token, 1000);
        assert!(calc.slope > 0.0);
    }

    #[test]
    fn cold_start_allows_a_third() {
        let calc = WarmUpCalculator::new(rule(100.0, 10, 3));
        let mut node = MockStatNode::new();
        node.expect_qps_previous().return_const(0.0f64);
        let node: Arc<dyn StatNode> = Arc::new(node);
        let allowed = calc.calculate_allowed_threshold(&node, 1, false);
        // at cold start the full bucket caps the rate near threshold / factor
        assert!(allowed < 100.0 / 3.0 + 1.0, "allowed = {}", allowed);
        assert!(allowed > 100.0 / 3.0 - 5.0, "allowed = {}", allowed);
    }

    #[test]
    fn warmed_up_reaches_threshold() {
        let calc = WarmUpCalculator::new(rule(100.0, 10, 3));
        // a drained bucket means the system is warm
        calc.stored_tokens.store(0, Ordering::SeqCst);
        calc.last_filled_time
            .store(utils::curr_time_millis(), Ordering::SeqCst);
        let mut node = MockStatNode::new();
        node.expect_qps_previous().return_const(90.0f64);
        let node: Arc<dyn StatNode> = Arc::new(node);
        let allowed = calc.calculate_allowed_threshold(&node, 1, false);
        assert!((allowed - 100.0).abs() < f64::EPSILON, "allowed = {}", allowed);
    }
}
