//! Traffic Shaping Policy

/// Default calculator and reject checker
pub mod default;
/// Throttling checker
pub mod throttling;
/// Warm up calculator
pub mod warmup;

pub use default::*;
pub use throttling::*;
pub use warmup::*;

use super::Rule;
use crate::base::{StatNode, TokenResult};
use std::sync::Arc;

/// A traffic shaping `Calculator` calculates the actual threshold based on
/// the threshold of the rule and the shaping strategy.
pub trait Calculator: Send + Sync + std::fmt::Debug {
    fn calculate_allowed_threshold(
        &self,
        node: &Arc<dyn StatNode>,
        batch_count: u32,
        prioritized: bool,
    ) -> f64;
}

/// A traffic shaping `Checker` performs the check against the current
/// metrics of the selected node and yields the token result.
pub trait Checker: Send + Sync + std::fmt::Debug {
    fn do_check(
        &self,
        node: Arc<dyn StatNode>,
        batch_count: u32,
        threshold: f64,
        prioritized: bool,
    ) -> TokenResult;
}

/// Controller binds the rule to its calculator and checker pair. The rule
/// manager rebuilds controllers on every rule update, so shaper state such
/// as warm-up tokens or the throttling queue head is reset then.
#[derive(Debug)]
pub struct Controller {
    rule: Arc<Rule>,
    calculator: Box<dyn Calculator>,
    checker: Box<dyn Checker>,
}

impl Controller {
    pub fn new(rule: Arc<Rule>, calculator: Box<dyn Calculator>, checker: Box<dyn Checker>) -> Self {
        Controller {
            rule,
            calculator,
            checker,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn perform_checking(
        &self,
        node: Arc<dyn StatNode>,
        batch_count: u32,
        prioritized: bool,
    ) -> TokenResult {
        let allowed_threshold = self
            .calculator
            .calculate_allowed_threshold(&node, batch_count, prioritized);
        self.checker
            .do_check(node, batch_count, allowed_threshold, prioritized)
    }
}
