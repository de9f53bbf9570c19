use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 4000;

/// The rule check slot of the circuit breakers.
pub struct DegradeSlot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<DegradeSlot> = Arc::new(DegradeSlot {});
}

pub fn default_slot() -> Arc<DegradeSlot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for DegradeSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for DegradeSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let res = ctx.resource().name().clone();
        if res.is_empty() {
            return ctx.result().clone();
        }
        if let Some(rule) = can_pass_check(ctx, &res) {
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::CircuitBreaking,
                "circuit breaker check blocked".into(),
                rule,
                Arc::new(()),
            ));
        }
        ctx.result().clone()
    }
}

/// `None` indicates it passes;
/// `Some(rule)` indicates it is broken by the rule.
fn can_pass_check(ctx: &EntryContext, res: &String) -> Option<Arc<Rule>> {
    for breaker in get_breakers_of_resource(res) {
        if !breaker.try_pass(ctx) {
            return Some(Arc::clone(breaker.bound_rule()));
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper, TrafficType};

    #[test]
    fn open_breaker_blocks_entry() {
        let res = String::from("degrade_slot_res");
        let rules = vec![Arc::new(Rule {
            resource: res.clone(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 30000,
            threshold: 1.0,
            ..Default::default()
        })];
        load_rules_of_resource(&res, rules);
        let breakers = get_breakers_of_resource(&res);
        assert_eq!(breakers.len(), 1);
        breakers[0].set_state(State::Open);
        // a retry timestamp far in the future keeps the breaker open
        breakers[0].breaker().update_next_retry_timestamp();

        let slot = DegradeSlot {};
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            res.clone(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        let token = slot.check(&mut ctx);
        assert!(token.is_blocked());
        assert_eq!(
            token.block_err().unwrap().block_type(),
            BlockType::CircuitBreaking
        );
        load_rules_of_resource(&res, vec![]);
    }

    #[test]
    fn closed_breaker_passes_entry() {
        let res = String::from("degrade_slot_res_closed");
        let rules = vec![Arc::new(Rule {
            resource: res.clone(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 30000,
            threshold: 1.0,
            ..Default::default()
        })];
        load_rules_of_resource(&res, rules);

        let slot = DegradeSlot {};
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            res.clone(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        assert!(slot.check(&mut ctx).is_pass());
        load_rules_of_resource(&res, vec![]);
    }
}
