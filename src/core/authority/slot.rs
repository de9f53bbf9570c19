use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 1000;

/// AuthoritySlot consults the origin allow/deny rules of the resource.
pub struct AuthoritySlot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<AuthoritySlot> = Arc::new(AuthoritySlot {});
}

pub fn default_slot() -> Arc<AuthoritySlot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for AuthoritySlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for AuthoritySlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let res = ctx.resource().name().clone();
        if res.is_empty() {
            return ctx.result().clone();
        }
        let origin = ctx.origin().clone();
        for rule in get_rules_of_resource(&res) {
            let listed = rule.contains_origin(&origin);
            let passed = match rule.strategy {
                AuthorityStrategy::WhiteList => listed,
                AuthorityStrategy::BlackList => !listed,
            };
            if !passed {
                ctx.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::Authority,
                    "authority check blocked".into(),
                    rule,
                    Arc::new(origin),
                ));
                return ctx.result().clone();
            }
        }
        ctx.result().clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper, TrafficType};
    use crate::context::Context;
    use std::sync::RwLock;

    fn ctx_with_origin(res: &str, origin: &str) -> EntryContext {
        let task_ctx = Arc::new(RwLock::new(Context::new(
            "authority_ctx".into(),
            origin.into(),
        )));
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            res.into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        ctx.set_context(task_ctx);
        ctx
    }

    #[test]
    fn white_list_admits_listed_origin_only() {
        let res = String::from("authority_slot_white");
        load_rules_of_resource(
            &res,
            vec![Arc::new(Rule {
                resource: res.clone(),
                limit_app: "svc-a,svc-b".into(),
                strategy: AuthorityStrategy::WhiteList,
                ..Default::default()
            })],
        );
        let slot = AuthoritySlot {};

        let mut listed = ctx_with_origin(&res, "svc-a");
        assert!(slot.check(&mut listed).is_pass());

        let mut unlisted = ctx_with_origin(&res, "svc-c");
        let r = slot.check(&mut unlisted);
        assert!(r.is_blocked());
        assert_eq!(r.block_err().unwrap().block_type(), BlockType::Authority);
        load_rules_of_resource(&res, vec![]);
    }

    #[test]
    fn black_list_rejects_listed_origin_only() {
        let res = String::from("authority_slot_black");
        load_rules_of_resource(
            &res,
            vec![Arc::new(Rule {
                resource: res.clone(),
                limit_app: "svc-bad".into(),
                strategy: AuthorityStrategy::BlackList,
                ..Default::default()
            })],
        );
        let slot = AuthoritySlot {};

        let mut listed = ctx_with_origin(&res, "svc-bad");
        assert!(slot.check(&mut listed).is_blocked());

        let mut unlisted = ctx_with_origin(&res, "svc-good");
        assert!(slot.check(&mut unlisted).is_pass());
        load_rules_of_resource(&res, vec![]);
    }
}
