use super::*;
use crate::{
    base::{BaseSlot, EntryContext, RuleCheckSlot, StatNode, TokenResult, LIMIT_APP_DEFAULT,
           LIMIT_APP_OTHER},
    stat, utils,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 3000;

/// The rule check slot for flow rules.
pub struct FlowSlot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<FlowSlot> = Arc::new(FlowSlot {});
}

pub fn default_slot() -> Arc<FlowSlot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for FlowSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for FlowSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let res = ctx.resource().name().clone();
        if res.is_empty() {
            return ctx.result().clone();
        }
        let tcs = get_traffic_controller_list_for(&res);
        for tc in tcs {
            // a rule whose strategy or origin selector does not apply to
            // this entry contributes nothing
            let node = match select_node_by_strategy(&tc, ctx) {
                Some(node) => node,
                None => continue,
            };
            let r = tc.perform_checking(node, ctx.input().batch_count(), ctx.input().prioritized());
            match r {
                TokenResult::Pass => {}
                TokenResult::Blocked(_) => {
                    ctx.set_result(r);
                    return ctx.result().clone();
                }
                TokenResult::Wait(nanos_to_wait) => {
                    // the only intentional suspension point of the engine,
                    // bounded by the rule's max_queueing_time_ms
                    utils::sleep_for_ns(nanos_to_wait);
                }
            }
        }
        ctx.result().clone()
    }
}

/// Resolves the node whose statistic the rule is compared against:
/// - Direct: the origin node when `limit_app` names this entry's origin
///   (or covers it via `other`), the cluster node for `default`;
/// - Related: the cluster node of `ref_resource`;
/// - Chain: the per-context default node, only when the current context
///   name equals `ref_resource` (ancestor contexts are never consulted).
fn select_node_by_strategy(tc: &Arc<Controller>, ctx: &EntryContext) -> Option<Arc<dyn StatNode>> {
    let rule = tc.rule();
    match rule.relation_strategy {
        RelationStrategy::Related => stat::get_cluster_node(&rule.ref_resource)
            .map(|node| node as Arc<dyn StatNode>),
        RelationStrategy::Chain => {
            if ctx.context_name() != &rule.ref_resource {
                return None;
            }
            ctx.default_node().map(|node| node as Arc<dyn StatNode>)
        }
        RelationStrategy::Direct => {
            let origin = ctx.origin();
            if rule.limit_app == LIMIT_APP_DEFAULT {
                ctx.cluster_node().map(|node| node as Arc<dyn StatNode>)
            } else if rule.limit_app == LIMIT_APP_OTHER {
                if origin.is_empty()
                    || has_origin_specific_rule(&rule.resource, origin)
                {
                    None
                } else {
                    ctx.origin_node().map(|node| node as Arc<dyn StatNode>)
                }
            } else if &rule.limit_app == origin {
                ctx.origin_node().map(|node| node as Arc<dyn StatNode>)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{EntryInput, ResourceType, ResourceWrapper, StatPrepareSlot, TrafficType,
                      WriteStat};
    use crate::context::Context;
    use crate::stat::{default_cluster_builder_slot, default_node_selector_slot};
    use std::sync::RwLock;

    fn prepared_ctx(res: &str, ctx_name: &str, origin: &str) -> EntryContext {
        let task_ctx = Arc::new(RwLock::new(Context::new(ctx_name.into(), origin.into())));
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            res.into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        ctx.set_input(EntryInput::new(1, false));
        ctx.set_context(task_ctx);
        default_node_selector_slot().prepare(&mut ctx);
        default_cluster_builder_slot().prepare(&mut ctx);
        ctx
    }

    #[test]
    fn reject_above_threshold() {
        let res = String::from("flow_slot_reject");
        let slot = FlowSlot {};
        load_rules_of_resource(
            &res,
            vec![Arc::new(Rule {
                resource: res.clone(),
                threshold: 3.0,
                ..Default::default()
            })],
        )
        .unwrap();

        let mut ctx = prepared_ctx(&res, "flow_slot_ctx", "");
        let cluster = ctx.cluster_node().unwrap();
        for _ in 0..3 {
            assert!(slot.check(&mut ctx).is_pass());
            cluster.add_count(crate::base::MetricEvent::Pass, 1);
        }
        assert!(slot.check(&mut ctx).is_blocked());
        load_rules_of_resource(&res, vec![]).unwrap();
    }

    #[test]
    fn chain_rule_matches_nearest_context_only() {
        let res = String::from("flow_slot_chain");
        let slot = FlowSlot {};
        load_rules_of_resource(
            &res,
            vec![Arc::new(Rule {
                resource: res.clone(),
                threshold: 0.0,
                relation_strategy: RelationStrategy::Chain,
                ref_resource: "entrance_a".into(),
                ..Default::default()
            })],
        )
        .unwrap();

        // the rule names entrance_a, so traffic through entrance_b passes
        let mut other = prepared_ctx(&res, "entrance_b", "");
        assert!(slot.check(&mut other).is_pass());

        // the matching entrance hits the zero threshold immediately
        let mut matching = prepared_ctx(&res, "entrance_a", "");
        assert!(slot.check(&mut matching).is_blocked());
        load_rules_of_resource(&res, vec![]).unwrap();
    }

    #[test]
    fn origin_specific_rule_only_guards_that_origin() {
        let res = String::from("flow_slot_origin");
        let slot = FlowSlot {};
        load_rules_of_resource(
            &res,
            vec![Arc::new(Rule {
                resource: res.clone(),
                limit_app: "svc-a".into(),
                threshold: 0.0,
                ..Default::default()
            })],
        )
        .unwrap();

        let mut from_a = prepared_ctx(&res, "flow_slot_origin_ctx", "svc-a");
        assert!(slot.check(&mut from_a).is_blocked());

        let mut from_b = prepared_ctx(&res, "flow_slot_origin_ctx", "svc-b");
        assert!(slot.check(&mut from_b).is_pass());
        load_rules_of_resource(&res, vec![]).unwrap();
    }

    #[test]
    fn other_excludes_origins_with_dedicated_rule() {
        let res = String::from("flow_slot_other");
        let slot = FlowSlot {};
        load_rules_of_resource(
            &res,
            vec![
                Arc::new(Rule {
                    resource: res.clone(),
                    limit_app: "svc-a".into(),
                    threshold: 100.0,
                    ..Default::default()
                }),
                Arc::new(Rule {
                    resource: res.clone(),
                    limit_app: LIMIT_APP_OTHER.into(),
                    threshold: 0.0,
                    ..Default::default()
                }),
            ],
        )
        .unwrap();

        // svc-a has its own generous rule, the `other` rule skips it
        let mut from_a = prepared_ctx(&res, "flow_slot_other_ctx", "svc-a");
        assert!(slot.check(&mut from_a).is_pass());

        // anybody else falls under the zero-threshold `other` rule
        let mut from_b = prepared_ctx(&res, "flow_slot_other_ctx", "svc-b");
        assert!(slot.check(&mut from_b).is_blocked());
        load_rules_of_resource(&res, vec![]).unwrap();
    }
}
