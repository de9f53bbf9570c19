use super::*;
use crate::{
    base::{BaseSlot, BlockType, ConcurrencyStat, EntryContext, MetricEvent, ReadStat,
           RuleCheckSlot, Snapshot, TokenResult, TrafficType},
    stat, system_metric,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 2000;

/// The global admission gate, evaluated per inbound entry only.
pub struct SystemSlot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<SystemSlot> = Arc::new(SystemSlot {});
}

pub fn default_slot() -> Arc<SystemSlot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for SystemSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for SystemSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        if ctx.resource().traffic_type() == TrafficType::Outbound {
            return ctx.result().clone();
        }
        for rule in get_rules() {
            let (passed, msg, snapshot) = can_pass_check(&rule, ctx.input().batch_count());
            if passed {
                continue;
            }
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::SystemFlow,
                msg,
                rule.clone(),
                snapshot.unwrap(),
            ));
            return ctx.result().clone();
        }
        ctx.result().clone()
    }
}

fn can_pass_check(rule: &Arc<Rule>, batch_count: u32) -> (bool, String, Option<Arc<Snapshot>>) {
    let threshold = rule.threshold;
    let inbound = stat::inbound_node();
    let mut res = true;
    let mut msg = String::new();
    let mut snapshot = None;
    match rule.metric_type {
        MetricType::InboundQps => {
            let qps = inbound.qps(MetricEvent::Pass);
            res = qps + batch_count as f64 <= threshold;
            if !res {
                msg = "system qps check blocked".into();
                snapshot = Some(Arc::new(qps) as Arc<Snapshot>);
            }
        }
        MetricType::Concurrency => {
            let n = inbound.current_concurrency() as f64;
            res = n + batch_count as f64 <= threshold;
            if !res {
                msg = "system concurrency check blocked".into();
                snapshot = Some(Arc::new(n) as Arc<Snapshot>);
            }
        }
        MetricType::AvgRt => {
            let rt = inbound.avg_rt();
            res = rt <= threshold;
            if !res {
                msg = "system avg rt check blocked".into();
                snapshot = Some(Arc::new(rt) as Arc<Snapshot>);
            }
        }
        MetricType::Load => {
            let l = system_metric::current_load();
            // the load threshold is guarded by a BBR-style capacity check:
            // block only while the in-flight amount also exceeds the
            // estimated capacity max_qps * min_rt
            if l > threshold && !bbr_below_capacity() {
                res = false;
                msg = "system load check blocked".into();
            }
            snapshot = Some(Arc::new(l) as Arc<Snapshot>);
        }
        MetricType::CpuUsage => {
            let c = system_metric::current_cpu_usage() as f64;
            res = c <= threshold;
            if !res {
                msg = "system cpu usage check blocked".into();
            }
            snapshot = Some(Arc::new(c) as Arc<Snapshot>);
        }
    }
    (res, msg, snapshot)
}

/// True while the system is still below its estimated capacity, i.e. the
/// amount of in-flight inbound calls stays within `max_qps * min_rt`.
fn bbr_below_capacity() -> bool {
    let inbound = stat::inbound_node();
    let concurrency = inbound.current_concurrency() as f64;
    let min_rt = inbound.min_rt();
    let max_complete = inbound.max_avg(MetricEvent::Complete);
    !(concurrency > 1.0 && concurrency > max_complete * min_rt / 1000.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{EntryInput, ResourceType, ResourceWrapper};

    fn ctx_of(traffic: TrafficType) -> EntryContext {
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            "system_slot_res".into(),
            ResourceType::Common,
            traffic,
        ));
        ctx.set_input(EntryInput::new(1, false));
        ctx
    }

    #[test]
    fn outbound_traffic_is_never_gated() {
        let slot = SystemSlot {};
        let mut ctx = ctx_of(TrafficType::Outbound);
        assert!(slot.check(&mut ctx).is_pass());
    }

    #[test]
    fn empty_rules_pass() {
        let slot = SystemSlot {};
        let mut ctx = ctx_of(TrafficType::Inbound);
        assert!(slot.check(&mut ctx).is_pass());
    }

    #[test]
    #[ignore]
    fn concurrency_rule_blocks() {
        let rule = Arc::new(Rule {
            metric_type: MetricType::Concurrency,
            threshold: 0.5,
            ..Default::default()
        });
        stat::inbound_node().increase_concurrency();
        let (r, _, v) = can_pass_check(&rule, 1);
        stat::inbound_node().decrease_concurrency();
        assert!(!r);
        assert!(v.is_some());
    }

    #[test]
    #[ignore]
    fn load_rule_respects_bbr_guard() {
        let rule = Arc::new(Rule {
            metric_type: MetricType::Load,
            threshold: 0.5,
            ..Default::default()
        });
        // load above threshold, but a single in-flight call keeps the
        // system below the estimated capacity
        system_metric::set_system_load(1.0);
        stat::inbound_node().increase_concurrency();
        let (r, _, _) = can_pass_check(&rule, 1);
        stat::inbound_node().decrease_concurrency();
        system_metric::set_system_load(0.0);
        assert!(r);
    }

    #[test]
    #[ignore]
    fn cpu_rule_blocks_above_threshold() {
        let rule = Arc::new(Rule {
            metric_type: MetricType::CpuUsage,
            threshold: 0.5,
            ..Default::default()
        });
        system_metric::set_cpu_usage(0.8);
        let (r, _, _) = can_pass_check(&rule, 1);
        system_metric::set_cpu_usage(0.0);
        assert!(!r);
    }
}
