use super::inbound_node;
use crate::{
    base::{
        BaseSlot, BlockError, ConcurrencyStat, EntryContext, MetricEvent, StatNode, StatSlot,
        TrafficType, WriteStat, DEFAULT_STATISTIC_MAX_RT,
    },
    utils::curr_time_millis,
};
use lazy_static::lazy_static;
use std::cmp;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_RESOURCE_STAT_SLOT: Arc<ResourceNodeStatSlot> =
        Arc::new(ResourceNodeStatSlot {});
}

pub fn default_resource_stat_slot() -> Arc<ResourceNodeStatSlot> {
    DEFAULT_RESOURCE_STAT_SLOT.clone()
}

/// ResourceNodeStatSlot writes the outcome of each entry to every node it
/// touches: the per-context DefaultNode, the per-resource ClusterNode, the
/// per-origin node and, for inbound traffic, the global inbound node.
pub struct ResourceNodeStatSlot {}

impl ResourceNodeStatSlot {
    fn nodes_of(&self, ctx: &EntryContext) -> Vec<Arc<dyn StatNode>> {
        let mut nodes: Vec<Arc<dyn StatNode>> = Vec::with_capacity(3);
        if let Some(node) = ctx.default_node() {
            nodes.push(node);
        }
        if let Some(node) = ctx.cluster_node() {
            nodes.push(node);
        }
        if let Some(node) = ctx.origin_node() {
            nodes.push(node);
        }
        nodes
    }

    fn record_pass_for(&self, node: Arc<dyn StatNode>, count: u32) {
        node.increase_concurrency();
        node.add_count(MetricEvent::Pass, count as u64);
    }

    fn record_block_for(&self, node: Arc<dyn StatNode>, count: u32) {
        node.add_count(MetricEvent::Block, count as u64)
    }

    fn record_complete_for(&self, node: Arc<dyn StatNode>, count: u32, round_trip: u64, erred: bool) {
        node.add_count(MetricEvent::Rt, round_trip);
        node.add_count(MetricEvent::Complete, count as u64);
        if erred {
            node.add_count(MetricEvent::Error, count as u64);
        }
        node.decrease_concurrency();
    }
}

impl BaseSlot for ResourceNodeStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for ResourceNodeStatSlot {
    fn on_entry_pass(&self, ctx: &EntryContext) {
        let count = ctx.input().batch_count();
        for node in self.nodes_of(ctx) {
            self.record_pass_for(node, count);
        }
        if ctx.resource().traffic_type() == TrafficType::Inbound {
            self.record_pass_for(inbound_node(), count);
        }
    }

    fn on_entry_blocked(&self, ctx: &EntryContext, _block_error: BlockError) {
        let count = ctx.input().batch_count();
        for node in self.nodes_of(ctx) {
            self.record_block_for(node, count);
        }
        if ctx.resource().traffic_type() == TrafficType::Inbound {
            self.record_block_for(inbound_node(), count);
        }
    }

    fn on_completed(&self, ctx: &mut EntryContext) {
        let round_trip = cmp::min(
            curr_time_millis().saturating_sub(ctx.start_time()),
            DEFAULT_STATISTIC_MAX_RT,
        );
        ctx.set_round_trip(round_trip);
        let count = ctx.input().batch_count();
        let erred = ctx.get_err().is_some();
        for node in self.nodes_of(ctx) {
            self.record_complete_for(node, count, round_trip, erred);
        }
        if ctx.resource().traffic_type() == TrafficType::Inbound {
            self.record_complete_for(inbound_node(), count, round_trip, erred);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{EntryInput, ReadStat, ResourceType, ResourceWrapper};
    use crate::stat::ClusterNode;

    fn new_ctx(traffic: TrafficType) -> EntryContext {
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            "stat_slot_res".into(),
            ResourceType::Common,
            traffic,
        ));
        ctx.set_input(EntryInput::new(1, false));
        ctx
    }

    #[test]
    fn pass_then_complete_is_net_zero_concurrency() {
        let slot = ResourceNodeStatSlot {};
        let cluster = Arc::new(ClusterNode::new("stat_slot_res".into()));
        let mut ctx = new_ctx(TrafficType::Outbound);
        ctx.set_cluster_node(cluster.clone());

        slot.on_entry_pass(&ctx);
        assert_eq!(cluster.sum(MetricEvent::Pass), 1);
        assert_eq!(cluster.current_concurrency(), 1);

        slot.on_completed(&mut ctx);
        assert_eq!(cluster.sum(MetricEvent::Complete), 1);
        assert_eq!(cluster.current_concurrency(), 0);
        assert_eq!(cluster.sum(MetricEvent::Block), 0);
    }

    #[test]
    fn block_only_counts_block() {
        let slot = ResourceNodeStatSlot {};
        let cluster = Arc::new(ClusterNode::new("stat_slot_res_blk".into()));
        let mut ctx = new_ctx(TrafficType::Outbound);
        ctx.set_cluster_node(cluster.clone());

        slot.on_entry_blocked(&ctx, BlockError::new(crate::base::BlockType::Flow));
        assert_eq!(cluster.sum(MetricEvent::Block), 1);
        assert_eq!(cluster.sum(MetricEvent::Pass), 0);
        assert_eq!(cluster.current_concurrency(), 0);
    }

    #[test]
    fn error_recorded_on_completion() {
        let slot = ResourceNodeStatSlot {};
        let cluster = Arc::new(ClusterNode::new("stat_slot_res_err".into()));
        let mut ctx = new_ctx(TrafficType::Outbound);
        ctx.set_cluster_node(cluster.clone());

        slot.on_entry_pass(&ctx);
        ctx.set_err(crate::Error::msg("biz failure"));
        slot.on_completed(&mut ctx);
        assert_eq!(cluster.sum(MetricEvent::Error), 1);
    }
}
