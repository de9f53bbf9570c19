use super::node_storage;
use crate::base::{BaseSlot, EntryContext, StatPrepareSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const PREPARE_SLOT_ORDER: u32 = 2000;

lazy_static! {
    pub static ref DEFAULT_CLUSTER_BUILDER_SLOT: Arc<ClusterBuilderSlot> =
        Arc::new(ClusterBuilderSlot {});
}

pub fn default_cluster_builder_slot() -> Arc<ClusterBuilderSlot> {
    DEFAULT_CLUSTER_BUILDER_SLOT.clone()
}

/// ClusterBuilderSlot resolves the global ClusterNode of the resource,
/// attaches it to the DefaultNode on first encounter, and resolves the
/// OriginNode of the context's origin.
pub struct ClusterBuilderSlot {}

impl BaseSlot for ClusterBuilderSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for ClusterBuilderSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        let res_name = ctx.resource().name().clone();
        if res_name.is_empty() {
            return;
        }
        // beyond the resource cap no cluster node exists; the entry stays
        // admitted but untracked
        let cluster = match node_storage::get_or_create_cluster_node(&res_name) {
            Some(c) => c,
            None => return,
        };
        if let Some(node) = ctx.default_node() {
            node.set_cluster_node(cluster.clone());
        }
        let origin = ctx.origin().clone();
        if !origin.is_empty() {
            ctx.set_origin_node(cluster.get_or_create_origin_node(&origin));
        }
        ctx.set_cluster_node(cluster);
    }
}
