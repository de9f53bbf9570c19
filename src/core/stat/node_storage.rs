use super::{ClusterNode, StatisticNode};
use crate::{config, logging};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ClusterNodeMap = HashMap<String, Arc<ClusterNode>>;

lazy_static! {
    static ref INBOUND_NODE: Arc<StatisticNode> = Arc::new(StatisticNode::new());
    static ref CLUSTER_NODE_MAP: RwLock<ClusterNodeMap> = RwLock::new(ClusterNodeMap::new());
}

/// The virtual node aggregating all inbound traffic, consumed by the
/// system adaptive protection slot.
pub fn inbound_node() -> Arc<StatisticNode> {
    INBOUND_NODE.clone()
}

/// cluster_node_list returns all existing cluster nodes.
pub fn cluster_node_list() -> Vec<Arc<ClusterNode>> {
    let map = CLUSTER_NODE_MAP.read().unwrap();
    map.values().cloned().collect()
}

pub fn get_cluster_node(res_name: &str) -> Option<Arc<ClusterNode>> {
    let map = CLUSTER_NODE_MAP.read().unwrap();
    map.get(res_name).cloned()
}

/// Resolves the cluster node of the resource, creating it on first use.
/// Returns `None` once the registry reached the configured resource cap:
/// such resources stay admitted but are not statistically tracked.
pub fn get_or_create_cluster_node(res_name: &str) -> Option<Arc<ClusterNode>> {
    if let Some(node) = get_cluster_node(res_name) {
        return Some(node);
    }
    let mut map = CLUSTER_NODE_MAP.write().unwrap();
    if let Some(node) = map.get(res_name) {
        return Some(node.clone());
    }
    if map.len() >= config::max_resource_amount() {
        logging::FREQUENT_ERROR_ONCE.call_once(|| {
            logging::warn!(
                "[node_storage] Resource amount exceeds the threshold {}, new resources are admitted untracked",
                config::max_resource_amount()
            );
        });
        return None;
    }
    let node = Arc::new(ClusterNode::new(res_name.to_owned()));
    map.insert(res_name.to_owned(), node.clone());
    Some(node)
}

pub fn reset_cluster_node_map() {
    CLUSTER_NODE_MAP.write().unwrap().clear();
}
