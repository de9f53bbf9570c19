use super::StatisticNode;
use crate::base::{ConcurrencyStat, MetricEvent, ReadStat, StatNode, WriteStat};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// ClusterNode aggregates the statistics of one resource across every
/// context it is reached from. It also owns the per-origin nodes so rules
/// scoped to a specific caller can be evaluated.
#[derive(Debug)]
pub struct ClusterNode {
    resource: String,
    stat: StatisticNode,
    origins: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl ClusterNode {
    pub fn new(resource: String) -> Self {
        ClusterNode {
            resource,
            stat: StatisticNode::new(),
            origins: RwLock::new(HashMap::new()),
        }
    }

    pub fn resource(&self) -> &String {
        &self.resource
    }

    /// Origin nodes live as long as the cluster node; they are created on
    /// the first call from the given origin and never destroyed.
    pub fn get_or_create_origin_node(&self, origin: &str) -> Arc<StatisticNode> {
        if let Some(node) = self.origins.read().unwrap().get(origin) {
            return node.clone();
        }
        let mut origins = self.origins.write().unwrap();
        origins
            .entry(origin.to_owned())
            .or_insert_with(|| Arc::new(StatisticNode::new()))
            .clone()
    }

    pub fn origin_node(&self, origin: &str) -> Option<Arc<StatisticNode>> {
        self.origins.read().unwrap().get(origin).cloned()
    }

    pub fn origin_count(&self) -> usize {
        self.origins.read().unwrap().len()
    }
}

impl ReadStat for ClusterNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.stat.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.stat.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.stat.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.stat.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.stat.avg_rt()
    }
}

impl WriteStat for ClusterNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.stat.add_count(event, count);
    }
}

impl ConcurrencyStat for ClusterNode {
    fn current_concurrency(&self) -> u32 {
        self.stat.current_concurrency()
    }
    fn increase_concurrency(&self) {
        self.stat.increase_concurrency();
    }
    fn decrease_concurrency(&self) {
        self.stat.decrease_concurrency();
    }
}

impl StatNode for ClusterNode {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn origin_nodes_are_cached() {
        let cluster = ClusterNode::new("res_cluster".into());
        let a1 = cluster.get_or_create_origin_node("svc-a");
        let a2 = cluster.get_or_create_origin_node("svc-a");
        let b = cluster.get_or_create_origin_node("svc-b");
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(cluster.origin_count(), 2);
        assert!(cluster.origin_node("svc-c").is_none());
    }

    #[test]
    fn origin_stats_are_isolated() {
        let cluster = ClusterNode::new("res_cluster_iso".into());
        let a = cluster.get_or_create_origin_node("svc-a");
        a.add_count(MetricEvent::Pass, 3);
        cluster.add_count(MetricEvent::Pass, 10);
        assert_eq!(a.sum(MetricEvent::Pass), 3);
        assert_eq!(cluster.sum(MetricEvent::Pass), 10);
    }
}
