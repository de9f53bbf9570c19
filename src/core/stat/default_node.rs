use super::{ClusterNode, StatisticNode};
use crate::base::{ConcurrencyStat, MetricEvent, ReadStat, StatNode, WriteStat};
use std::sync::{Arc, RwLock};

/// DefaultNode holds the statistics of one resource seen from one entry
/// context. Its children are the sub-resources reached from this one, so
/// the nodes of a context form the invocation tree rooted at the entrance.
#[derive(Debug)]
pub struct DefaultNode {
    resource: String,
    stat: StatisticNode,
    /// the per-resource aggregate, attached on first encounter
    cluster_node: RwLock<Option<Arc<ClusterNode>>>,
    children: RwLock<Vec<Arc<DefaultNode>>>,
}

impl DefaultNode {
    pub fn new(resource: String) -> Self {
        DefaultNode {
            resource,
            stat: StatisticNode::new(),
            cluster_node: RwLock::new(None),
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn resource(&self) -> &String {
        &self.resource
    }

    pub fn set_cluster_node(&self, cluster: Arc<ClusterNode>) {
        let mut slot = self.cluster_node.write().unwrap();
        if slot.is_none() {
            *slot = Some(cluster);
        }
    }

    pub fn cluster_node(&self) -> Option<Arc<ClusterNode>> {
        self.cluster_node.read().unwrap().clone()
    }

    pub fn add_child_if_absent(&self, child: Arc<DefaultNode>) {
        {
            let children = self.children.read().unwrap();
            if children.iter().any(|c| c.resource == child.resource) {
                return;
            }
        }
        let mut children = self.children.write().unwrap();
        if !children.iter().any(|c| c.resource == child.resource) {
            children.push(child);
        }
    }

    pub fn children(&self) -> Vec<Arc<DefaultNode>> {
        self.children.read().unwrap().clone()
    }
}

impl ReadStat for DefaultNode {
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

impl WriteStat for DefaultNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.stat.add_count(event, count);
    }
}

impl ConcurrencyStat for DefaultNode {
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

impl StatNode for DefaultNode {}
