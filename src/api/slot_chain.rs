use crate::{authority, base::SlotChain, circuitbreaker, flow, log, stat, system};
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    pub static ref GLOBAL_SLOT_CHAIN: Arc<SlotChain> = {
        let mut sc = SlotChain::new();

        sc.add_stat_prepare_slot(stat::default_node_selector_slot()); // 1000
        sc.add_stat_prepare_slot(stat::default_cluster_builder_slot()); // 2000

        sc.add_rule_check_slot(authority::default_slot()); // 1000
        sc.add_rule_check_slot(system::default_slot()); // 2000
        sc.add_rule_check_slot(flow::default_slot()); // 3000
        sc.add_rule_check_slot(circuitbreaker::default_slot()); // 4000

        sc.add_stat_slot(stat::default_resource_stat_slot()); // 1000
        sc.add_stat_slot(log::default_log_slot()); // 2000
        sc.add_stat_slot(circuitbreaker::default_metric_stat_slot()); // 3000
        Arc::new(sc)
    };
}

pub fn global_slot_chain() -> Arc<SlotChain> {
    GLOBAL_SLOT_CHAIN.clone()
}
