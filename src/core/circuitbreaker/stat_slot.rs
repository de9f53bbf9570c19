use super::*;
use crate::base::{BaseSlot, EntryContext, StatSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 3000;

/// MetricStatSlot feeds every completed invocation, with its round trip
/// time and traced error, to the breakers of the resource.
pub struct MetricStatSlot {}

lazy_static! {
    pub static ref DEFAULT_METRIC_STAT_SLOT: Arc<MetricStatSlot> = Arc::new(MetricStatSlot {});
}

pub fn default_metric_stat_slot() -> Arc<MetricStatSlot> {
    DEFAULT_METRIC_STAT_SLOT.clone()
}

impl BaseSlot for MetricStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for MetricStatSlot {
    fn on_completed(&self, ctx: &mut EntryContext) {
        let res = ctx.resource().name().clone();
        let rt = ctx.round_trip();
        for cb in get_breakers_of_resource(&res) {
            cb.on_request_complete(rt, ctx.get_err());
        }
    }
}
