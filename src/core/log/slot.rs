use crate::base::{BaseSlot, BlockError, EntryContext, StatSlot};
use crate::logging;
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 2000;

lazy_static! {
    pub static ref DEFAULT_LOG_SLOT: Arc<LogSlot> = Arc::new(LogSlot {});
}

pub fn default_log_slot() -> Arc<LogSlot> {
    DEFAULT_LOG_SLOT.clone()
}

/// LogSlot records every block event to the logger.
pub struct LogSlot {}

impl BaseSlot for LogSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for LogSlot {
    fn on_entry_blocked(&self, ctx: &EntryContext, block_error: BlockError) {
        logging::info!(
            "[BlockLog] resource {} blocked, origin {}, context {}, detail: {}",
            ctx.resource().name(),
            ctx.origin(),
            ctx.context_name(),
            block_error
        );
    }
}
