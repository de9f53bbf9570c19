use super::{BlockError, EntryContext, EntryContextPtr, TokenResult, SLOT_INIT};
use crate::logging;
use crate::utils::AsAny;
use std::any::Any;
use std::sync::Arc;

/// The slot chain sorts the slots of each bucket (preparation, rule checking
/// and statistics) by ascending `order()`; ties keep registration order.
pub trait BaseSlot: Any + AsAny + Sync + Send {
    /// order returns the sort value of the slot.
    fn order(&self) -> u32 {
        0
    }
}

/// StatPrepareSlot is responsible for preparation before the statistics and
/// the rule checks, e.g. resolving the nodes of this resource. The results
/// are stored in the EntryContext. All StatPrepareSlots execute in sequence.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, _ctx: &mut EntryContext) {}
}

/// RuleCheckSlot is a rule based checking strategy. A blocked result aborts
/// the chain: subsequent check slots are not invoked.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        ctx.result().clone()
    }
}

/// StatSlot records the outcome of the rule checks.
pub trait StatSlot: BaseSlot {
    /// on_entry_pass is invoked when all rule check slots passed
    fn on_entry_pass(&self, _ctx: &EntryContext) {}
    /// on_entry_blocked is invoked when a rule check slot blocked the entry;
    /// block_error carries the block detail
    fn on_entry_blocked(&self, _ctx: &EntryContext, _block_error: BlockError) {}
    /// on_completed is invoked when a passed entry exits;
    /// blocked entries never reach this function
    fn on_completed(&self, _ctx: &mut EntryContext) {}
}

/// SlotChain holds the built-in slots and any customized slots.
pub struct SlotChain {
    /// stat_pres is in ascending order by StatPrepareSlot.order() value.
    pub(self) stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    /// rule_checks is in ascending order by RuleCheckSlot.order() value.
    pub(self) rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    /// stats is in ascending order by StatSlot.order() value.
    pub(self) stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Default::default()
    }

    // the sorts below are stable, so slots with equal order values
    // keep their registration order

    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        self.stat_pres.push(s);
        self.stat_pres.sort_by_key(|a| a.order());
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        self.rule_checks.push(s);
        self.rule_checks.sort_by_key(|a| a.order());
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        self.stats.push(s);
        self.stats.sort_by_key(|a| a.order());
    }

    /// The entrance of the slot chain. Returns the final TokenResult.
    pub fn entry(&self, ctx_ptr: EntryContextPtr) -> TokenResult {
        let mut ctx = ctx_ptr.write().unwrap();
        // execute the preparation slots
        for s in &self.stat_pres {
            s.prepare(&mut ctx);
        }

        // execute the rule check slots; the first block aborts the chain
        ctx.reset_result_to_pass();
        for s in &self.rule_checks {
            let res = s.check(&mut ctx);
            if res.is_blocked() {
                ctx.set_result(res);
                break;
            }
        }

        // execute the statistic slots
        for s in &self.stats {
            if ctx.result().is_pass() {
                s.on_entry_pass(&ctx)
            } else if ctx.result().is_blocked() {
                // the block error cannot be none here
                s.on_entry_blocked(&ctx, ctx.result().block_err().unwrap())
            }
        }
        ctx.result().clone()
    }

    /// Runs the statistic slots of a passed entry in reverse registration
    /// semantics on exit. Blocked entries are skipped.
    pub fn exit(&self, ctx_ptr: EntryContextPtr) {
        let mut ctx = ctx_ptr.write().unwrap();
        if ctx.entry().is_none() {
            logging::error!("GuardEntry is nil in SlotChain.exit()");
            return;
        }
        if ctx.is_blocked() {
            return;
        }
        // on_completed is called only for entries that passed
        for s in &self.stats {
            s.on_completed(&mut ctx);
        }
    }
}

#[cfg(test)]
pub(crate) use test::aggregation::{MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};
