use super::global_slot_chain;
use crate::base::{
    EntryContext, EntryInput, EntryStrongPtr, GuardEntry, ParamsList, ParamsMap, ResourceType,
    ResourceWrapper, SlotChain, TokenResult, TrafficType,
};
use crate::context::{self, ContextPtr};
use crate::utils::format_time_nanos_curr;
use crate::{Error, Result};
use std::sync::{Arc, RwLock};

/// EntryBuilder is the basic API of the engine: it wires the resource
/// descriptor and caller input into an entry context, runs the slot chain
/// and, on pass, pushes the entry onto its context's stack.
pub struct EntryBuilder {
    resource_name: String,
    resource_type: ResourceType,
    traffic_type: TrafficType,
    batch_count: u32,
    prioritized: bool,
    slot_chain: Arc<SlotChain>,
    /// explicit context for async continuations; the thread-local context
    /// (or the implicit default context) is used when absent
    context: Option<ContextPtr>,
    args: Option<ParamsList>,
    attachments: Option<ParamsMap>,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        EntryBuilder {
            resource_name: format_time_nanos_curr(),
            resource_type: ResourceType::default(),
            traffic_type: TrafficType::default(),
            batch_count: 1,
            prioritized: false,
            slot_chain: global_slot_chain(),
            context: None,
            args: None,
            attachments: None,
        }
    }
}

impl EntryBuilder {
    pub fn new(resource_name: String) -> Self {
        EntryBuilder {
            resource_name,
            ..EntryBuilder::default()
        }
    }

    /// `build()` consumes the EntryBuilder. It fails with a `BlockError`
    /// wrapped in the crate error when the calling is rejected; a blocked
    /// entry must not be exited.
    pub fn build(self) -> Result<EntryStrongPtr> {
        let task_ctx = match self.context {
            Some(ctx) => ctx,
            None => context::get_or_create_default_context(),
        };

        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            self.resource_name,
            self.resource_type,
            self.traffic_type,
        ));
        let mut input = EntryInput::new(self.batch_count, self.prioritized);
        if let Some(args) = self.args {
            input.set_args(args);
        }
        if let Some(attachments) = self.attachments {
            input.set_attachments(attachments);
        }
        ctx.set_input(input);
        ctx.set_context(task_ctx.clone());

        let ctx = Arc::new(RwLock::new(ctx));
        let entry = Arc::new(RwLock::new(GuardEntry::new(
            Arc::clone(&ctx),
            Arc::clone(&self.slot_chain),
        )));
        entry.write().unwrap().set_weak(Arc::downgrade(&entry));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));

        let r = self.slot_chain.entry(Arc::clone(&ctx));
        match r {
            TokenResult::Blocked(block_err) => {
                // run the hooks slots may have registered (e.g. the
                // half-open probe rollback), then surface the rejection
                entry.read().unwrap().exit().ok();
                Err(Error::new(block_err))
            }
            _ => {
                let node = ctx.read().unwrap().default_node();
                task_ctx
                    .write()
                    .unwrap()
                    .push_entry(Arc::downgrade(&entry), node);
                Ok(EntryStrongPtr::new(entry))
            }
        }
    }

    /// The boolean variant of `build()`: `None` on rejection. Call `exit`
    /// only when an entry was returned.
    pub fn try_build(self) -> Option<EntryStrongPtr> {
        self.build().ok()
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_prioritized(mut self, prioritized: bool) -> Self {
        self.prioritized = prioritized;
        self
    }

    pub fn with_slot_chain(mut self, slot_chain: Arc<SlotChain>) -> Self {
        self.slot_chain = slot_chain;
        self
    }

    /// Attaches the entry to a carried context instead of the task-local
    /// one; obtain it on the original task with `current_context()`.
    pub fn with_context(mut self, context: ContextPtr) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_args(mut self, args: Option<ParamsList>) -> Self {
        self.args = args;
        self
    }

    pub fn with_attachments(mut self, attachments: Option<ParamsMap>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Attributes a business error to the in-flight entry, feeding the
/// error-based circuit breakers on completion.
pub fn trace_error(entry: &EntryStrongPtr, err: Error) {
    entry.set_err(err);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{BlockType, MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};
    use mockall::*;

    #[test]
    fn pass() {
        let mut ps = Arc::new(MockStatPrepareSlot::new());
        let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
        let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());

        let mut seq = Sequence::new();
        Arc::get_mut(&mut ps)
            .unwrap()
            .expect_prepare()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut rcs1)
            .unwrap()
            .expect_check()
            .once()
            .in_sequence(&mut seq)
            .returning(|_ctx| TokenResult::new_pass());
        Arc::get_mut(&mut rcs2)
            .unwrap()
            .expect_check()
            .once()
            .in_sequence(&mut seq)
            .returning(|_ctx| TokenResult::new_pass());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_entry_pass()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_entry_blocked()
            .never()
            .return_const(());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_completed()
            .once()
            .in_sequence(&mut seq)
            .return_const(());

        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(ps.clone());
        sc.add_rule_check_slot(rcs1.clone());
        sc.add_rule_check_slot(rcs2.clone());
        sc.add_stat_slot(ssm.clone());
        let sc = Arc::new(sc);

        let builder = EntryBuilder::new("api_pass_res".into()).with_slot_chain(sc);
        let entry = builder.build().unwrap();
        assert_eq!(
            "api_pass_res",
            entry.context().read().unwrap().resource().name()
        );
        entry.exit().unwrap();
    }

    #[test]
    fn block() {
        let mut ps = Arc::new(MockStatPrepareSlot::new());
        let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
        let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());

        let mut seq = Sequence::new();
        Arc::get_mut(&mut ps)
            .unwrap()
            .expect_prepare()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut rcs1)
            .unwrap()
            .expect_check()
            .once()
            .in_sequence(&mut seq)
            .returning(|_ctx| TokenResult::new_pass());
        Arc::get_mut(&mut rcs2)
            .unwrap()
            .expect_check()
            .once()
            .in_sequence(&mut seq)
            .returning(|_ctx| TokenResult::new_blocked(BlockType::Flow));
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_entry_pass()
            .never()
            .return_const(());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_entry_blocked()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_completed()
            .never()
            .return_const(());

        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(ps);
        sc.add_rule_check_slot(rcs1);
        sc.add_rule_check_slot(rcs2);
        sc.add_stat_slot(ssm);
        let sc = Arc::new(sc);

        let builder = EntryBuilder::new("api_block_res".into()).with_slot_chain(sc);
        let err = builder.build().unwrap_err();
        let block_err = err.downcast_ref::<crate::base::BlockError>().unwrap();
        assert_eq!(block_err.block_type(), BlockType::Flow);
    }

    #[test]
    fn try_build_converts_block_to_none() {
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .returning(|_ctx| TokenResult::new_blocked(BlockType::SystemFlow));
        let mut sc = SlotChain::new();
        sc.add_rule_check_slot(rcs);
        let builder = EntryBuilder::new("api_try_res".into()).with_slot_chain(Arc::new(sc));
        assert!(builder.try_build().is_none());
    }
}
