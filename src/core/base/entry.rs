use super::{EntryContextPtr, SlotChain};
use crate::context::{self, PopOutcome, ERROR_ENTRY_FREE};
use crate::{logging, Error, Result};
use std::sync::{Arc, RwLock, Weak};

type ExitHandler = Box<dyn Send + Sync + Fn(&GuardEntry, EntryContextPtr) -> Result<()>>;

type EntryStrongPtrInner = Arc<RwLock<GuardEntry>>;
pub struct EntryStrongPtr(EntryStrongPtrInner);

impl std::fmt::Debug for EntryStrongPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStrongPtr").finish_non_exhaustive()
    }
}
pub type EntryWeakPtr = Weak<RwLock<GuardEntry>>;

/// One in-flight protected invocation. Entries of a task context form a
/// strict LIFO stack; `exit` must be called exactly once on the entry that
/// is currently on top, otherwise the context is cleared and an
/// `ERROR_ENTRY_FREE` error is reported.
pub struct GuardEntry {
    ctx: EntryContextPtr,
    /// self reference used for identity pairing against the context stack
    me: Option<EntryWeakPtr>,
    /// registered by slots to run custom logic on exit
    exit_handlers: Vec<ExitHandler>,
    /// each entry traverses the shared slot chain
    sc: Arc<SlotChain>,
}

impl GuardEntry {
    pub fn new(ctx: EntryContextPtr, sc: Arc<SlotChain>) -> Self {
        GuardEntry {
            ctx,
            me: None,
            exit_handlers: Vec::new(),
            sc,
        }
    }

    pub fn set_weak(&mut self, me: EntryWeakPtr) {
        self.me = Some(me);
    }

    pub fn when_exit(&mut self, exit_handler: ExitHandler) {
        self.exit_handlers.push(exit_handler);
    }

    pub fn context(&self) -> &EntryContextPtr {
        &self.ctx
    }

    pub fn set_err(&self, err: Error) {
        self.ctx.write().unwrap().set_err(err);
    }

    fn run_exit_handlers(&self) {
        for handler in &self.exit_handlers {
            if let Err(err) = handler(self, self.ctx.clone()) {
                logging::error!("[GuardEntry] exit handler failed: {:?}", err);
            }
        }
    }

    /// Finishes the invocation: verifies LIFO pairing by identity, records
    /// completion statistics and pops this entry off its context stack.
    pub fn exit(&self) -> Result<()> {
        if self.ctx.read().unwrap().is_blocked() {
            // a blocked entry was never pushed; only its hooks run
            self.run_exit_handlers();
            return Ok(());
        }
        let task_ctx = self.ctx.read().unwrap().context().cloned();
        if let Some(task_ctx) = task_ctx {
            let me = self.me.as_ref().expect("entry weak reference must be set");
            let outcome = {
                let mut c = task_ctx.write().unwrap();
                let outcome = c.pop_if_top(me);
                if outcome == PopOutcome::Mismatch {
                    c.clear_entries();
                }
                outcome
            };
            match outcome {
                PopOutcome::Popped => {
                    let empty = task_ctx.read().unwrap().entry_count() == 0;
                    if empty {
                        context::exit_context_if_default(&task_ctx);
                    }
                }
                // the context was cleared by an earlier pairing error;
                // stay quiet to avoid a cascade of reports
                PopOutcome::Empty => return Ok(()),
                PopOutcome::Mismatch => {
                    logging::error!(
                        "[GuardEntry] {}: resource {}",
                        ERROR_ENTRY_FREE,
                        self.ctx.read().unwrap().resource().name()
                    );
                    return Err(Error::msg(ERROR_ENTRY_FREE));
                }
            }
        }
        self.run_exit_handlers();
        self.sc.exit(self.ctx.clone());
        Ok(())
    }
}

impl EntryStrongPtr {
    pub fn new(entry: EntryStrongPtrInner) -> EntryStrongPtr {
        EntryStrongPtr(entry)
    }

    pub fn context(&self) -> EntryContextPtr {
        let entry = self.0.read().unwrap();
        entry.context().clone()
    }

    pub fn set_err(&self, err: Error) {
        self.0.read().unwrap().set_err(err);
    }

    pub fn exit(&self) -> Result<()> {
        self.0.read().unwrap().exit()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::EntryContext;
    use std::cell::RefCell;

    std::thread_local! {
        static EXIT_FLAG: RefCell<u8> = RefCell::new(0);
    }

    fn exit_handler_mock(_entry: &GuardEntry, _ctx: EntryContextPtr) -> Result<()> {
        EXIT_FLAG.with(|f| {
            *f.borrow_mut() += 1;
        });
        Ok(())
    }

    #[test]
    fn exit_runs_handlers() {
        let sc = Arc::new(SlotChain::new());
        let ctx = Arc::new(RwLock::new(EntryContext::new()));
        let mut entry = GuardEntry::new(ctx.clone(), sc);
        entry.when_exit(Box::new(exit_handler_mock));
        let entry = Arc::new(RwLock::new(entry));
        entry.write().unwrap().set_weak(Arc::downgrade(&entry));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));
        entry.read().unwrap().exit().unwrap();
        EXIT_FLAG.with(|f| {
            assert_eq!(*f.borrow(), 1);
        });
    }
}
