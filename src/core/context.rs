//! Task context and invocation tree
//!
//! A `Context` represents the entry point of one task (one per OS thread in
//! the common case). It names the entrance, carries the caller identity
//! (*origin*) and owns both the stack of in-flight entries and the tree of
//! `DefaultNode`s reached from this entrance.
//!
//! The current context lives in a thread-local slot. Tasks hopping threads
//! must transfer it explicitly (`current_context` + `EntryBuilder::with_context`);
//! otherwise their statistics are attributed to the default context, which is
//! documented behavior rather than an error.

use crate::base::{EntryWeakPtr, DEFAULT_CONTEXT_NAME};
use crate::stat::DefaultNode;
use crate::{config, logging, Error, Result};
use lazy_static::lazy_static;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub type ContextPtr = Arc<RwLock<Context>>;

pub const CONTEXT_OVERFLOW: &str =
    "amount of distinct context names exceeds the process limit, context not created";
pub const ERROR_ENTRY_FREE: &str =
    "the entry being exited is not the current top entry of its context, context cleared";

/// Outcome of a pairing check against the context's entry stack.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PopOutcome {
    Popped,
    /// the stack was already empty (cleared by a previous pairing error)
    Empty,
    /// the exited entry is not the top of the stack
    Mismatch,
}

pub struct Context {
    name: String,
    origin: String,
    /// root of the invocation tree for this entrance
    entrance_node: Arc<DefaultNode>,
    /// one DefaultNode per resource reached from this entrance
    node_map: HashMap<String, Arc<DefaultNode>>,
    entry_stack: Vec<EntryFrame>,
}

struct EntryFrame {
    entry: EntryWeakPtr,
    node: Option<Arc<DefaultNode>>,
}

impl Context {
    pub fn new(name: String, origin: String) -> Self {
        let entrance_node = Arc::new(DefaultNode::new(name.clone()));
        Context {
            name,
            origin,
            entrance_node,
            node_map: HashMap::new(),
            entry_stack: Vec::new(),
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn entrance_node(&self) -> Arc<DefaultNode> {
        self.entrance_node.clone()
    }

    /// The node of the invocation tree new entries hang below: the node of
    /// the deepest in-flight entry, or the entrance node for a root entry.
    pub fn current_node(&self) -> Arc<DefaultNode> {
        self.entry_stack
            .iter()
            .rev()
            .find_map(|f| f.node.clone())
            .unwrap_or_else(|| self.entrance_node.clone())
    }

    pub fn get_or_create_node(&mut self, resource: &str) -> Arc<DefaultNode> {
        if let Some(node) = self.node_map.get(resource) {
            return node.clone();
        }
        let node = Arc::new(DefaultNode::new(resource.to_owned()));
        self.node_map.insert(resource.to_owned(), node.clone());
        node
    }

    pub fn entry_count(&self) -> usize {
        self.entry_stack.len()
    }

    pub fn current_entry(&self) -> Option<EntryWeakPtr> {
        self.entry_stack.last().map(|f| f.entry.clone())
    }

    pub(crate) fn push_entry(&mut self, entry: EntryWeakPtr, node: Option<Arc<DefaultNode>>) {
        self.entry_stack.push(EntryFrame { entry, node });
    }

    pub(crate) fn pop_if_top(&mut self, entry: &EntryWeakPtr) -> PopOutcome {
        match self.entry_stack.last() {
            None => PopOutcome::Empty,
            Some(top) if top.entry.ptr_eq(entry) => {
                self.entry_stack.pop();
                PopOutcome::Popped
            }
            Some(_) => PopOutcome::Mismatch,
        }
    }

    pub(crate) fn clear_entries(&mut self) {
        self.entry_stack.clear();
    }
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<ContextPtr>> = RefCell::new(None);
}

lazy_static! {
    static ref CONTEXT_NAME_SET: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// Binds a context to the current task and returns it. If the task already
/// carries a context, the existing one is returned unchanged, even when the
/// names differ. Fails with `CONTEXT_OVERFLOW` once the process has seen the
/// configured amount of distinct context names.
pub fn enter_context(name: &str, origin: &str) -> Result<ContextPtr> {
    if let Some(existing) = current_context() {
        return Ok(existing);
    }
    let ctx = new_context(name, origin)?;
    CURRENT_CONTEXT.with(|c| {
        c.replace(Some(ctx.clone()));
    });
    Ok(ctx)
}

/// The context currently bound to this task, if any.
pub fn current_context() -> Option<ContextPtr> {
    CURRENT_CONTEXT.with(|c| c.borrow().clone())
}

/// Clears the current task binding. Safe to call when none is bound.
pub fn exit_context() {
    CURRENT_CONTEXT.with(|c| {
        c.replace(None);
    });
}

/// Unbinds the given context if, and only if, it is the implicitly created
/// default context currently bound to this task. Called when the last entry
/// of a default context exits so idle tasks do not pin a context forever.
pub(crate) fn exit_context_if_default(ctx: &ContextPtr) {
    if ctx.read().unwrap().name() != DEFAULT_CONTEXT_NAME {
        return;
    }
    CURRENT_CONTEXT.with(|c| {
        let is_current = c
            .borrow()
            .as_ref()
            .map(|cur| Arc::ptr_eq(cur, ctx))
            .unwrap_or(false);
        if is_current {
            c.replace(None);
        }
    });
}

/// The context used when an entry is built without an entered context.
pub(crate) fn get_or_create_default_context() -> ContextPtr {
    if let Some(existing) = current_context() {
        return existing;
    }
    // the default name bypasses the overflow check, so this cannot fail
    let ctx = new_context(DEFAULT_CONTEXT_NAME, "").unwrap();
    CURRENT_CONTEXT.with(|c| {
        c.replace(Some(ctx.clone()));
    });
    ctx
}

fn new_context(name: &str, origin: &str) -> Result<ContextPtr> {
    if name != DEFAULT_CONTEXT_NAME {
        let mut names = CONTEXT_NAME_SET.lock().unwrap();
        if !names.contains(name) {
            if names.len() >= config::max_context_name_amount() {
                logging::warn!(
                    "[Context] Amount of distinct context names exceeds the limit {}, name {}",
                    config::max_context_name_amount(),
                    name
                );
                return Err(Error::msg(CONTEXT_OVERFLOW));
            }
            names.insert(name.to_owned());
        }
    }
    Ok(Arc::new(RwLock::new(Context::new(
        name.to_owned(),
        origin.to_owned(),
    ))))
}
