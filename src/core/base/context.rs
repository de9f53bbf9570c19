//! Per-entry evaluation context
//!
use super::{EntryWeakPtr, ResourceWrapper, TokenResult};
use crate::context::ContextPtr;
use crate::stat::{ClusterNode, DefaultNode, StatisticNode};
use crate::utils::time::curr_time_millis;
use crate::Error;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type EntryContextPtr = Arc<RwLock<EntryContext>>;

/// EntryContext carries the state of one evaluation through the slot chain:
/// the resource descriptor, the caller input, the statistics nodes resolved
/// by the preparation slots and the rule check result.
#[derive(Default)]
pub struct EntryContext {
    /// entry<->context is a cycled reference, so the back pointer is Weak
    entry: Option<EntryWeakPtr>,
    /// the task context this entry belongs to
    context: Option<ContextPtr>,
    /// snapshot of the task context identity, taken at build time so the
    /// rule checks do not need to lock the task context again
    context_name: String,
    origin: String,
    /// used to calculate RT
    start_time: u64,
    /// the round trip time of this transaction
    round_trip: u64,
    resource: ResourceWrapper,
    /// per (resource, context) node, resolved by the node selector slot
    default_node: Option<Arc<DefaultNode>>,
    /// per resource node, resolved by the cluster builder slot
    cluster_node: Option<Arc<ClusterNode>>,
    /// per (resource, origin) node, resolved by the cluster builder slot
    origin_node: Option<Arc<StatisticNode>>,
    input: EntryInput,
    /// the result of the rule check slots
    rule_check_result: TokenResult,
    err: Option<Error>,
}

impl EntryContext {
    pub fn new() -> Self {
        EntryContext {
            start_time: curr_time_millis(),
            ..Default::default()
        }
    }

    pub fn set_entry(&mut self, entry: EntryWeakPtr) {
        self.entry = Some(entry);
    }

    pub fn entry(&self) -> Option<&EntryWeakPtr> {
        self.entry.as_ref()
    }

    pub fn set_context(&mut self, context: ContextPtr) {
        {
            let ctx = context.read().unwrap();
            self.context_name = ctx.name().clone();
            self.origin = ctx.origin().clone();
        }
        self.context = Some(context);
    }

    pub fn context(&self) -> Option<&ContextPtr> {
        self.context.as_ref()
    }

    pub fn context_name(&self) -> &String {
        &self.context_name
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn is_blocked(&self) -> bool {
        self.rule_check_result.is_blocked()
    }

    pub fn set_round_trip(&mut self, round_trip: u64) {
        self.round_trip = round_trip
    }

    pub fn round_trip(&self) -> u64 {
        self.round_trip
    }

    pub fn set_resource(&mut self, resource: ResourceWrapper) {
        self.resource = resource;
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn set_input(&mut self, input: EntryInput) {
        self.input = input;
    }

    pub fn input(&self) -> &EntryInput {
        &self.input
    }

    pub fn set_default_node(&mut self, node: Arc<DefaultNode>) {
        self.default_node = Some(node);
    }

    pub fn default_node(&self) -> Option<Arc<DefaultNode>> {
        self.default_node.clone()
    }

    pub fn set_cluster_node(&mut self, node: Arc<ClusterNode>) {
        self.cluster_node = Some(node);
    }

    pub fn cluster_node(&self) -> Option<Arc<ClusterNode>> {
        self.cluster_node.clone()
    }

    pub fn set_origin_node(&mut self, node: Arc<StatisticNode>) {
        self.origin_node = Some(node);
    }

    pub fn origin_node(&self) -> Option<Arc<StatisticNode>> {
        self.origin_node.clone()
    }

    pub fn set_result(&mut self, result: TokenResult) {
        self.rule_check_result = result;
    }

    pub fn reset_result_to_pass(&mut self) {
        self.rule_check_result.reset_to_pass();
    }

    pub fn result(&self) -> &TokenResult {
        &self.rule_check_result
    }

    pub fn set_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    pub fn get_err(&self) -> &Option<Error> {
        &self.err
    }
}

pub type ParamKey = String;
pub type ParamsList = Vec<ParamKey>;
pub type ParamsMap = HashMap<String, ParamKey>;

/// Input of the policy algorithms
#[derive(Debug)]
pub struct EntryInput {
    batch_count: u32,
    /// prioritized requests may borrow tokens from a future window
    prioritized: bool,
    args: Option<ParamsList>,
    attachments: Option<ParamsMap>,
}

impl Default for EntryInput {
    fn default() -> Self {
        EntryInput {
            batch_count: 1,
            prioritized: false,
            args: None,
            attachments: None,
        }
    }
}

impl EntryInput {
    pub fn new(batch_count: u32, prioritized: bool) -> Self {
        EntryInput {
            batch_count,
            prioritized,
            ..Default::default()
        }
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn prioritized(&self) -> bool {
        self.prioritized
    }

    pub fn set_args(&mut self, args: ParamsList) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&ParamsList> {
        self.args.as_ref()
    }

    pub fn set_attachments(&mut self, attachments: ParamsMap) {
        self.attachments = Some(attachments);
    }

    pub fn attachments(&self) -> Option<&ParamsMap> {
        self.attachments.as_ref()
    }
}
