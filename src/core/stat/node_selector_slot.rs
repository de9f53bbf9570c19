use crate::base::{BaseSlot, EntryContext, StatPrepareSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const PREPARE_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_NODE_SELECTOR_SLOT: Arc<NodeSelectorSlot> = Arc::new(NodeSelectorSlot {});
}

pub fn default_node_selector_slot() -> Arc<NodeSelectorSlot> {
    DEFAULT_NODE_SELECTOR_SLOT.clone()
}

/// NodeSelectorSlot maintains the tree of DefaultNodes per context: it
/// resolves (or creates) the DefaultNode of this resource in the current
/// context, hangs it below the node of the deepest in-flight entry and
/// stores it on the entry context.
pub struct NodeSelectorSlot {}

impl BaseSlot for NodeSelectorSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for NodeSelectorSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        let task_ctx = match ctx.context() {
            Some(c) => c.clone(),
            None => return,
        };
        let res_name = ctx.resource().name().clone();
        if res_name.is_empty() {
            return;
        }
        let node = {
            let mut c = task_ctx.write().unwrap();
            let node = c.get_or_create_node(&res_name);
            let parent = c.current_node();
            if !Arc::ptr_eq(&parent, &node) {
                parent.add_child_if_absent(node.clone());
            }
            node
        };
        ctx.set_default_node(node);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper, TrafficType};
    use crate::context::Context;
    use std::sync::RwLock;

    #[test]
    fn resolves_node_and_links_tree() {
        let slot = NodeSelectorSlot {};
        let task_ctx = Arc::new(RwLock::new(Context::new("ctx_sel".into(), "".into())));
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            "res_sel".into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        ctx.set_context(task_ctx.clone());
        slot.prepare(&mut ctx);

        let node = ctx.default_node().unwrap();
        assert_eq!(node.resource(), "res_sel");
        let entrance = task_ctx.read().unwrap().entrance_node();
        assert!(entrance
            .children()
            .iter()
            .any(|c| Arc::ptr_eq(c, &node)));
    }

    #[test]
    fn same_resource_same_node() {
        let slot = NodeSelectorSlot {};
        let task_ctx = Arc::new(RwLock::new(Context::new("ctx_sel2".into(), "".into())));
        let mut first = EntryContext::new();
        first.set_resource(ResourceWrapper::new(
            "res_sel2".into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        first.set_context(task_ctx.clone());
        slot.prepare(&mut first);

        let mut second = EntryContext::new();
        second.set_resource(ResourceWrapper::new(
            "res_sel2".into(),
            ResourceType::Common,
            TrafficType::Inbound,
        ));
        second.set_context(task_ctx);
        slot.prepare(&mut second);

        assert!(Arc::ptr_eq(
            &first.default_node().unwrap(),
            &second.default_node().unwrap()
        ));
    }
}
