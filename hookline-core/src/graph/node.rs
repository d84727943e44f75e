//! Tree Nodes
//!
//! This module defines the nodes that make up a component tree and the
//! [`NodeSpec`] builder used to describe them before insertion.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::reactive::{DepValue, EffectSlot, EffectSpec, MemoCache, RenderCx};

/// Unique identifier for a node within one tree.
///
/// Ids are issued in creation order and never reused, so a removed node's
/// id stays recognisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hook invoked every time the node renders.
pub type RenderHook = Arc<dyn Fn(&mut RenderCx<'_>) + Send + Sync>;

/// Description of a node (and its children) to insert into a tree.
#[derive(Clone, Default)]
pub struct NodeSpec {
    label: String,
    values: IndexMap<String, DepValue>,
    effects: Vec<EffectSpec>,
    children: Vec<NodeSpec>,
    render: Option<RenderHook>,
}

impl NodeSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Initial value for a state or prop key.
    pub fn value(mut self, key: impl Into<String>, value: impl Into<DepValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn effect(mut self, effect: EffectSpec) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn on_render<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RenderCx<'_>) + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(hook));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn effects(&self) -> &[EffectSpec] {
        &self.effects
    }

    pub fn children(&self) -> &[NodeSpec] {
        &self.children
    }

    /// Split into the node's own parts and its child specs.
    pub(crate) fn into_parts(self) -> (NodeParts, Vec<NodeSpec>) {
        let parts = NodeParts {
            label: self.label,
            values: self.values,
            effects: self.effects,
            render: self.render,
        };
        (parts, self.children)
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("label", &self.label)
            .field("values", &self.values)
            .field("effects", &self.effects)
            .field("children", &self.children)
            .finish()
    }
}

pub(crate) struct NodeParts {
    label: String,
    values: IndexMap<String, DepValue>,
    effects: Vec<EffectSpec>,
    render: Option<RenderHook>,
}

/// A mounted (or unmounting) node in the tree arena.
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// Label appended to the render log.
    label: String,

    /// Parent lookup. The arena owns every node; this is not ownership.
    parent: Option<NodeId>,

    /// Children in insertion order.
    children: Vec<NodeId>,

    /// Declared effects, fixed at creation.
    effects: Vec<EffectSlot>,

    /// State and props readable by this node's and descendants' effects.
    values: IndexMap<String, DepValue>,

    render: Option<RenderHook>,

    /// Shared with every `Updater` handed out for this node.
    mounted: Arc<AtomicBool>,

    pub(crate) memos: MemoCache,

    render_count: usize,
}

impl Node {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, parts: NodeParts) -> Self {
        Self {
            id,
            label: parts.label,
            parent,
            children: Vec::new(),
            effects: parts.effects.into_iter().map(EffectSlot::new).collect(),
            values: parts.values,
            render: parts.render,
            mounted: Arc::new(AtomicBool::new(true)),
            memos: MemoCache::new(),
            render_count: 0,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn effects(&self) -> &[EffectSlot] {
        &self.effects
    }

    /// Look up an effect slot by its label.
    pub fn effect(&self, label: &str) -> Option<&EffectSlot> {
        self.effects.iter().find(|slot| slot.label() == label)
    }

    pub(crate) fn effects_mut(&mut self) -> &mut [EffectSlot] {
        &mut self.effects
    }

    /// This node's own value for `key`, without looking at ancestors.
    pub fn own_value(&self, key: &str) -> Option<&DepValue> {
        self.values.get(key)
    }

    pub fn values(&self) -> &IndexMap<String, DepValue> {
        &self.values
    }

    pub fn memos(&self) -> &MemoCache {
        &self.memos
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub(crate) fn mounted_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.mounted)
    }

    pub(crate) fn mark_unmounted(&mut self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub(crate) fn apply_changes<I>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (String, DepValue)>,
    {
        self.values.extend(changes);
    }

    pub(crate) fn add_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) {
        self.children.retain(|c| *c != child);
    }

    pub(crate) fn render_hook(&self) -> Option<RenderHook> {
        self.render.clone()
    }

    pub(crate) fn mark_rendered(&mut self) {
        self.render_count += 1;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("effects", &self.effects)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
