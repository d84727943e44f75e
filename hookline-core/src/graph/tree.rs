//! Component Tree
//!
//! The tree owns every node in an arena indexed by [`NodeId`]. Nodes refer to
//! their parent and children by id only.
//!
//! # Lifecycle
//!
//! - `create_node` inserts a subtree. Its effects run on the next pass.
//! - `request_update` queues value changes. They apply when the next pass
//!   starts, all at once.
//! - `remove_node` clears a subtree's mounted flags right away, so it stops
//!   rendering and its updaters go stale. The nodes stay linked in place
//!   until the next pass runs their cleanups in tree post-order, however
//!   many separate removals happened; then they leave the arena.
//!
//! Nothing in this module runs effects; it only records what a pass needs.

use std::collections::{HashMap, HashSet};

use super::node::{Node, NodeId, NodeSpec};
use crate::error::TreeError;
use crate::reactive::{DeferredQueue, DepValue, Updater};
use crate::reactive::updater::SharedQueue;

/// A component tree with its pending work.
pub struct Tree {
    /// All nodes still in the arena, including unmounting ones.
    nodes: HashMap<NodeId, Node>,

    root: NodeId,

    next_id: u64,

    /// Number of passes started so far.
    pass: u64,

    queue: SharedQueue,

    deferred: DeferredQueue,

    /// Removed nodes waiting for their cleanups.
    unmounting: HashSet<NodeId>,
}

impl Tree {
    /// Create a tree from a root description. Nothing runs until the first
    /// pass.
    pub fn new(root: NodeSpec) -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId::from(0),
            next_id: 0,
            pass: 0,
            queue: SharedQueue::default(),
            deferred: DeferredQueue::new(),
            unmounting: HashSet::new(),
        };
        tree.root = tree.insert(None, root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Insert `spec` and its children under `parent`.
    pub fn create_node(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId, TreeError> {
        self.check_mounted(parent).map_err(|err| match err {
            TreeError::Removed(id) => TreeError::InvalidParent(id),
            other => other,
        })?;

        let id = self.insert(Some(parent), spec);
        tracing::debug!(node = %id, parent = %parent, "created node");
        Ok(id)
    }

    fn insert(&mut self, parent: Option<NodeId>, spec: NodeSpec) -> NodeId {
        let id = NodeId::from(self.next_id);
        self.next_id += 1;

        let (parts, children) = spec.into_parts();
        self.nodes.insert(id, Node::new(id, parent, parts));
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.add_child(id);
        }

        for child in children {
            self.insert(Some(id), child);
        }
        id
    }

    /// Unmount a node and its subtree. Cleanups run on the next pass.
    ///
    /// Removing a node that is already gone succeeds without doing anything.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        match self.check_mounted(id) {
            Ok(()) => {}
            Err(TreeError::Removed(_)) => return Ok(()),
            Err(err) => return Err(err),
        }

        let subtree = self.post_order(id);
        {
            let mut queue = self.queue.lock();
            for node_id in &subtree {
                queue.forget(*node_id);
            }
        }
        for node_id in &subtree {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.mark_unmounted();
            }
        }

        tracing::debug!(node = %id, subtree = subtree.len(), "removed node");
        self.unmounting.extend(subtree);
        Ok(())
    }

    /// Queue value changes for a node. They apply at the start of the next
    /// pass; several requests before that pass collapse into one batch.
    pub fn request_update<I, K, V>(&mut self, id: NodeId, changes: I) -> Result<(), TreeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DepValue>,
    {
        self.check_mounted(id)?;
        self.queue
            .lock()
            .push(id, changes.into_iter().map(|(k, v)| (k.into(), v.into())));
        Ok(())
    }

    /// A handle that keeps requesting updates for `id` until it unmounts.
    pub fn updater(&self, id: NodeId) -> Result<Updater, TreeError> {
        self.check_mounted(id)?;
        Ok(self.updater_unchecked(id))
    }

    pub(crate) fn updater_unchecked(&self, id: NodeId) -> Updater {
        let mounted = self
            .nodes
            .get(&id)
            .map(Node::mounted_flag)
            .unwrap_or_default();
        Updater::new(id, mounted, self.queue.clone())
    }

    /// Memoized computation scoped to a node. See [`crate::reactive::MemoCache`].
    pub fn get_or_compute<T, F>(
        &mut self,
        id: NodeId,
        key: &str,
        deps: &[DepValue],
        compute: F,
    ) -> Result<T, TreeError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.check_mounted(id)?;
        let pass = self.pass;
        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        Ok(node.memos.get_or_compute(key, deps, pass, compute))
    }

    /// Run deferred tasks queued by effects. Returns how many ran.
    pub fn flush_deferred(&self) -> usize {
        self.deferred.flush()
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(Node::parent)
    }

    /// Child ids of `id`, including removed children whose cleanups have
    /// not run yet.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(Node::children).unwrap_or_default()
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(Node::label)
    }

    /// First mounted node with `label`, in render order.
    pub fn find_by_label(&self, label: &str) -> Option<NodeId> {
        self.pre_order(self.root)
            .into_iter()
            .find(|id| self.label(*id) == Some(label))
    }

    pub fn is_mounted(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(Node::is_mounted)
    }

    /// Resolve `key` on `id`, then on its nearest ancestor holding it.
    pub fn value(&self, id: NodeId, key: &str) -> DepValue {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(&c)) {
            if let Some(value) = node.own_value(key) {
                return value.clone();
            }
            current = node.parent();
        }
        DepValue::Undefined
    }

    pub(crate) fn resolve(&self, id: NodeId, keys: &[String]) -> Vec<DepValue> {
        keys.iter().map(|key| self.value(id, key)).collect()
    }

    /// Number of nodes in the arena, unmounting ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of passes started so far.
    pub fn pass_count(&self) -> u64 {
        self.pass
    }

    /// Whether the next pass has queued updates or unmounts to process.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.lock().is_empty() || !self.unmounting.is_empty()
    }

    /// Start a pass: bump the counter and apply every queued update.
    pub(crate) fn begin_pass(&mut self) -> u64 {
        self.pass += 1;

        let (requests, batch) = {
            let mut queue = self.queue.lock();
            (queue.requests(), queue.drain())
        };
        let mut applied = 0;
        for (id, changes) in batch {
            match self.nodes.get_mut(&id) {
                Some(node) if node.is_mounted() => {
                    applied += 1;
                    node.apply_changes(changes);
                }
                _ => tracing::trace!(node = %id, "dropping update for unmounted node"),
            }
        }
        tracing::debug!(
            pass = self.pass,
            requests,
            updated_nodes = applied,
            "pass started"
        );
        self.pass
    }

    /// Every node removed since the last pass, in tree post-order.
    pub(crate) fn take_unmounting(&mut self) -> Vec<NodeId> {
        if self.unmounting.is_empty() {
            return Vec::new();
        }
        let pending = std::mem::take(&mut self.unmounting);
        self.post_order(self.root)
            .into_iter()
            .filter(|id| pending.contains(id))
            .collect()
    }

    /// Unlink a node from its parent and take it out of the arena.
    pub(crate) fn drop_node(&mut self, id: NodeId) {
        let parent = self.nodes.remove(&id).and_then(|node| node.parent());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.remove_child(id);
        }
    }

    /// Mounted nodes under `from`, parents before children.
    pub fn pre_order(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id).filter(|n| n.is_mounted()) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children().iter().rev());
        }
        order
    }

    /// Nodes under `from`, children before parents.
    ///
    /// Unlike `pre_order`, this does not skip unmounted nodes, so it can
    /// describe subtrees that are waiting for their cleanups.
    pub fn post_order(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(from, false)];
        while let Some((id, expanded)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                stack.extend(node.children().iter().rev().map(|c| (*c, false)));
            }
        }
        order
    }

    fn check_mounted(&self, id: NodeId) -> Result<(), TreeError> {
        if id.raw() >= self.next_id {
            return Err(TreeError::UnknownNode(id));
        }
        if self.is_mounted(id) {
            Ok(())
        } else {
            Err(TreeError::Removed(id))
        }
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("pass", &self.pass)
            .field("unmounting", &self.unmounting.len())
            .finish()
    }
}
