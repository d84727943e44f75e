//! Render Engine
//!
//! A render pass walks every mounted node reachable from the root, parents
//! before children, in child insertion order. Each visit appends the node's
//! label to the render log and calls its render hook, if any.
//!
//! Queued updates are applied before the walk starts, which is what makes
//! several update requests collapse into a single pass.

use serde::Serialize;

use super::memo::MemoCache;
use super::value::DepValue;
use crate::graph::{NodeId, Tree};

/// Labels of rendered nodes, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderLog(Vec<String>);

impl RenderLog {
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }
}

/// Outcome of one render pass, consumed by the effect scheduler.
#[derive(Debug, Clone)]
pub struct RenderPass {
    pass: u64,
    log: RenderLog,
    post_order: Vec<NodeId>,
}

impl RenderPass {
    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn log(&self) -> &RenderLog {
        &self.log
    }

    pub fn into_log(self) -> RenderLog {
        self.log
    }

    /// Rendered nodes, children before parents.
    pub fn post_order(&self) -> &[NodeId] {
        &self.post_order
    }
}

/// What a render hook can see and do.
pub struct RenderCx<'a> {
    tree: &'a Tree,
    node: NodeId,
    pass: u64,
    memos: &'a mut MemoCache,
}

impl RenderCx<'_> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Value of `key` for this node, looked up through its ancestors.
    pub fn value(&self, key: &str) -> DepValue {
        self.tree.value(self.node, key)
    }

    /// Memoized computation in this node's cache.
    pub fn memo<T, F>(&mut self, key: &str, deps: &[DepValue], compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.memos.get_or_compute(key, deps, self.pass, compute)
    }
}

/// Drives render passes over a tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderEngine;

impl RenderEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply queued updates and render every mounted node from the root.
    pub fn run_pass(&self, tree: &mut Tree) -> RenderPass {
        let pass = tree.begin_pass();
        let root = tree.root();

        let order = tree.pre_order(root);
        let mut labels = Vec::with_capacity(order.len());

        for &id in &order {
            let Some(node) = tree.node_mut(id) else {
                continue;
            };
            node.mark_rendered();
            labels.push(node.label().to_string());
            let hook = node.render_hook();

            if let Some(hook) = hook {
                // The hook borrows the tree for lookups, so the cache is
                // moved out for the duration of the call.
                let mut memos = std::mem::take(&mut node.memos);
                let mut cx = RenderCx {
                    tree: &*tree,
                    node: id,
                    pass,
                    memos: &mut memos,
                };
                hook(&mut cx);
                if let Some(node) = tree.node_mut(id) {
                    node.memos = memos;
                }
            }
        }

        let post_order = tree
            .post_order(root)
            .into_iter()
            .filter(|id| tree.is_mounted(*id))
            .collect();

        tracing::debug!(pass, rendered = labels.len(), "render pass complete");
        RenderPass {
            pass,
            log: RenderLog(labels),
            post_order,
        }
    }
}
