//! Update Queue and Deferred Work
//!
//! State changes never apply immediately. `request_update` records them in a
//! shared queue and the next render pass drains it, so every request made
//! between two passes (including requests made by effect bodies during a
//! pass) lands in one batch.
//!
//! Asynchronous work is modelled with deferred tasks: an effect body hands a
//! closure to [`DeferredQueue`], and the caller decides when it "completes"
//! by flushing the queue. A task that completes after its node was unmounted
//! sees [`UpdateOutcome::StaleAsyncIgnored`] instead of touching a dead node.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::value::DepValue;
use crate::graph::NodeId;

/// Result of asking for an update through an [`Updater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The change will apply at the next pass.
    Queued,

    /// The owning node is no longer mounted; nothing was recorded.
    StaleAsyncIgnored,
}

/// Pending state changes, coalesced per node and key.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: IndexMap<NodeId, IndexMap<String, DepValue>>,
    requests: usize,
}

impl UpdateQueue {
    /// Record changes for a node. A later write to the same key wins.
    pub fn push<I>(&mut self, node: NodeId, changes: I)
    where
        I: IntoIterator<Item = (String, DepValue)>,
    {
        let slot = self.pending.entry(node).or_default();
        for (key, value) in changes {
            slot.insert(key, value);
        }
        self.requests += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of requests recorded since the last drain.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Take every pending change, leaving the queue empty.
    pub fn drain(&mut self) -> IndexMap<NodeId, IndexMap<String, DepValue>> {
        self.requests = 0;
        std::mem::take(&mut self.pending)
    }

    /// Drop anything queued for a node that is going away.
    pub fn forget(&mut self, node: NodeId) {
        self.pending.shift_remove(&node);
    }
}

pub(crate) type SharedQueue = Arc<Mutex<UpdateQueue>>;

/// A handle that lets effects and deferred tasks request updates for one node.
///
/// Cheap to clone; clones share the node's mounted flag.
#[derive(Clone)]
pub struct Updater {
    node: NodeId,
    mounted: Arc<AtomicBool>,
    queue: SharedQueue,
}

impl Updater {
    pub(crate) fn new(node: NodeId, mounted: Arc<AtomicBool>, queue: SharedQueue) -> Self {
        Self { node, mounted, queue }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether the owning node is still mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Queue changes for the owning node, or ignore them if it was unmounted.
    pub fn request_update<I, K, V>(&self, changes: I) -> UpdateOutcome
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DepValue>,
    {
        if !self.is_mounted() {
            tracing::debug!(node = %self.node, "ignoring update for unmounted node");
            return UpdateOutcome::StaleAsyncIgnored;
        }

        self.queue
            .lock()
            .push(self.node, changes.into_iter().map(|(k, v)| (k.into(), v.into())));
        UpdateOutcome::Queued
    }

    /// Shorthand for a single-key update.
    pub fn set(&self, key: impl Into<String>, value: impl Into<DepValue>) -> UpdateOutcome {
        self.request_update([(key.into(), value.into())])
    }
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("node", &self.node)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// Tasks standing in for asynchronous work started by effects.
#[derive(Clone, Default)]
pub struct DeferredQueue {
    tasks: Arc<Mutex<VecDeque<Task>>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.lock().push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Complete every queued task in FIFO order, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the lock before running so a task can queue more work.
            let Some(task) = self.tasks.lock().pop_front() else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue").field("len", &self.len()).finish()
    }
}
