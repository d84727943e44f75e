//! Effect Declarations
//!
//! An effect is a side-effecting action declared by a node. It has a label,
//! a dependency declaration, a body and an optional cleanup.
//!
//! # Dependency Declarations
//!
//! - [`Deps::Always`]: the body runs on every pass. Cleanup only at unmount.
//! - [`Deps::Once`]: the body runs on the node's first pass, the cleanup at
//!   unmount. An empty key list means the same thing.
//! - [`Deps::Keys`]: the body reruns whenever one of the resolved key values
//!   differs from the snapshot taken at its last run, and the cleanup runs
//!   right before such a rerun.
//!
//! Effects are identified by their index in the node's declaration list,
//! which is fixed when the node is created.

use std::sync::Arc;

use smallvec::SmallVec;

use super::updater::{DeferredQueue, Updater};
use super::value::{DepValue, DependencySnapshot};
use crate::error::ActionError;
use crate::graph::NodeId;

/// Result type for effect bodies and cleanups.
pub type ActionResult = Result<(), ActionError>;

/// A body or cleanup action.
pub type Action = Arc<dyn Fn(&EffectCx<'_>) -> ActionResult + Send + Sync>;

/// When an effect should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deps {
    /// No dependency list: every pass.
    Always,
    /// Empty dependency list: mount and unmount only.
    Once,
    /// Keys resolved against the node and its ancestors.
    Keys(SmallVec<[String; 4]>),
}

impl Deps {
    /// Build a key list. An empty list becomes [`Deps::Once`].
    pub fn keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: SmallVec<[String; 4]> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            Deps::Once
        } else {
            Deps::Keys(keys)
        }
    }

    pub(crate) fn key_list(&self) -> &[String] {
        match self {
            Deps::Keys(keys) => keys,
            Deps::Always | Deps::Once => &[],
        }
    }
}

/// Declaration of an effect, as written by the component author.
#[derive(Clone)]
pub struct EffectSpec {
    label: String,
    deps: Deps,
    body: Option<Action>,
    cleanup: Option<Action>,
}

impl EffectSpec {
    /// An effect with a no-op body and no cleanup.
    pub fn new(label: impl Into<String>, deps: Deps) -> Self {
        Self {
            label: label.into(),
            deps,
            body: None,
            cleanup: None,
        }
    }

    pub fn always(label: impl Into<String>) -> Self {
        Self::new(label, Deps::Always)
    }

    pub fn once(label: impl Into<String>) -> Self {
        Self::new(label, Deps::Once)
    }

    pub fn on<I, K>(label: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(label, Deps::keys(keys))
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&EffectCx<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&EffectCx<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(cleanup));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }
}

impl std::fmt::Debug for EffectSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectSpec")
            .field("label", &self.label)
            .field("deps", &self.deps)
            .field("has_cleanup", &self.has_cleanup())
            .finish()
    }
}

/// Runtime slot of a declared effect: the declaration plus what happened
/// at its last run.
#[derive(Debug)]
pub struct EffectSlot {
    spec: EffectSpec,
    snapshot: Option<DependencySnapshot>,
    run_count: usize,
    cleanup_count: usize,
}

/// What the scheduler should do with a slot on the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    pub cleanup: bool,
    pub run: bool,
}

impl EffectSlot {
    pub fn new(spec: EffectSpec) -> Self {
        Self {
            spec,
            snapshot: None,
            run_count: 0,
            cleanup_count: 0,
        }
    }

    pub fn spec(&self) -> &EffectSpec {
        &self.spec
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    /// Whether the body has run at least once.
    pub fn has_run(&self) -> bool {
        self.run_count > 0
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanup_count
    }

    pub fn snapshot(&self) -> Option<&DependencySnapshot> {
        self.snapshot.as_ref()
    }

    /// Decide cleanup and rerun for an update pass, given freshly resolved
    /// dependency values.
    pub fn verdict(&self, current: &[DepValue]) -> Verdict {
        if !self.has_run() {
            return Verdict { cleanup: false, run: true };
        }
        match self.spec.deps {
            Deps::Always => Verdict { cleanup: false, run: true },
            Deps::Once => Verdict::default(),
            Deps::Keys(_) => {
                let changed = self
                    .snapshot
                    .as_ref()
                    .map_or(true, |snapshot| !snapshot.matches(current));
                Verdict {
                    cleanup: changed && self.spec.has_cleanup(),
                    run: changed,
                }
            }
        }
    }

    /// Run the body and replace the snapshot. The snapshot is replaced even
    /// when the body fails: the run happened.
    pub(crate) fn run_body(&mut self, cx: &EffectCx<'_>) -> ActionResult {
        self.snapshot = Some(DependencySnapshot::new(cx.deps.iter().cloned()));
        self.run_count += 1;
        match &self.spec.body {
            Some(body) => body(cx),
            None => Ok(()),
        }
    }

    /// Run the cleanup if one was declared and the body ran before.
    /// Returns `None` when there was nothing to run.
    pub(crate) fn run_cleanup(&mut self, cx: &EffectCx<'_>) -> Option<ActionResult> {
        if !self.has_run() {
            return None;
        }
        let cleanup = self.spec.cleanup.clone()?;
        self.cleanup_count += 1;
        Some(cleanup(cx))
    }
}

/// Context handed to effect bodies and cleanups.
pub struct EffectCx<'a> {
    pub(crate) node: NodeId,
    pub(crate) label: &'a str,
    pub(crate) pass: u64,
    pub(crate) deps: &'a [DepValue],
    pub(crate) updater: Updater,
    pub(crate) deferred: DeferredQueue,
}

impl<'a> EffectCx<'a> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Label of the running effect.
    pub fn label(&self) -> &'a str {
        self.label
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Dependency values resolved for this pass. Empty for `Always`/`Once`.
    pub fn deps(&self) -> &'a [DepValue] {
        self.deps
    }

    /// The i-th dependency value, or `Undefined`.
    pub fn dep(&self, index: usize) -> DepValue {
        self.deps.get(index).cloned().unwrap_or_default()
    }

    /// Handle for requesting updates of this node, now or later.
    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    /// Queue asynchronous work. The task runs when the owner of the tree
    /// flushes deferred work.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.deferred.push(task);
    }
}
