//! Effect Scheduler
//!
//! Decides, after each render pass, which effects clean up and which run,
//! and in what order.
//!
//! # Algorithm
//!
//! 1. Unmounts: for every node removed since the last pass, in tree
//!    post-order, run the cleanup of each effect that has run, then drop the
//!    nodes.
//! 2. Plan: for every rendered node (post-order) and every effect
//!    (declaration order), resolve the dependency keys and compare them with
//!    the effect's snapshot.
//! 3. Cleanup phase: keyed effects whose dependencies changed run their
//!    cleanup with the previous snapshot's values.
//! 4. Run phase: new effects, `Always` effects and keyed effects whose
//!    dependencies changed run their body with the current values.
//!
//! With [`EffectOrdering::PerNode`], phases 3 and 4 are interleaved per node
//! instead of across the whole tree.
//!
//! A failing action never stops the pass. Its error is recorded and the
//! remaining effects carry on.

use std::fmt;

use serde::Serialize;

use super::effect::EffectCx;
use super::render::RenderPass;
use super::value::DepValue;
use crate::config::{EffectOrdering, SimConfig};
use crate::error::{EffectError, Phase};
use crate::graph::{NodeId, Tree};

/// One line of the effect log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectEntry {
    pub phase: Phase,
    pub node: NodeId,
    pub effect: String,
}

impl fmt::Display for EffectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.phase, self.effect)
    }
}

/// Cleanups and runs in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectLog(Vec<EffectEntry>);

impl EffectLog {
    pub fn entries(&self) -> &[EffectEntry] {
        &self.0
    }

    /// Labels of effects whose body ran, in order.
    pub fn runs(&self) -> Vec<&str> {
        self.labels_in(Phase::Run)
    }

    /// Labels of effects whose cleanup ran, in order.
    pub fn cleanups(&self) -> Vec<&str> {
        self.labels_in(Phase::Cleanup)
    }

    /// Every entry rendered as `"<phase> <effect>"`.
    pub fn lines(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn labels_in(&self, phase: Phase) -> Vec<&str> {
        self.0
            .iter()
            .filter(|entry| entry.phase == phase)
            .map(|entry| entry.effect.as_str())
            .collect()
    }

    fn push(&mut self, phase: Phase, node: NodeId, effect: String) {
        self.0.push(EffectEntry { phase, node, effect });
    }
}

/// Result of running effects for one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EffectReport {
    pub pass: u64,
    pub log: EffectLog,
    pub failures: Vec<EffectError>,
}

impl EffectReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A scheduled action: which effect, which phase, with which values.
struct Job {
    node: NodeId,
    index: usize,
    phase: Phase,
    deps: Vec<DepValue>,
}

/// Runs cleanups and bodies after a render pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectScheduler {
    ordering: EffectOrdering,
}

impl EffectScheduler {
    pub fn new(config: &SimConfig) -> Self {
        Self::with_ordering(config.ordering)
    }

    pub fn with_ordering(ordering: EffectOrdering) -> Self {
        Self { ordering }
    }

    pub fn ordering(&self) -> EffectOrdering {
        self.ordering
    }

    /// Process unmounts, cleanups and runs for a completed render pass.
    pub fn run_effects(&self, tree: &mut Tree, render: &RenderPass) -> EffectReport {
        let mut report = EffectReport {
            pass: render.pass(),
            ..EffectReport::default()
        };

        self.run_unmounts(tree, &mut report);

        let jobs = self.plan(tree, render.post_order());
        for job in jobs {
            execute(tree, &job, &mut report);
        }

        tracing::debug!(
            pass = report.pass,
            entries = report.log.len(),
            failures = report.failures.len(),
            "effects complete"
        );
        report
    }

    fn run_unmounts(&self, tree: &mut Tree, report: &mut EffectReport) {
        let unmounting = tree.take_unmounting();
        if unmounting.is_empty() {
            return;
        }

        for &id in &unmounting {
            let count = tree.node(id).map_or(0, |node| node.effects().len());
            for index in 0..count {
                let deps = last_snapshot(tree, id, index);
                execute(
                    tree,
                    &Job { node: id, index, phase: Phase::Cleanup, deps },
                    report,
                );
            }
        }
        for &id in &unmounting {
            tree.drop_node(id);
        }

        tracing::debug!(nodes = unmounting.len(), "unmounted nodes dropped");
        if tree.is_empty() {
            tracing::debug!("tree fully unmounted");
        }
    }

    /// Decide every cleanup and run for this pass before executing any of
    /// them, so actions cannot influence each other's verdicts.
    fn plan(&self, tree: &Tree, post_order: &[NodeId]) -> Vec<Job> {
        let mut cleanups = Vec::new();
        let mut runs = Vec::new();
        let mut jobs = Vec::new();

        for &id in post_order {
            let Some(node) = tree.node(id).filter(|node| node.is_mounted()) else {
                continue;
            };

            for (index, slot) in node.effects().iter().enumerate() {
                let current = tree.resolve(id, slot.spec().deps().key_list());
                let verdict = slot.verdict(&current);
                if verdict.cleanup {
                    let previous = slot
                        .snapshot()
                        .map(|snapshot| snapshot.values().to_vec())
                        .unwrap_or_default();
                    cleanups.push(Job { node: id, index, phase: Phase::Cleanup, deps: previous });
                }
                if verdict.run {
                    runs.push(Job { node: id, index, phase: Phase::Run, deps: current });
                }
            }

            if self.ordering == EffectOrdering::PerNode {
                jobs.append(&mut cleanups);
                jobs.append(&mut runs);
            }
        }

        jobs.append(&mut cleanups);
        jobs.append(&mut runs);
        jobs
    }
}

fn last_snapshot(tree: &Tree, id: NodeId, index: usize) -> Vec<DepValue> {
    tree.node(id)
        .and_then(|node| node.effects().get(index))
        .and_then(|slot| slot.snapshot())
        .map(|snapshot| snapshot.values().to_vec())
        .unwrap_or_default()
}

fn execute(tree: &mut Tree, job: &Job, report: &mut EffectReport) {
    let updater = tree.updater_unchecked(job.node);
    let deferred = tree.deferred().clone();
    let pass = tree.pass_count();

    let Some(slot) = tree
        .node_mut(job.node)
        .and_then(|node| node.effects_mut().get_mut(job.index))
    else {
        return;
    };
    let label = slot.label().to_string();

    let cx = EffectCx {
        node: job.node,
        label: &label,
        pass,
        deps: &job.deps,
        updater,
        deferred,
    };

    let outcome = match job.phase {
        Phase::Run => Some(slot.run_body(&cx)),
        Phase::Cleanup => slot.run_cleanup(&cx),
    };
    let Some(outcome) = outcome else {
        return;
    };

    tracing::trace!(node = %job.node, effect = %label, phase = %job.phase, "effect action");
    if let Err(err) = outcome {
        tracing::warn!(node = %job.node, effect = %label, phase = %job.phase, error = %err, "effect action failed");
        report
            .failures
            .push(EffectError::new(job.phase, job.node, &label, job.index, err.0));
    }
    report.log.push(job.phase, job.node, label);
}
