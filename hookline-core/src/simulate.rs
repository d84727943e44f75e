//! Scenario Simulation
//!
//! A scenario is a tree description plus a script of steps. Simulating it
//! mounts the tree (pass 1) and runs exactly one pass per step, collecting
//! the render and effect logs of every pass. The output is meant to be
//! compared against golden fixtures.
//!
//! Scenarios are plain JSON:
//!
//! ```json
//! {
//!   "root": {
//!     "label": "P",
//!     "values": { "x": 0 },
//!     "effects": [{ "label": "E_p", "deps": ["x"] }],
//!     "children": [{ "label": "C", "effects": [{ "label": "E_c", "deps": ["x"] }] }]
//!   },
//!   "script": [{ "update": { "P": { "x": 1 } } }, { "remove": "C" }, "idle"]
//! }
//! ```
//!
//! Effects without `deps` run on every pass, `"once"` (or `[]`) runs on
//! mount only. Fixture effects log a cleanup unless `"cleanup": false`, and
//! `"fail"` makes the body, the cleanup, or both return an error.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SimConfig;
use crate::error::{EffectError, SimError, TreeError};
use crate::graph::{NodeId, NodeSpec, Tree};
use crate::reactive::{Deps, EffectLog, EffectScheduler, EffectSpec, RenderEngine, RenderLog};

/// Everything observable about one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassLog {
    pub pass: u64,
    pub render: RenderLog,
    pub effects: EffectLog,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<EffectError>,
}

/// Drives passes over a tree: render, then effects.
#[derive(Debug)]
pub struct Simulator {
    tree: Tree,
    engine: RenderEngine,
    scheduler: EffectScheduler,
    config: SimConfig,
}

impl Simulator {
    pub fn new(root: NodeSpec, config: SimConfig) -> Self {
        Self {
            tree: Tree::new(root),
            engine: RenderEngine::new(),
            scheduler: EffectScheduler::new(&config),
            config,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run one render pass followed by its effects.
    pub fn pass(&mut self) -> PassLog {
        let render = self.engine.run_pass(&mut self.tree);
        let report = self.scheduler.run_effects(&mut self.tree, &render);
        PassLog {
            pass: report.pass,
            render: render.into_log(),
            effects: report.log,
            failures: report.failures,
        }
    }

    /// Run passes while updates or unmounts are pending, such as updates
    /// queued by effect bodies.
    ///
    /// Fails with [`TreeError::UpdateDepthExceeded`] if work is still pending
    /// after `max_settle_passes` passes.
    pub fn settle(&mut self) -> Result<Vec<PassLog>, TreeError> {
        let mut logs = Vec::new();
        while self.tree.has_pending_work() {
            if logs.len() >= self.config.max_settle_passes {
                tracing::warn!(limit = self.config.max_settle_passes, "updates did not settle");
                return Err(TreeError::UpdateDepthExceeded(self.config.max_settle_passes));
            }
            logs.push(self.pass());
        }
        Ok(logs)
    }

    /// Complete deferred work, then settle the updates it queued.
    pub fn flush_deferred(&mut self) -> Result<Vec<PassLog>, TreeError> {
        let ran = self.tree.flush_deferred();
        tracing::debug!(tasks = ran, "flushed deferred tasks");
        self.settle()
    }
}

/// When a fixture effect should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailPoint {
    Body,
    Cleanup,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DepsMarker {
    Always,
    Once,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum DepsDescription {
    Marker(DepsMarker),
    Keys(Vec<String>),
}

impl Default for DepsDescription {
    fn default() -> Self {
        DepsDescription::Marker(DepsMarker::Always)
    }
}

fn yes() -> bool {
    true
}

/// An effect in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectDescription {
    pub label: String,
    #[serde(default)]
    deps: DepsDescription,
    #[serde(default = "yes")]
    pub cleanup: bool,
    #[serde(default)]
    pub fail: Option<FailPoint>,
}

impl EffectDescription {
    fn to_spec(&self) -> EffectSpec {
        let deps = match &self.deps {
            DepsDescription::Marker(DepsMarker::Always) => Deps::Always,
            DepsDescription::Marker(DepsMarker::Once) => Deps::Once,
            DepsDescription::Keys(keys) => Deps::keys(keys.iter().cloned()),
        };

        let mut spec = EffectSpec::new(self.label.clone(), deps);
        if matches!(self.fail, Some(FailPoint::Body | FailPoint::Both)) {
            let message = format!("{} body failed", self.label);
            spec = spec.body(move |_| Err(message.clone().into()));
        }
        if self.cleanup {
            let fails = matches!(self.fail, Some(FailPoint::Cleanup | FailPoint::Both));
            let message = format!("{} cleanup failed", self.label);
            spec = spec.cleanup(move |_| if fails { Err(message.clone().into()) } else { Ok(()) });
        }
        spec
    }
}

/// A node in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDescription {
    pub label: String,
    #[serde(default)]
    pub values: IndexMap<String, Value>,
    #[serde(default)]
    pub effects: Vec<EffectDescription>,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    fn to_spec(&self) -> NodeSpec {
        let mut spec = NodeSpec::new(self.label.clone());
        for (key, value) in &self.values {
            spec = spec.value(key.clone(), value.clone());
        }
        for effect in &self.effects {
            spec = spec.effect(effect.to_spec());
        }
        for child in &self.children {
            spec = spec.child(child.to_spec());
        }
        spec
    }

    fn collect_labels<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.label);
        for child in &self.children {
            child.collect_labels(out);
        }
    }
}

/// One scripted step. Each step is followed by exactly one pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Batch of updates, by node label then key.
    Update(IndexMap<String, IndexMap<String, Value>>),
    /// Remove the node with this label and its subtree.
    Remove(String),
    /// Insert a subtree under the node labelled `parent`.
    Mount { parent: String, node: NodeDescription },
    /// A pass with no changes.
    Idle,
}

/// A tree plus a script, loadable from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: SimConfig,
    pub root: NodeDescription,
    #[serde(default)]
    pub script: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Mount the scenario's tree and play its script, one pass per step.
///
/// A failing step ends the run with [`SimError::Step`], which keeps the logs
/// of the passes before it.
pub fn simulate(scenario: &Scenario) -> Result<Vec<PassLog>, SimError> {
    let mut labels = Vec::new();
    scenario.root.collect_labels(&mut labels);
    check_unique(labels)?;

    let mut sim = Simulator::new(scenario.root.to_spec(), scenario.config.clone());
    let mut logs = vec![sim.pass()];

    for (index, step) in scenario.script.iter().enumerate() {
        if let Err(err) = apply(&mut sim, step) {
            tracing::warn!(step = index, error = %err, "scenario step failed");
            return Err(SimError::Step {
                step: index,
                source: Box::new(err),
                logs,
            });
        }
        logs.push(sim.pass());
    }
    Ok(logs)
}

fn apply(sim: &mut Simulator, step: &Step) -> Result<(), SimError> {
    let tree = sim.tree_mut();
    match step {
        Step::Update(batch) => {
            for (label, changes) in batch {
                let id = lookup(tree, label)?;
                tree.request_update(id, changes.iter().map(|(k, v)| (k.clone(), v.clone())))?;
            }
        }
        Step::Remove(label) => {
            let id = lookup(tree, label)?;
            tree.remove_node(id)?;
        }
        Step::Mount { parent, node } => {
            let mut labels = Vec::new();
            node.collect_labels(&mut labels);
            for label in &labels {
                if tree.find_by_label(label).is_some() {
                    return Err(SimError::DuplicateLabel(label.to_string()));
                }
            }
            check_unique(labels)?;

            let parent = lookup(tree, parent)?;
            tree.create_node(parent, node.to_spec())?;
        }
        Step::Idle => {}
    }
    Ok(())
}

fn lookup(tree: &Tree, label: &str) -> Result<NodeId, SimError> {
    tree.find_by_label(label)
        .ok_or_else(|| SimError::UnknownLabel(label.to_string()))
}

fn check_unique(labels: Vec<&str>) -> Result<(), SimError> {
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            return Err(SimError::DuplicateLabel(label.to_string()));
        }
    }
    Ok(())
}
