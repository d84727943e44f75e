//! Error Types
//!
//! Structural errors abort the call that caused them. Per-effect errors are
//! collected during a pass and handed back in the pass report, so one failing
//! effect never stops its siblings.

use serde::Serialize;
use thiserror::Error;

use crate::graph::NodeId;
use crate::simulate::PassLog;

/// Errors raised by tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The parent passed to `create_node` has already been removed.
    #[error("cannot attach to removed parent {0}")]
    InvalidParent(NodeId),

    /// The id was never issued by this tree.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node has been removed and can no longer be updated.
    #[error("node {0} has been removed")]
    Removed(NodeId),

    /// Passes kept queueing updates past the configured limit.
    #[error("update depth exceeded after {0} passes")]
    UpdateDepthExceeded(usize),
}

/// The phase an effect action failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Cleanup,
    Run,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Cleanup => f.write_str("cleanup"),
            Phase::Run => f.write_str("run"),
        }
    }
}

/// A failure recorded against a single effect during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum EffectError {
    /// The effect body returned an error.
    #[error("effect `{effect}` on node {node} failed: {message}")]
    Body {
        node: NodeId,
        effect: String,
        index: usize,
        message: String,
    },

    /// The effect cleanup returned an error.
    #[error("cleanup of effect `{effect}` on node {node} failed: {message}")]
    Cleanup {
        node: NodeId,
        effect: String,
        index: usize,
        message: String,
    },
}

impl EffectError {
    pub(crate) fn new(phase: Phase, node: NodeId, effect: &str, index: usize, message: String) -> Self {
        let effect = effect.to_string();
        match phase {
            Phase::Run => EffectError::Body { node, effect, index, message },
            Phase::Cleanup => EffectError::Cleanup { node, effect, index, message },
        }
    }

    /// Label of the effect that failed.
    pub fn effect(&self) -> &str {
        match self {
            EffectError::Body { effect, .. } | EffectError::Cleanup { effect, .. } => effect,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            EffectError::Body { .. } => Phase::Run,
            EffectError::Cleanup { .. } => Phase::Cleanup,
        }
    }
}

/// Error returned by an effect body or cleanup action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Errors raised while loading or driving a scenario.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A script step names a node label that is not in the tree.
    #[error("no node labelled `{0}`")]
    UnknownLabel(String),

    /// Scenario node labels must be unique so steps can address them.
    #[error("node label `{0}` is used more than once")]
    DuplicateLabel(String),

    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),

    /// A script step failed; `logs` holds every pass completed before it.
    #[error("script step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: Box<SimError>,
        logs: Vec<PassLog>,
    },
}

impl SimError {
    /// The error that stopped the scenario, looking through [`SimError::Step`].
    pub fn cause(&self) -> &SimError {
        match self {
            SimError::Step { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Passes that completed before the failure.
    pub fn partial_logs(&self) -> &[PassLog] {
        match self {
            SimError::Step { logs, .. } => logs,
            _ => &[],
        }
    }
}
