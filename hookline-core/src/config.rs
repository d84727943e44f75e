//! Simulation Configuration
//!
//! Loaded from JSON (standalone or embedded in a scenario). Every field has
//! a default, so `{}` is a valid configuration.

use serde::{Deserialize, Serialize};

/// How cleanups and runs are interleaved on an update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOrdering {
    /// Every cleanup in the tree (post-order), then every run (post-order).
    #[default]
    Phased,

    /// Per node in post-order: that node's cleanups, then its runs.
    PerNode,
}

fn default_max_settle_passes() -> usize {
    32
}

/// Knobs for the effect scheduler and the simulation driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub ordering: EffectOrdering,

    /// Upper bound on consecutive passes when settling queued updates.
    #[serde(default = "default_max_settle_passes")]
    pub max_settle_passes: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ordering: EffectOrdering::default(),
            max_settle_passes: default_max_settle_passes(),
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_ordering(mut self, ordering: EffectOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}
