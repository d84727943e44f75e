//! Hookline Core
//!
//! A deterministic simulator of a component framework's rendering model.
//! It implements:
//!
//! - A component tree with mount, update and unmount lifecycles
//! - Render passes that visit parents before children
//! - Effect scheduling that cleans up and runs children before parents,
//!   driven by dependency comparison
//! - A per-node memo cache that skips work while dependencies are equal
//! - Batched updates and deferred (asynchronous) work guarded by a mounted flag
//!
//! Every pass produces a render log and an effect log, so the ordering rules
//! can be checked against expected sequences without any UI framework.
//!
//! # Architecture
//!
//! - `graph`: the node arena and tree operations
//! - `reactive`: dependency values, effects, memos, render engine, scheduler
//! - `compose`: higher-order wrapping of components
//! - `simulate`: scripted scenarios and the pass driver
//!
//! # Example
//!
//! ```rust
//! use hookline_core::{EffectSpec, NodeSpec, SimConfig, Simulator};
//!
//! let app = NodeSpec::new("P")
//!     .value("x", 0)
//!     .effect(EffectSpec::on("E_p", ["x"]))
//!     .child(NodeSpec::new("C").effect(EffectSpec::on("E_c", ["x"])));
//!
//! let mut sim = Simulator::new(app, SimConfig::default());
//! let mount = sim.pass();
//! assert_eq!(mount.render.labels(), ["P", "C"]);
//! assert_eq!(mount.effects.runs(), ["E_c", "E_p"]);
//!
//! let root = sim.tree().root();
//! sim.tree_mut().request_update(root, [("x", 1)]).unwrap();
//! let update = sim.pass();
//! assert_eq!(update.effects.runs(), ["E_c", "E_p"]);
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod simulate;

pub use compose::{Component, Wrapped, Wrapper};
pub use config::{EffectOrdering, SimConfig};
pub use error::{ActionError, EffectError, Phase, SimError, TreeError};
pub use graph::{Node, NodeId, NodeSpec, Tree};
pub use reactive::{
    DepValue, Deps, EffectCx, EffectLog, EffectScheduler, EffectSpec, MemoCache, RenderEngine,
    RenderLog, UpdateOutcome, Updater,
};
pub use simulate::{simulate, PassLog, Scenario, Simulator, Step};
