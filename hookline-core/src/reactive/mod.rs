//! Reactive Primitives
//!
//! This module implements the per-pass machinery of the simulator: dependency
//! values, effect declarations, the memo cache, the render engine and the
//! effect scheduler.
//!
//! # Concepts
//!
//! ## Dependency values
//!
//! Effects and memos declare what they depend on. Primitive values compare by
//! value; records and sequences compare by identity, so a freshly built
//! record always counts as a change.
//!
//! ## Effects
//!
//! An effect runs after the render pass that mounted its node, and again on
//! any pass where its dependencies changed. Its cleanup runs before such a
//! rerun and when the node unmounts.
//!
//! ## Memos
//!
//! A memo caches the result of a computation per node and key, and skips the
//! computation while its dependencies are unchanged.
//!
//! # Ordering
//!
//! Rendering goes parents first. Effects go children first: a parent's
//! effects can rely on its children's effects having run.

mod value;
mod effect;
mod memo;
mod render;
mod scheduler;
pub(crate) mod updater;

pub use value::{DepValue, DependencySnapshot};
pub use effect::{Action, ActionResult, Deps, EffectCx, EffectSlot, EffectSpec, Verdict};
pub use memo::{MemoCache, MemoEntry, MemoStats};
pub use render::{RenderCx, RenderEngine, RenderLog, RenderPass};
pub use scheduler::{EffectEntry, EffectLog, EffectReport, EffectScheduler};
pub use updater::{DeferredQueue, UpdateOutcome, UpdateQueue, Updater};
