//! Component Tree
//!
//! This module implements the tree the simulator renders: an arena of nodes
//! indexed by id, where each node keeps its parent and its ordered children.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a single arena owned by [`Tree`] and refer to each other
//!    by id. Schedulers and engines work on ids, never on node references.
//!
//! 2. Parents are referenced by id only. Looking one up never keeps it alive.
//!
//! 3. Removed nodes stay in the arena, flagged as unmounted, until the next
//!    pass has run their cleanups.

mod node;
mod tree;

pub use node::{Node, NodeId, NodeSpec, RenderHook};
pub use tree::Tree;
