//! Core block abstractions and types
//!
//! This module defines the fundamental types that the rest of the crate
//! builds on: block identity, the lifecycle state machine, the lifecycle
//! trait and error taxonomy, typed configuration, the exec port and the
//! block-type registry.

pub mod block;
pub mod config;
pub mod port;
pub mod registry;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use block::{Block, BlockError};

/// Unique identifier for a block instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub Uuid);

impl BlockId {
    /// Generate a new random block ID
    pub fn new() -> Self {
        BlockId(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a block instance, owned by the hosting node.
///
/// Transitions are driven by the node: `init` moves `Preinit → Inactive`,
/// `start` moves `Inactive → Active`, `stop` moves `Active → Inactive`,
/// and `cleanup` returns the block to `Preinit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// Created but not yet initialized; no resources acquired.
    Preinit,
    /// Initialized; resources held, not eligible for stepping.
    Inactive,
    /// Started; eligible for stepping.
    Active,
}
