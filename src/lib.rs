//! fnblock - a function-block execution core
//!
//! This crate provides the hosting runtime for function blocks (registry,
//! node, lifecycle state machine, ports, buffer pool) together with two
//! standard block types: a dedicated-thread trigger scheduler and a
//! Lua-scriptable execution block.

pub mod blocks;
pub mod core;
pub mod runtime;
pub mod script;
mod tests;

// Re-export commonly used types
pub use crate::core::registry::BlockRegistry;
pub use crate::core::{Block, BlockError, BlockId, BlockState};
pub use crate::runtime::Node;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
