//! Block trait and error taxonomy
//!
//! This module defines the lifecycle trait that all blocks implement and
//! the error type shared across the crate. The hosting node drives the
//! lifecycle; blocks only ever see their own [`BlockEnv`].

use crate::core::BlockState;
use crate::runtime::BlockEnv;
use crate::script::HookError;

/// Lifecycle interface consumed from the hosting node.
///
/// All callbacks receive the block's environment (configuration, ports,
/// buffer pool, peer lookup). `step` returns a `Result` so that a trigger
/// cycle can observe a failing sub-block and abort the remainder of the
/// cycle; `stop` and `cleanup` are infallible from the node's point of
/// view — blocks log their own teardown problems.
pub trait Block: Send {
    /// Acquire instance resources. Called once, from `Preinit`.
    ///
    /// On error every partially acquired resource must already be
    /// released when this returns.
    fn init(&mut self, env: &BlockEnv) -> Result<(), BlockError>;

    /// Transition to `Active`. Called from `Inactive`.
    fn start(&mut self, env: &BlockEnv) -> Result<(), BlockError>;

    /// Perform one unit of computation. Only called while `Active`.
    fn step(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
        Ok(())
    }

    /// Transition to `Inactive`. Called from `Active`.
    fn stop(&mut self, env: &BlockEnv);

    /// Release all instance resources. Called once per init.
    fn cleanup(&mut self, env: &BlockEnv);
}

/// Block errors
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// A resource allocation (buffer, interpreter) failed.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// The dedicated scheduler thread could not be created.
    #[error("thread creation failure: {0}")]
    ThreadCreationFailure(String),

    /// A lifecycle hook was missing, raised an error or returned a
    /// wrong-typed or `false` result.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Source text submitted over the exec port failed to evaluate.
    /// Recoverable: reported through the port status, the block stays up.
    #[error("script evaluation failed: {0}")]
    ScriptEvaluation(String),

    /// A triggered sub-block's own step signaled failure; aborts the
    /// remainder of the current trigger cycle only.
    #[error("step of block '{block}' failed: {source}")]
    SubStep {
        block: String,
        #[source]
        source: Box<BlockError>,
    },

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lifecycle call arrived in the wrong state.
    #[error("block '{block}' is {actual:?}, expected {expected:?}")]
    InvalidState {
        block: String,
        expected: BlockState,
        actual: BlockState,
    },
}
