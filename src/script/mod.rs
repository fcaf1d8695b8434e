//! Script engine capability interface
//!
//! A scriptable block drives its embedded interpreter exclusively through
//! [`ScriptEngine`]: five named, optionally-bound callback slots plus
//! chunk evaluation and initial-file loading. The interpreter is a
//! pluggable backend behind this interface ([`lua::LuaEngine`] in
//! production, mocks in tests).
//!
//! The engine only reports what happened at a call site
//! ([`HookOutcome`]); whether an unbound slot or a `false` return is an
//! error is policy applied by the block, since it differs per lifecycle
//! phase.

pub mod lua;

use crate::core::BlockId;
use std::path::Path;

/// The five lifecycle callback slots a script may bind
///
/// Slot names double as the global function names looked up in the
/// interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookSlot {
    Init,
    Start,
    Step,
    Stop,
    Cleanup,
}

impl HookSlot {
    /// The global function name bound to this slot
    pub fn name(&self) -> &'static str {
        match self {
            HookSlot::Init => "init",
            HookSlot::Start => "start",
            HookSlot::Step => "step",
            HookSlot::Stop => "stop",
            HookSlot::Cleanup => "cleanup",
        }
    }
}

/// Handle passed as the single argument of every hook invocation,
/// referencing the owning block instance
#[derive(Debug, Clone)]
pub struct BlockHandle {
    pub id: BlockId,
    pub name: String,
}

/// What happened when a hook slot was invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// No function is bound to the slot
    Unbound,
    /// The hook ran; no result was requested
    Completed,
    /// The hook ran and returned a boolean
    Returned(bool),
    /// A boolean was requested but the hook returned a value of the
    /// named type
    WrongType(String),
}

/// Mechanism-level script errors
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The interpreter instance could not be created
    #[error("failed to create interpreter: {0}")]
    Create(String),

    /// The initial source file could not be read or executed
    #[error("failed to load '{path}': {message}")]
    Load { path: String, message: String },

    /// A chunk or hook call raised an interpreter-level error
    #[error("{0}")]
    Eval(String),
}

/// Hook policy errors, produced by the block from [`HookOutcome`]s
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A required hook is not bound
    #[error("required hook '{0}' is not defined")]
    Missing(&'static str),

    /// The hook raised an interpreter-level error
    #[error("hook '{hook}' raised an error: {message}")]
    Raised { hook: &'static str, message: String },

    /// The hook must return a boolean but returned something else
    #[error("hook '{hook}' must return a boolean, got {got}")]
    NotBoolean { hook: &'static str, got: String },

    /// The hook returned `false`
    #[error("hook '{hook}' returned false")]
    Rejected { hook: &'static str },
}

/// Embedded interpreter backend
///
/// One instance per scriptable block; created at block init with
/// standard bindings loaded and destroyed exactly once at block cleanup.
/// Interpreter state persists across calls.
pub trait ScriptEngine: Send {
    /// Execute an initial source file into the interpreter state
    fn load_file(&mut self, path: &Path) -> Result<(), ScriptError>;

    /// Evaluate source text in the interpreter
    fn eval(&mut self, chunk: &str) -> Result<(), ScriptError>;

    /// Invoke a hook slot with the owning block's handle
    ///
    /// `want_result` asks the backend to capture the first return value
    /// for boolean inspection; without it any return value is ignored.
    fn call_hook(
        &mut self,
        slot: HookSlot,
        handle: &BlockHandle,
        want_result: bool,
    ) -> Result<HookOutcome, ScriptError>;
}
