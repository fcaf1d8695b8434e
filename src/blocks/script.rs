//! Scriptable execution block
//!
//! Hosts one embedded interpreter per instance and bridges two surfaces
//! into it: the block lifecycle, dispatched to the named hook functions
//! `init`/`start`/`step`/`stop`/`cleanup`, and the `exec_str` port, whose
//! inbound source text is staged through a fixed 16 MiB exec buffer,
//! evaluated, and answered with an `i32` status (`0` ok, `-1` failed).
//!
//! Evaluation failures of submitted text are recoverable: the status is
//! reported and the block stays `Active`. Hook dispatch policy differs
//! per phase; only the `init` hook is required.

use std::path::Path;
use tracing::{debug, warn};

use crate::core::block::{Block, BlockError};
use crate::core::port::PortDecl;
use crate::core::registry::{BlockRegistry, BlockType, RegistryError};
use crate::runtime::buffer::ExecBuffer;
use crate::runtime::BlockEnv;
use crate::script::lua::LuaEngine;
use crate::script::{BlockHandle, HookError, HookOutcome, HookSlot, ScriptEngine, ScriptError};

/// Registered block-type name
pub const SCRIPT_BLOCK_TYPE: &str = "std/lua";

/// Name of the bidirectional execution port
pub const EXEC_PORT: &str = "exec_str";

/// Fixed capacity of the exec buffer: 16 MiB
pub const EXEC_BUF_CAPACITY: usize = 16 * 1024 * 1024;

/// Configuration key naming an optional initial source file
pub const CFG_SCRIPT_FILE: &str = "lua_file";

/// Maximum length of the `lua_file` path
pub const SCRIPT_FILE_MAX_LEN: usize = 256;

/// Factory producing a fresh interpreter backend
pub type EngineFactory = Box<dyn Fn() -> Result<Box<dyn ScriptEngine>, ScriptError> + Send>;

/// Per-init interpreter state, dropped as a unit at cleanup
///
/// Field order matters: the engine is destroyed before the exec buffer
/// returns its capacity to the pool.
struct ScriptState {
    handle: BlockHandle,
    engine: Box<dyn ScriptEngine>,
    exec_buf: ExecBuffer,
}

impl ScriptState {
    /// Dispatch one hook slot and apply the per-phase policy.
    ///
    /// `required` turns an unbound slot into an error; `want_result`
    /// demands a boolean result, where `false` and non-boolean values
    /// are errors.
    fn dispatch(
        &mut self,
        slot: HookSlot,
        required: bool,
        want_result: bool,
    ) -> Result<(), HookError> {
        let outcome = self
            .engine
            .call_hook(slot, &self.handle, want_result)
            .map_err(|e| HookError::Raised {
                hook: slot.name(),
                message: e.to_string(),
            })?;

        match outcome {
            HookOutcome::Unbound if required => Err(HookError::Missing(slot.name())),
            HookOutcome::Unbound => Ok(()),
            HookOutcome::Completed => Ok(()),
            HookOutcome::Returned(true) => Ok(()),
            HookOutcome::Returned(false) => Err(HookError::Rejected { hook: slot.name() }),
            HookOutcome::WrongType(got) => Err(HookError::NotBoolean {
                hook: slot.name(),
                got,
            }),
        }
    }
}

/// The scriptable execution block
pub struct ScriptBlock {
    engine_factory: EngineFactory,
    state: Option<ScriptState>,
}

impl ScriptBlock {
    /// Create a block backed by the Lua engine
    pub fn new() -> Self {
        Self::with_engine(Box::new(|| {
            LuaEngine::new().map(|e| Box::new(e) as Box<dyn ScriptEngine>)
        }))
    }

    /// Create a block backed by an arbitrary [`ScriptEngine`]
    pub fn with_engine(factory: EngineFactory) -> Self {
        Self {
            engine_factory: factory,
            state: None,
        }
    }

    fn script_file(env: &BlockEnv) -> Result<Option<String>, BlockError> {
        let Some(path) = env.config().get_str(CFG_SCRIPT_FILE) else {
            return Ok(None);
        };
        if path.len() > SCRIPT_FILE_MAX_LEN {
            return Err(BlockError::Config(format!(
                "'{}' exceeds {} bytes",
                CFG_SCRIPT_FILE, SCRIPT_FILE_MAX_LEN
            )));
        }
        Ok(Some(path.to_string()))
    }
}

impl Default for ScriptBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Block for ScriptBlock {
    /// Acquire the exec buffer and interpreter, load the optional initial
    /// file, then run the required `init` hook.
    ///
    /// Any failure drops the partially built state, which releases the
    /// buffer back to the pool and destroys the interpreter.
    fn init(&mut self, env: &BlockEnv) -> Result<(), BlockError> {
        let script_file = Self::script_file(env)?;

        let exec_buf = env.alloc_buffer(EXEC_BUF_CAPACITY)?;
        let mut engine = (self.engine_factory)()
            .map_err(|e| BlockError::AllocationFailure(e.to_string()))?;

        if let Some(path) = &script_file {
            engine
                .load_file(Path::new(path))
                .map_err(|e| BlockError::ScriptEvaluation(e.to_string()))?;
            debug!(block = env.name(), file = %path, "initial script loaded");
        }

        let mut state = ScriptState {
            handle: BlockHandle {
                id: env.id(),
                name: env.name().to_string(),
            },
            engine,
            exec_buf,
        };
        state.dispatch(HookSlot::Init, true, true)?;

        self.state = Some(state);
        Ok(())
    }

    fn start(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
        match &mut self.state {
            Some(state) => Ok(state.dispatch(HookSlot::Start, false, true)?),
            None => Err(BlockError::Config("script state not initialized".into())),
        }
    }

    /// Drain one pending `exec_str` message, then run the `step` hook.
    ///
    /// A failing evaluation reports status `-1` and skips the hook for
    /// this step; the block itself does not fail.
    fn step(&mut self, env: &BlockEnv) -> Result<(), BlockError> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| BlockError::Config("script state not initialized".into()))?;

        if let Some(port) = env.port(EXEC_PORT) {
            if let Some(source) = port.take_input() {
                state.exec_buf.write(source.as_bytes())?;
                let staged = String::from_utf8_lossy(state.exec_buf.contents()).into_owned();
                if let Err(e) = state.engine.eval(&staged) {
                    warn!(block = env.name(), error = %e, "submitted chunk failed to evaluate");
                    port.write_status(-1);
                    return Ok(());
                }
                port.write_status(0);
            }
        }

        if let Err(e) = state.dispatch(HookSlot::Step, false, false) {
            warn!(block = env.name(), error = %e, "step hook failed");
        }
        Ok(())
    }

    fn stop(&mut self, env: &BlockEnv) {
        if let Some(state) = &mut self.state {
            if let Err(e) = state.dispatch(HookSlot::Stop, false, false) {
                warn!(block = env.name(), error = %e, "stop hook failed");
            }
        }
    }

    /// Run the `cleanup` hook, then tear down interpreter and exec buffer.
    fn cleanup(&mut self, env: &BlockEnv) {
        if let Some(state) = &mut self.state {
            if let Err(e) = state.dispatch(HookSlot::Cleanup, false, false) {
                warn!(block = env.name(), error = %e, "cleanup hook failed");
            }
        }
        self.state = None;
    }
}

/// Register the scriptable block type with its `exec_str` port
pub fn register(registry: &BlockRegistry) -> Result<(), RegistryError> {
    registry.register_block_type(
        BlockType::new(
            SCRIPT_BLOCK_TYPE,
            "scriptable execution block (Lua)",
            || Box::new(ScriptBlock::new()),
        )
        .with_port(PortDecl::new(EXEC_PORT, EXEC_BUF_CAPACITY)),
    )
}

/// Withdraw the descriptor contributed by [`register`]
pub fn unregister(registry: &BlockRegistry) {
    if let Err(e) = registry.unregister_block_type(SCRIPT_BLOCK_TYPE) {
        warn!(error = %e, "failed to unregister script block type");
    }
}
