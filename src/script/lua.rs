//! Lua backend for the script engine interface
//!
//! One isolated `mlua::Lua` VM per block instance, standard library
//! loaded. Hooks are plain global functions; the block handle crosses
//! into Lua as userdata with read-only `name` and `id` fields.

use mlua::{Lua, UserData, UserDataFields, Value};
use std::path::Path;

use super::{BlockHandle, HookOutcome, HookSlot, ScriptEngine, ScriptError};

impl UserData for BlockHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.name.clone()));
        fields.add_field_method_get("id", |_, this| Ok(this.id.to_string()));
    }
}

/// mlua-backed [`ScriptEngine`]
pub struct LuaEngine {
    lua: Lua,
}

impl LuaEngine {
    /// Create a fresh interpreter with standard bindings loaded
    pub fn new() -> Result<Self, ScriptError> {
        Ok(Self { lua: Lua::new() })
    }
}

impl ScriptEngine for LuaEngine {
    fn load_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|e| ScriptError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.lua
            .load(&source)
            .set_name(path.to_string_lossy().into_owned())
            .exec()
            .map_err(|e| ScriptError::Load {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    fn eval(&mut self, chunk: &str) -> Result<(), ScriptError> {
        self.lua
            .load(chunk)
            .set_name("exec_str")
            .exec()
            .map_err(|e| ScriptError::Eval(e.to_string()))
    }

    fn call_hook(
        &mut self,
        slot: HookSlot,
        handle: &BlockHandle,
        want_result: bool,
    ) -> Result<HookOutcome, ScriptError> {
        let func = match self
            .lua
            .globals()
            .get::<Value>(slot.name())
            .map_err(|e| ScriptError::Eval(e.to_string()))?
        {
            Value::Nil => return Ok(HookOutcome::Unbound),
            Value::Function(f) => f,
            other => {
                return Err(ScriptError::Eval(format!(
                    "global '{}' is a {}, not a function",
                    slot.name(),
                    other.type_name()
                )))
            }
        };

        let arg = self
            .lua
            .create_userdata(handle.clone())
            .map_err(|e| ScriptError::Eval(e.to_string()))?;
        let ret = func
            .call::<Value>(arg)
            .map_err(|e| ScriptError::Eval(e.to_string()))?;

        if !want_result {
            return Ok(HookOutcome::Completed);
        }
        match ret {
            Value::Boolean(b) => Ok(HookOutcome::Returned(b)),
            other => Ok(HookOutcome::WrongType(other.type_name().to_string())),
        }
    }
}
