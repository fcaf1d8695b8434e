//! Standard blocks shipped with the crate
//!
//! Two block types plus the registration entry points a hosting node
//! calls at module load and unload:
//! - [`trigger::TriggerBlock`] (`std/trigger`), the dedicated-thread
//!   trigger scheduler
//! - [`script::ScriptBlock`] (`std/lua`), the scriptable execution block

pub mod script;
pub mod trigger;

use crate::core::registry::{BlockRegistry, RegistryError};

/// Register both standard block types and their data types
pub fn register(registry: &BlockRegistry) -> Result<(), RegistryError> {
    trigger::register(registry)?;
    script::register(registry)
}

/// Withdraw everything contributed by [`register`]
pub fn unregister(registry: &BlockRegistry) {
    script::unregister(registry);
    trigger::unregister(registry);
}
