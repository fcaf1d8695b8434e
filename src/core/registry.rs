//! Block Registry - explicit registry for block and data types
//!
//! This module provides a thread-safe registry for the descriptors a
//! module contributes at load time and withdraws at unload time:
//! - **Block types**: a named factory plus the port declarations its
//!   instances carry (e.g. `std/trigger`, `std/lua`).
//! - **Data types**: named descriptors for the structured configuration
//!   types blocks consume (e.g. the trigger-entry record).
//!
//! The registry is an explicit object with its lifetime bound to the
//! hosting node; there is no process-wide ambient state.

use crate::core::block::Block;
use crate::core::port::PortDecl;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory producing a fresh, `Preinit` block instance
pub type BlockFactory = Box<dyn Fn() -> Box<dyn Block> + Send + Sync>;

/// Descriptor for a registered block type
pub struct BlockType {
    name: String,
    description: String,
    ports: Vec<PortDecl>,
    factory: BlockFactory,
}

impl BlockType {
    /// Create a block-type descriptor
    ///
    /// # Example
    /// ```ignore
    /// let bt = BlockType::new("std/trigger", "periodic trigger", || Box::new(TriggerBlock::new()));
    /// ```
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        factory: impl Fn() -> Box<dyn Block> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ports: Vec::new(),
            factory: Box::new(factory),
        }
    }

    /// Declare a port every instance of this type carries
    pub fn with_port(mut self, decl: PortDecl) -> Self {
        self.ports.push(decl);
        self
    }

    /// Type name, e.g. `std/lua`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Port declarations for instances of this type
    pub fn ports(&self) -> &[PortDecl] {
        &self.ports
    }

    /// Produce a fresh instance
    pub fn instantiate(&self) -> Box<dyn Block> {
        (self.factory)()
    }
}

/// Descriptor for a registered structured data type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub description: String,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Block type with the given name was not found
    #[error("unknown block type: {0}")]
    UnknownBlockType(String),

    /// Attempted to register a block type under a name already taken
    #[error("duplicate block type: {0}")]
    DuplicateBlockType(String),

    /// Data type with the given name was not found
    #[error("unknown data type: {0}")]
    UnknownType(String),

    /// Attempted to register a data type under a name already taken
    #[error("duplicate data type: {0}")]
    DuplicateType(String),

    /// Descriptor validation failed
    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Thread-safe registry of block types and data types
///
/// Uses `Arc<RwLock<HashMap>>` internally for concurrent reads with
/// exclusive writes (parking_lot). Cloning yields a handle to the same
/// registry.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    block_types: Arc<RwLock<HashMap<String, Arc<BlockType>>>>,
    data_types: Arc<RwLock<HashMap<String, Arc<TypeDescriptor>>>>,
}

impl BlockRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block type
    ///
    /// # Returns
    /// * `Ok(())` if registration succeeds
    /// * `Err(RegistryError)` if the name is empty or already taken
    pub fn register_block_type(&self, block_type: BlockType) -> Result<(), RegistryError> {
        if block_type.name.is_empty() {
            return Err(RegistryError::ValidationError(
                "block type name cannot be empty".into(),
            ));
        }
        let mut types = self.block_types.write();
        if types.contains_key(&block_type.name) {
            return Err(RegistryError::DuplicateBlockType(block_type.name));
        }
        types.insert(block_type.name.clone(), Arc::new(block_type));
        Ok(())
    }

    /// Unregister a block type by name
    pub fn unregister_block_type(&self, name: &str) -> Result<(), RegistryError> {
        self.block_types
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::UnknownBlockType(name.to_string()))
    }

    /// Look up a block type by name
    pub fn block_type(&self, name: &str) -> Result<Arc<BlockType>, RegistryError> {
        self.block_types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownBlockType(name.to_string()))
    }

    /// Register a structured data type
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<(), RegistryError> {
        if descriptor.name.is_empty() {
            return Err(RegistryError::ValidationError(
                "data type name cannot be empty".into(),
            ));
        }
        let mut types = self.data_types.write();
        if types.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateType(descriptor.name));
        }
        types.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Unregister a structured data type by name
    pub fn unregister_type(&self, name: &str) -> Result<(), RegistryError> {
        self.data_types
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    /// Look up a structured data type by name
    pub fn data_type(&self, name: &str) -> Result<Arc<TypeDescriptor>, RegistryError> {
        self.data_types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    /// Check if a block type is registered
    pub fn contains_block_type(&self, name: &str) -> bool {
        self.block_types.read().contains_key(name)
    }

    /// Number of registered block types
    pub fn block_type_count(&self) -> usize {
        self.block_types.read().len()
    }

    /// Number of registered data types
    pub fn data_type_count(&self) -> usize {
        self.data_types.read().len()
    }

    /// Remove all registered descriptors
    pub fn clear(&self) {
        self.block_types.write().clear();
        self.data_types.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::BlockError;
    use crate::runtime::BlockEnv;

    struct NoopBlock;

    impl Block for NoopBlock {
        fn init(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
            Ok(())
        }
        fn start(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
            Ok(())
        }
        fn stop(&mut self, _env: &BlockEnv) {}
        fn cleanup(&mut self, _env: &BlockEnv) {}
    }

    fn noop_type(name: &str) -> BlockType {
        BlockType::new(name, "a block that does nothing", || Box::new(NoopBlock))
    }

    #[test]
    fn test_registry_creation() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.block_type_count(), 0);
        assert_eq!(registry.data_type_count(), 0);
    }

    #[test]
    fn test_block_type_registration() {
        let registry = BlockRegistry::new();
        registry.register_block_type(noop_type("test/noop")).unwrap();

        assert_eq!(registry.block_type_count(), 1);
        assert!(registry.contains_block_type("test/noop"));

        let bt = registry.block_type("test/noop").unwrap();
        assert_eq!(bt.name(), "test/noop");
        let _instance = bt.instantiate();
    }

    #[test]
    fn test_duplicate_block_type() {
        let registry = BlockRegistry::new();
        registry.register_block_type(noop_type("test/noop")).unwrap();

        let result = registry.register_block_type(noop_type("test/noop"));
        assert!(matches!(
            result.unwrap_err(),
            RegistryError::DuplicateBlockType(_)
        ));
    }

    #[test]
    fn test_unregister_block_type() {
        let registry = BlockRegistry::new();
        registry.register_block_type(noop_type("test/noop")).unwrap();
        registry.unregister_block_type("test/noop").unwrap();

        assert_eq!(registry.block_type_count(), 0);
        assert!(matches!(
            registry.unregister_block_type("test/noop").unwrap_err(),
            RegistryError::UnknownBlockType(_)
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = BlockRegistry::new();
        assert!(matches!(
            registry.register_block_type(noop_type("")).unwrap_err(),
            RegistryError::ValidationError(_)
        ));
        assert!(matches!(
            registry
                .register_type(TypeDescriptor::new("", "nameless"))
                .unwrap_err(),
            RegistryError::ValidationError(_)
        ));
    }

    #[test]
    fn test_data_type_registration() {
        let registry = BlockRegistry::new();
        registry
            .register_type(TypeDescriptor::new(
                "std/trigger_entry",
                "(block, repeat) pair",
            ))
            .unwrap();

        let td = registry.data_type("std/trigger_entry").unwrap();
        assert_eq!(td.name, "std/trigger_entry");

        registry.unregister_type("std/trigger_entry").unwrap();
        assert!(registry.data_type("std/trigger_entry").is_err());
    }

    #[test]
    fn test_port_declarations() {
        let bt = noop_type("test/ported")
            .with_port(crate::core::port::PortDecl::new("exec_str", 4096));
        assert_eq!(bt.ports().len(), 1);
        assert_eq!(bt.ports()[0].name, "exec_str");
        assert_eq!(bt.ports()[0].capacity, 4096);
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let registry = BlockRegistry::new();
        let mut handles = vec![];

        for i in 0..10 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                registry
                    .register_block_type(noop_type(&format!("test/noop{}", i)))
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.block_type_count(), 10);
    }
}
