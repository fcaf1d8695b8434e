//! Block hosting runtime
//!
//! The [`Node`] is the minimal hosting surface the blocks in this crate
//! consume: it owns block instances together with their configuration and
//! ports, hands out typed buffers, resolves peer blocks by name, and
//! enforces the lifecycle state machine (`Preinit → Inactive → Active`).
//!
//! The node never invokes one instance's lifecycle calls concurrently;
//! stepping, however, may come from a trigger block's dedicated thread,
//! so every [`BlockCell`] serializes access to its implementation.

pub mod buffer;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::core::block::{Block, BlockError};
use crate::core::config::ConfigStore;
use crate::core::port::{ExecPort, PortDecl};
use crate::core::registry::BlockRegistry;
use crate::core::{BlockId, BlockState};

use buffer::{BufferPool, ExecBuffer};

/// Per-instance environment handed into every lifecycle call
///
/// Carries the instance's identity, configuration and ports, plus access
/// to the node's buffer pool and peer lookup. Peer lookup holds only a
/// weak reference to the node, so an environment never keeps its host
/// alive.
pub struct BlockEnv {
    id: BlockId,
    name: String,
    config: ConfigStore,
    ports: HashMap<String, Arc<ExecPort>>,
    buffers: Arc<BufferPool>,
    node: Weak<NodeInner>,
}

impl BlockEnv {
    /// Instance identifier
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance configuration
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Look up one of the instance's own ports
    pub fn port(&self, name: &str) -> Option<Arc<ExecPort>> {
        self.ports.get(name).cloned()
    }

    /// Allocate a fixed-capacity buffer from the node pool
    pub fn alloc_buffer(&self, capacity: usize) -> Result<ExecBuffer, BlockError> {
        self.buffers.alloc(capacity)
    }

    /// Resolve a peer block instance by name
    pub fn resolve(&self, name: &str) -> Option<Arc<BlockCell>> {
        let node = self.node.upgrade()?;
        let cell = node.cells.read().get(name).cloned();
        cell
    }
}

/// A hosted block instance: implementation, environment and state
pub struct BlockCell {
    env: BlockEnv,
    state: Mutex<BlockState>,
    imp: Mutex<Box<dyn Block>>,
}

impl std::fmt::Debug for BlockCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCell").finish_non_exhaustive()
    }
}

impl BlockCell {
    /// Instance name
    pub fn name(&self) -> &str {
        &self.env.name
    }

    /// Instance identifier
    pub fn id(&self) -> BlockId {
        self.env.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> BlockState {
        *self.state.lock()
    }

    /// Look up one of the instance's ports
    pub fn port(&self, name: &str) -> Option<Arc<ExecPort>> {
        self.env.port(name)
    }

    fn expect(&self, actual: BlockState, expected: BlockState) -> Result<(), BlockError> {
        if actual == expected {
            Ok(())
        } else {
            Err(BlockError::InvalidState {
                block: self.env.name.clone(),
                expected,
                actual,
            })
        }
    }

    /// Initialize the block (`Preinit → Inactive`)
    pub fn init(&self) -> Result<(), BlockError> {
        let mut state = self.state.lock();
        self.expect(*state, BlockState::Preinit)?;
        self.imp.lock().init(&self.env)?;
        *state = BlockState::Inactive;
        Ok(())
    }

    /// Start the block (`Inactive → Active`)
    pub fn start(&self) -> Result<(), BlockError> {
        let mut state = self.state.lock();
        self.expect(*state, BlockState::Inactive)?;
        self.imp.lock().start(&self.env)?;
        *state = BlockState::Active;
        Ok(())
    }

    /// Step the block once. Requires `Active`.
    pub fn step(&self) -> Result<(), BlockError> {
        {
            let state = self.state.lock();
            self.expect(*state, BlockState::Active)?;
        }
        self.imp.lock().step(&self.env)
    }

    /// Stop the block (`Active → Inactive`)
    pub fn stop(&self) -> Result<(), BlockError> {
        let mut state = self.state.lock();
        self.expect(*state, BlockState::Active)?;
        self.imp.lock().stop(&self.env);
        *state = BlockState::Inactive;
        Ok(())
    }

    /// Release the block's resources (`Inactive | Active → Preinit`)
    ///
    /// Legal while `Active`: the block is stopped first, so a trigger
    /// block mid-cycle is deactivated and joined before its state is
    /// torn down.
    pub fn cleanup(&self) -> Result<(), BlockError> {
        let mut state = self.state.lock();
        match *state {
            BlockState::Preinit => {
                return self.expect(*state, BlockState::Inactive);
            }
            BlockState::Active => {
                let mut imp = self.imp.lock();
                imp.stop(&self.env);
                imp.cleanup(&self.env);
            }
            BlockState::Inactive => {
                self.imp.lock().cleanup(&self.env);
            }
        }
        *state = BlockState::Preinit;
        Ok(())
    }
}

struct NodeInner {
    registry: BlockRegistry,
    buffers: Arc<BufferPool>,
    cells: RwLock<HashMap<String, Arc<BlockCell>>>,
}

/// The hosting runtime for block instances
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Create a node backed by the given registry and a default-sized
    /// buffer pool
    pub fn new(registry: BlockRegistry) -> Self {
        Self::with_buffer_limit(registry, buffer::DEFAULT_POOL_LIMIT)
    }

    /// Create a node with an explicit buffer pool limit
    pub fn with_buffer_limit(registry: BlockRegistry, limit: usize) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                registry,
                buffers: Arc::new(BufferPool::new(limit)),
                cells: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The registry this node instantiates from
    pub fn registry(&self) -> &BlockRegistry {
        &self.inner.registry
    }

    /// The node's buffer pool
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.inner.buffers
    }

    /// Instantiate a registered block type under an instance name
    pub fn create_block(
        &self,
        type_name: &str,
        instance_name: &str,
        config: ConfigStore,
    ) -> Result<Arc<BlockCell>, BlockError> {
        let block_type = self
            .inner
            .registry
            .block_type(type_name)
            .map_err(|e| BlockError::Config(e.to_string()))?;
        let imp = block_type.instantiate();
        self.insert_block(instance_name, imp, config, block_type.ports().to_vec())
    }

    /// Host a pre-built block instance
    ///
    /// This is the entry point for instances the host constructs itself,
    /// e.g. to retain an observability handle before handing the block
    /// over.
    pub fn insert_block(
        &self,
        instance_name: &str,
        imp: Box<dyn Block>,
        config: ConfigStore,
        ports: Vec<PortDecl>,
    ) -> Result<Arc<BlockCell>, BlockError> {
        let mut cells = self.inner.cells.write();
        if cells.contains_key(instance_name) {
            return Err(BlockError::Config(format!(
                "block instance '{}' already exists",
                instance_name
            )));
        }

        let port_map = ports
            .into_iter()
            .map(|decl| {
                let port = Arc::new(ExecPort::new(decl.name.clone(), decl.capacity));
                (decl.name, port)
            })
            .collect();

        let cell = Arc::new(BlockCell {
            env: BlockEnv {
                id: BlockId::new(),
                name: instance_name.to_string(),
                config,
                ports: port_map,
                buffers: Arc::clone(&self.inner.buffers),
                node: Arc::downgrade(&self.inner),
            },
            state: Mutex::new(BlockState::Preinit),
            imp: Mutex::new(imp),
        });

        debug!(block = instance_name, "block instance created");
        cells.insert(instance_name.to_string(), Arc::clone(&cell));
        Ok(cell)
    }

    /// Look up a hosted instance by name
    pub fn block(&self, name: &str) -> Option<Arc<BlockCell>> {
        self.inner.cells.read().get(name).cloned()
    }

    /// Drop a hosted instance. Requires it to be back in `Preinit`.
    pub fn remove_block(&self, name: &str) -> Result<(), BlockError> {
        let mut cells = self.inner.cells.write();
        let cell = cells
            .get(name)
            .ok_or_else(|| BlockError::Config(format!("no block instance '{}'", name)))?;
        let state = cell.state();
        if state != BlockState::Preinit {
            return Err(BlockError::InvalidState {
                block: name.to_string(),
                expected: BlockState::Preinit,
                actual: state,
            });
        }
        cells.remove(name);
        debug!(block = name, "block instance removed");
        Ok(())
    }

    /// Number of hosted instances
    pub fn block_count(&self) -> usize {
        self.inner.cells.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ProbeBlock {
        inited: bool,
        steps: u64,
    }

    impl Block for ProbeBlock {
        fn init(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
            self.inited = true;
            Ok(())
        }
        fn start(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
            Ok(())
        }
        fn step(&mut self, _env: &BlockEnv) -> Result<(), BlockError> {
            self.steps += 1;
            Ok(())
        }
        fn stop(&mut self, _env: &BlockEnv) {}
        fn cleanup(&mut self, _env: &BlockEnv) {
            self.inited = false;
        }
    }

    fn hosted_probe(node: &Node, name: &str) -> Arc<BlockCell> {
        node.insert_block(
            name,
            Box::new(ProbeBlock::default()),
            ConfigStore::new(),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let node = Node::new(BlockRegistry::new());
        let cell = hosted_probe(&node, "probe");

        assert_eq!(cell.state(), BlockState::Preinit);
        cell.init().unwrap();
        assert_eq!(cell.state(), BlockState::Inactive);
        cell.start().unwrap();
        assert_eq!(cell.state(), BlockState::Active);
        cell.step().unwrap();
        cell.stop().unwrap();
        assert_eq!(cell.state(), BlockState::Inactive);
        cell.cleanup().unwrap();
        assert_eq!(cell.state(), BlockState::Preinit);
    }

    #[test]
    fn test_step_requires_active() {
        let node = Node::new(BlockRegistry::new());
        let cell = hosted_probe(&node, "probe");
        cell.init().unwrap();

        let err = cell.step().unwrap_err();
        assert!(matches!(
            err,
            BlockError::InvalidState {
                expected: BlockState::Active,
                actual: BlockState::Inactive,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_order_transitions_rejected() {
        let node = Node::new(BlockRegistry::new());
        let cell = hosted_probe(&node, "probe");

        assert!(cell.start().is_err());
        assert!(cell.stop().is_err());
        assert!(cell.cleanup().is_err());

        cell.init().unwrap();
        assert!(cell.init().is_err());
    }

    #[test]
    fn test_cleanup_while_active_stops_first() {
        let node = Node::new(BlockRegistry::new());
        let cell = hosted_probe(&node, "probe");
        cell.init().unwrap();
        cell.start().unwrap();

        cell.cleanup().unwrap();
        assert_eq!(cell.state(), BlockState::Preinit);
    }

    #[test]
    fn test_duplicate_instance_name() {
        let node = Node::new(BlockRegistry::new());
        hosted_probe(&node, "probe");
        let result = node.insert_block(
            "probe",
            Box::new(ProbeBlock::default()),
            ConfigStore::new(),
            Vec::new(),
        );
        assert!(matches!(result.unwrap_err(), BlockError::Config(_)));
    }

    #[test]
    fn test_remove_requires_preinit() {
        let node = Node::new(BlockRegistry::new());
        let cell = hosted_probe(&node, "probe");
        cell.init().unwrap();

        assert!(node.remove_block("probe").is_err());
        cell.cleanup().unwrap();
        node.remove_block("probe").unwrap();
        assert_eq!(node.block_count(), 0);
    }

    #[test]
    fn test_resolve_peer() {
        let node = Node::new(BlockRegistry::new());
        let a = hosted_probe(&node, "a");
        hosted_probe(&node, "b");

        let b = a.env.resolve("b").unwrap();
        assert_eq!(b.name(), "b");
        assert!(a.env.resolve("c").is_none());
    }
}
