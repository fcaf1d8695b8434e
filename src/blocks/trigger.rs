//! Trigger scheduler block
//!
//! Owns one dedicated OS thread that steps a configured ordered list of
//! `(block, repeat-count)` pairs in a tight cycle. Activation is gated by
//! a mutex-protected activity flag observed through a condition variable;
//! while active, cycles run back-to-back with no internal delay — any
//! periodic timing comes from the forwarded OS scheduling-class hints
//! (`stacksize`, `sched_policy`, `sched_priority`), which this block does
//! not interpret.
//!
//! A failing sub-block step aborts the remainder of the current cycle
//! only; the thread stays up and waits for the next activation. Teardown
//! is cooperative: a cancel flag checked on every condvar wakeup and
//! between steps, then a bounded join. A sub-block step that blocks
//! indefinitely therefore stalls cleanup up to the join timeout, after
//! which the thread is detached and the leak reported — it is not
//! silently resolved.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::core::block::{Block, BlockError};
use crate::core::config::{ConfigStore, ConfigValue};
use crate::core::registry::{BlockRegistry, BlockType, RegistryError, TypeDescriptor};
use crate::core::BlockState;
use crate::runtime::{BlockCell, BlockEnv};

/// Registered block-type name
pub const TRIGGER_BLOCK_TYPE: &str = "std/trigger";
/// Registered data-type name of one trigger-list entry
pub const TRIGGER_ENTRY_TYPE: &str = "std/trigger_entry";

/// Configuration keys
pub const CFG_STACKSIZE: &str = "stacksize";
pub const CFG_SCHED_POLICY: &str = "sched_policy";
pub const CFG_SCHED_PRIORITY: &str = "sched_priority";
pub const CFG_TRIG_BLOCKS: &str = "trig_blocks";

/// Maximum length of the `sched_policy` name
pub const SCHED_POLICY_MAX_LEN: usize = 12;

/// Bound on waiting for the scheduler thread to exit at cleanup
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// OS scheduling policy forwarded to the dedicated thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    Other,
    Fifo,
    RoundRobin,
}

impl std::str::FromStr for SchedPolicy {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHED_OTHER" => Ok(SchedPolicy::Other),
            "SCHED_FIFO" => Ok(SchedPolicy::Fifo),
            "SCHED_RR" => Ok(SchedPolicy::RoundRobin),
            other => Err(BlockError::Config(format!(
                "unknown sched_policy '{}'",
                other
            ))),
        }
    }
}

/// Callback invoked on every aborted trigger cycle
pub type FailureHook = Arc<dyn Fn(&BlockError) + Send + Sync>;

/// One entry of the trigger list: a resolved target and its repeat count
#[derive(Clone)]
pub(crate) struct TriggerEntry {
    pub(crate) target: Arc<BlockCell>,
    pub(crate) repeat: u32,
}

#[derive(Debug, Clone, Copy)]
struct ThreadConfig {
    stack_size: Option<usize>,
    policy: Option<SchedPolicy>,
    priority: i32,
}

fn thread_config(cfg: &ConfigStore) -> Result<ThreadConfig, BlockError> {
    let stack_size = match cfg.get(CFG_STACKSIZE) {
        None => None,
        Some(v) => {
            let size = v.as_usize().ok_or_else(|| {
                BlockError::Config(format!("'{}' must be a non-negative integer", CFG_STACKSIZE))
            })?;
            // 0 means "use the platform default", as in pthread_attr_t
            (size > 0).then_some(size)
        }
    };

    let policy = match cfg.get_str(CFG_SCHED_POLICY) {
        None => None,
        Some(name) => {
            if name.len() > SCHED_POLICY_MAX_LEN {
                return Err(BlockError::Config(format!(
                    "'{}' exceeds {} bytes",
                    CFG_SCHED_POLICY, SCHED_POLICY_MAX_LEN
                )));
            }
            Some(name.parse::<SchedPolicy>()?)
        }
    };

    let priority = match cfg.get(CFG_SCHED_PRIORITY) {
        None => 0,
        Some(v) => v
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| {
                BlockError::Config(format!("'{}' must be a 32-bit integer", CFG_SCHED_PRIORITY))
            })?,
    };

    Ok(ThreadConfig {
        stack_size,
        policy,
        priority,
    })
}

/// Resolve the configured `trig_blocks` list against the hosting node.
///
/// The list is copied: entries hold `Arc` clones of the target cells, so
/// a configuration reload while the scheduler is active cannot invalidate
/// the running cycle.
fn parse_trigger_list(cfg: &ConfigStore, env: &BlockEnv) -> Result<Vec<TriggerEntry>, BlockError> {
    let Some(items) = cfg.get_array(CFG_TRIG_BLOCKS) else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .map(|item| {
            let obj = item.as_object().ok_or_else(|| {
                BlockError::Config(format!("each '{}' entry must be an object", CFG_TRIG_BLOCKS))
            })?;
            let name = obj
                .get("block")
                .and_then(ConfigValue::as_str)
                .ok_or_else(|| {
                    BlockError::Config(format!(
                        "each '{}' entry needs a 'block' name",
                        CFG_TRIG_BLOCKS
                    ))
                })?;
            let repeat = obj
                .get("num_steps")
                .and_then(ConfigValue::as_i64)
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| {
                    BlockError::Config(format!(
                        "each '{}' entry needs a non-negative 'num_steps'",
                        CFG_TRIG_BLOCKS
                    ))
                })?;
            let target = env.resolve(name).ok_or_else(|| {
                BlockError::Config(format!("unknown block '{}' in '{}'", name, CFG_TRIG_BLOCKS))
            })?;
            Ok(TriggerEntry { target, repeat })
        })
        .collect()
}

struct SchedInner {
    state: BlockState,
    entries: Vec<TriggerEntry>,
}

struct SchedShared {
    inner: Mutex<SchedInner>,
    cond: Condvar,
    cancel: AtomicBool,
}

struct Scheduler {
    shared: Arc<SchedShared>,
    thread: Option<JoinHandle<()>>,
    done: mpsc::Receiver<()>,
}

/// Run one trigger cycle: step each target exactly `repeat` times,
/// consecutively, in list order. Aborts on the first failing step.
pub(crate) fn run_cycle(entries: &[TriggerEntry], cancel: &AtomicBool) -> Result<(), BlockError> {
    for entry in entries {
        for _ in 0..entry.repeat {
            if cancel.load(Ordering::Acquire) {
                return Ok(());
            }
            entry.target.step().map_err(|e| BlockError::SubStep {
                block: entry.target.name().to_string(),
                source: Box::new(e),
            })?;
        }
    }
    Ok(())
}

fn scheduler_loop(
    shared: Arc<SchedShared>,
    failures: Arc<AtomicU64>,
    on_failure: Option<FailureHook>,
    cfg: ThreadConfig,
    block: String,
    _done: mpsc::Sender<()>,
) {
    if let Some(policy) = cfg.policy {
        match apply_sched_params(policy, cfg.priority) {
            Ok(()) => debug!(
                block = %block, ?policy, priority = cfg.priority,
                "scheduling class applied"
            ),
            Err(e) => warn!(
                block = %block, ?policy, priority = cfg.priority, error = %e,
                "failed to apply scheduling class"
            ),
        }
    }

    loop {
        let entries = {
            let mut inner = shared.inner.lock();
            loop {
                if shared.cancel.load(Ordering::Acquire) {
                    return;
                }
                if inner.state == BlockState::Active {
                    break;
                }
                shared.cond.wait(&mut inner);
            }
            inner.entries.clone()
        };

        if let Err(e) = run_cycle(&entries, &shared.cancel) {
            failures.fetch_add(1, Ordering::Relaxed);
            warn!(block = %block, error = %e, "trigger cycle aborted");
            if let Some(hook) = &on_failure {
                hook(&e);
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn apply_sched_params(policy: SchedPolicy, priority: i32) -> std::io::Result<()> {
    let native = match policy {
        SchedPolicy::Other => libc::SCHED_OTHER,
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::RoundRobin => libc::SCHED_RR,
    };
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: applies only to the calling thread; sched_param is plain data.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), native, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::from_raw_os_error(rc))
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_sched_params(_policy: SchedPolicy, _priority: i32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "scheduling class hints are only forwarded on Linux",
    ))
}

/// The trigger scheduler block
pub struct TriggerBlock {
    failures: Arc<AtomicU64>,
    on_failure: Option<FailureHook>,
    sched: Option<Scheduler>,
}

impl TriggerBlock {
    /// Create a scheduler block in `Preinit`
    pub fn new() -> Self {
        Self {
            failures: Arc::new(AtomicU64::new(0)),
            on_failure: None,
            sched: None,
        }
    }

    /// Install a callback invoked on every aborted cycle
    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    /// Shared counter of aborted cycles
    ///
    /// Retain a clone before handing the block to a node to keep cycle
    /// failures observable.
    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failures)
    }

    /// Number of aborted cycles so far
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for TriggerBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Block for TriggerBlock {
    fn init(&mut self, env: &BlockEnv) -> Result<(), BlockError> {
        let cfg = thread_config(env.config())?;

        let shared = Arc::new(SchedShared {
            inner: Mutex::new(SchedInner {
                state: BlockState::Inactive,
                entries: Vec::new(),
            }),
            cond: Condvar::new(),
            cancel: AtomicBool::new(false),
        });
        let (done_tx, done_rx) = mpsc::channel();

        let mut builder = std::thread::Builder::new().name(format!("trig-{}", env.name()));
        if let Some(stack) = cfg.stack_size {
            builder = builder.stack_size(stack);
        }

        let thread = builder
            .spawn({
                let shared = Arc::clone(&shared);
                let failures = Arc::clone(&self.failures);
                let on_failure = self.on_failure.clone();
                let block = env.name().to_string();
                move || scheduler_loop(shared, failures, on_failure, cfg, block, done_tx)
            })
            .map_err(|e| BlockError::ThreadCreationFailure(e.to_string()))?;

        self.sched = Some(Scheduler {
            shared,
            thread: Some(thread),
            done: done_rx,
        });
        Ok(())
    }

    fn start(&mut self, env: &BlockEnv) -> Result<(), BlockError> {
        let sched = self
            .sched
            .as_ref()
            .ok_or_else(|| BlockError::Config("scheduler thread not initialized".into()))?;

        let entries = parse_trigger_list(env.config(), env)?;
        debug!(block = env.name(), entries = entries.len(), "trigger list resolved");

        let mut inner = sched.shared.inner.lock();
        inner.entries = entries;
        inner.state = BlockState::Active;
        sched.shared.cond.notify_one();
        Ok(())
    }

    fn stop(&mut self, _env: &BlockEnv) {
        if let Some(sched) = &self.sched {
            // takes effect at the next cycle boundary; no signal needed
            sched.shared.inner.lock().state = BlockState::Inactive;
        }
    }

    fn cleanup(&mut self, env: &BlockEnv) {
        let Some(mut sched) = self.sched.take() else {
            return;
        };

        sched.shared.cancel.store(true, Ordering::Release);
        {
            // wake under the mutex so the cancel store cannot race a wait
            let _inner = sched.shared.inner.lock();
            sched.shared.cond.notify_all();
        }

        match sched.done.recv_timeout(JOIN_TIMEOUT) {
            Err(mpsc::RecvTimeoutError::Timeout) => {
                error!(
                    block = env.name(),
                    timeout = ?JOIN_TIMEOUT,
                    "scheduler thread did not exit; detaching it"
                );
            }
            _ => {
                if let Some(handle) = sched.thread.take() {
                    if handle.join().is_err() {
                        error!(block = env.name(), "scheduler thread panicked");
                    }
                }
            }
        }
    }
}

/// Register the trigger block type and its entry data type
pub fn register(registry: &BlockRegistry) -> Result<(), RegistryError> {
    registry.register_type(TypeDescriptor::new(
        TRIGGER_ENTRY_TYPE,
        "ordered (block, repeat-count) pair stepped once per trigger cycle",
    ))?;
    registry.register_block_type(BlockType::new(
        TRIGGER_BLOCK_TYPE,
        "dedicated-thread trigger scheduler",
        || Box::new(TriggerBlock::new()),
    ))
}

/// Withdraw the descriptors contributed by [`register`]
pub fn unregister(registry: &BlockRegistry) {
    if let Err(e) = registry.unregister_block_type(TRIGGER_BLOCK_TYPE) {
        warn!(error = %e, "failed to unregister trigger block type");
    }
    if let Err(e) = registry.unregister_type(TRIGGER_ENTRY_TYPE) {
        warn!(error = %e, "failed to unregister trigger entry type");
    }
}
