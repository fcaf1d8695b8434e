//! Integration tests: a trigger block driving a scriptable block
//!
//! These tests build the topology end-to-end through the registry:
//!   host → Node (create_block) → std/trigger ─steps→ std/lua ← exec_str

use std::io::Write as _;
use std::thread;
use std::time::{Duration, Instant};

use crate::blocks;
use crate::blocks::script::{CFG_SCRIPT_FILE, EXEC_PORT};
use crate::blocks::trigger::{CFG_SCHED_POLICY, CFG_SCHED_PRIORITY};
use crate::core::config::ConfigStore;
use crate::core::registry::BlockRegistry;
use crate::core::BlockState;
use crate::runtime::Node;

fn script_file(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Poll the exec port for a status for up to two seconds.
fn wait_for_status(port: &crate::core::port::ExecPort) -> Option<i32> {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if let Some(status) = port.read_status() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn test_trigger_drives_script_block() {
    crate::tests::init_tracing();
    let file = script_file(
        r#"
        steps = 0
        function init(b) return true end
        function step(b) steps = steps + 1 end
        "#,
    );

    let registry = BlockRegistry::new();
    blocks::register(&registry).unwrap();
    let node = Node::new(registry);

    let lua_cfg = ConfigStore::new().with(CFG_SCRIPT_FILE, file.path().to_str().unwrap());
    let lua = node.create_block("std/lua", "lua1", lua_cfg).unwrap();

    let trig_cfg = ConfigStore::from_json(
        r#"{ "trig_blocks": [ { "block": "lua1", "num_steps": 1 } ] }"#,
    )
    .unwrap();
    let trig = node.create_block("std/trigger", "trig1", trig_cfg).unwrap();

    lua.init().unwrap();
    lua.start().unwrap();
    trig.init().unwrap();
    trig.start().unwrap();

    // the scheduler thread drains submissions; the assertion holds as
    // soon as at least one scripted step has run
    let port = lua.port(EXEC_PORT).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut stepped = false;
    while Instant::now() < deadline {
        port.submit("assert(steps > 0)").unwrap();
        if wait_for_status(&port) == Some(0) {
            stepped = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(stepped, "no scripted step observed within the deadline");

    trig.cleanup().unwrap();
    lua.cleanup().unwrap();
    assert_eq!(node.buffer_pool().used(), 0);
}

#[test]
fn test_submission_failure_is_contained() {
    let file = script_file("function init(b) return true end");

    let registry = BlockRegistry::new();
    blocks::register(&registry).unwrap();
    let node = Node::new(registry);

    let lua_cfg = ConfigStore::new().with(CFG_SCRIPT_FILE, file.path().to_str().unwrap());
    let lua = node.create_block("std/lua", "lua1", lua_cfg).unwrap();
    let trig_cfg = ConfigStore::from_json(
        r#"{ "trig_blocks": [ { "block": "lua1", "num_steps": 1 } ] }"#,
    )
    .unwrap();
    let trig = node.create_block("std/trigger", "trig1", trig_cfg).unwrap();

    lua.init().unwrap();
    lua.start().unwrap();
    trig.init().unwrap();
    trig.start().unwrap();

    let port = lua.port(EXEC_PORT).unwrap();
    port.submit("not a chunk").unwrap();
    assert_eq!(wait_for_status(&port), Some(-1));

    // the topology survived the bad submission
    port.submit("x = 1").unwrap();
    assert_eq!(wait_for_status(&port), Some(0));
    assert_eq!(lua.state(), BlockState::Active);

    trig.cleanup().unwrap();
    lua.cleanup().unwrap();
}

#[test]
fn test_scheduling_hints_do_not_break_startup() {
    // an unprivileged process cannot get SCHED_FIFO; the hint must be
    // reported, not fatal
    let registry = BlockRegistry::new();
    blocks::register(&registry).unwrap();
    let node = Node::new(registry);

    let cfg = ConfigStore::new()
        .with(CFG_SCHED_POLICY, "SCHED_FIFO")
        .with(CFG_SCHED_PRIORITY, 80i64);
    let trig = node.create_block("std/trigger", "trig1", cfg).unwrap();

    trig.init().unwrap();
    trig.start().unwrap();
    trig.cleanup().unwrap();
    assert_eq!(trig.state(), BlockState::Preinit);
}

#[test]
fn test_full_teardown_through_node() {
    let file = script_file("function init(b) return true end");

    let registry = BlockRegistry::new();
    blocks::register(&registry).unwrap();
    let node = Node::new(registry.clone());

    let lua_cfg = ConfigStore::new().with(CFG_SCRIPT_FILE, file.path().to_str().unwrap());
    let lua = node.create_block("std/lua", "lua1", lua_cfg).unwrap();
    let trig = node
        .create_block("std/trigger", "trig1", ConfigStore::new())
        .unwrap();

    lua.init().unwrap();
    trig.init().unwrap();

    lua.cleanup().unwrap();
    trig.cleanup().unwrap();
    node.remove_block("lua1").unwrap();
    node.remove_block("trig1").unwrap();
    assert_eq!(node.block_count(), 0);

    blocks::unregister(&registry);
    assert_eq!(registry.block_type_count(), 0);
}
