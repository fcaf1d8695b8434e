//! Exec port
//!
//! A bidirectional named port carrying source text inbound and a 4-byte
//! status code outbound. One status is produced per step in which input
//! was present: `0` for a successful evaluation, non-zero otherwise.
//!
//! Inbound messages are bounded by the port capacity (the exec buffer
//! size); oversized submissions are rejected at the boundary rather than
//! truncated inside the block.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Port declaration carried by a block-type descriptor
#[derive(Debug, Clone)]
pub struct PortDecl {
    /// Port name, e.g. `exec_str`
    pub name: String,
    /// Maximum inbound message size in bytes
    pub capacity: usize,
}

impl PortDecl {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Port errors
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Inbound message exceeds the port capacity
    #[error("message of {len} bytes exceeds capacity {capacity} of port '{port}'")]
    MessageTooLarge {
        port: String,
        len: usize,
        capacity: usize,
    },
}

struct PortInner {
    inbox: VecDeque<String>,
    statuses: VecDeque<i32>,
}

/// The bidirectional exec port of a block instance
///
/// Writers (the host, or peer blocks) submit source text; the owning
/// block drains it one message per step and pushes a status code back.
pub struct ExecPort {
    name: String,
    capacity: usize,
    inner: Mutex<PortInner>,
}

impl ExecPort {
    /// Create a port with the given inbound message capacity
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            inner: Mutex::new(PortInner {
                inbox: VecDeque::new(),
                statuses: VecDeque::new(),
            }),
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum inbound message size in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Submit source text for execution
    pub fn submit(&self, source: impl Into<String>) -> Result<(), PortError> {
        let source = source.into();
        if source.len() > self.capacity {
            return Err(PortError::MessageTooLarge {
                port: self.name.clone(),
                len: source.len(),
                capacity: self.capacity,
            });
        }
        self.inner.lock().inbox.push_back(source);
        Ok(())
    }

    /// Take the oldest pending message, if any
    pub fn take_input(&self) -> Option<String> {
        self.inner.lock().inbox.pop_front()
    }

    /// Number of pending inbound messages
    pub fn pending(&self) -> usize {
        self.inner.lock().inbox.len()
    }

    /// Report an execution status back to the submitter
    pub fn write_status(&self, code: i32) {
        self.inner.lock().statuses.push_back(code);
    }

    /// Read the oldest unread status, if any
    pub fn read_status(&self) -> Option<i32> {
        self.inner.lock().statuses.pop_front()
    }
}
