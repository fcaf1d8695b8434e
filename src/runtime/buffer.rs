//! Typed buffer allocation
//!
//! The node owns a [`BufferPool`] from which blocks allocate their
//! fixed-capacity working buffers (the scriptable block's 16 MiB exec
//! buffer). Allocations are accounted against a pool limit so that a
//! misconfigured topology fails with `AllocationFailure` instead of
//! exhausting the process; capacity returns to the pool when the buffer
//! is dropped.

use crate::core::block::BlockError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default pool limit: 64 MiB
pub const DEFAULT_POOL_LIMIT: usize = 64 * 1024 * 1024;

/// Accounted allocator for fixed-capacity block buffers
pub struct BufferPool {
    limit: usize,
    used: Arc<AtomicUsize>,
}

impl BufferPool {
    /// Create a pool with the given byte limit
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Allocate a fixed-capacity buffer
    ///
    /// Fails with `AllocationFailure` when the pool limit would be
    /// exceeded or the backing memory cannot be reserved.
    pub fn alloc(&self, capacity: usize) -> Result<ExecBuffer, BlockError> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(capacity).filter(|total| *total <= self.limit)
            })
            .map_err(|used| {
                BlockError::AllocationFailure(format!(
                    "buffer of {} bytes exceeds pool limit ({} of {} bytes in use)",
                    capacity, used, self.limit
                ))
            })?;

        let mut data = Vec::new();
        if let Err(e) = data.try_reserve_exact(capacity) {
            self.used.fetch_sub(capacity, Ordering::AcqRel);
            return Err(BlockError::AllocationFailure(format!(
                "failed to reserve {} bytes: {}",
                capacity, e
            )));
        }

        Ok(ExecBuffer {
            data,
            capacity,
            used: Arc::clone(&self.used),
        })
    }

    /// Bytes currently allocated from the pool
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Pool limit in bytes
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_LIMIT)
    }
}

/// Fixed-capacity byte buffer owned by exactly one block instance
///
/// Returns its capacity to the originating pool on drop.
#[derive(Debug)]
pub struct ExecBuffer {
    data: Vec<u8>,
    capacity: usize,
    used: Arc<AtomicUsize>,
}

impl ExecBuffer {
    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the buffer contents
    ///
    /// The write is rejected if it exceeds the fixed capacity; the
    /// previous contents are preserved in that case.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BlockError> {
        if bytes.len() > self.capacity {
            return Err(BlockError::AllocationFailure(format!(
                "{} bytes exceed buffer capacity of {}",
                bytes.len(),
                self.capacity
            )));
        }
        self.data.clear();
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Current contents
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Current content length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for ExecBuffer {
    fn drop(&mut self) {
        self.used.fetch_sub(self.capacity, Ordering::AcqRel);
    }
}
