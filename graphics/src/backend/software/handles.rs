//! Cross-adapter shared handles.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::memory::Allocation;
use crate::error::GraphicsError;

/// Instance-wide table of exported allocations.
#[derive(Debug)]
pub(crate) struct HandleTable {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, Arc<Allocation>>>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Export `allocation` under a fresh handle.
    pub(crate) fn export(self: &Arc<Self>, allocation: &Arc<Allocation>) -> SharedHandle {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(raw, Arc::clone(allocation));
        log::trace!("exported allocation {} as handle {raw}", allocation.id());
        SharedHandle {
            raw,
            table: Arc::clone(self),
        }
    }

    /// Resolve an open handle to the memory it refers to.
    pub(crate) fn open(&self, handle: &SharedHandle) -> Result<Arc<Allocation>, GraphicsError> {
        self.entries.lock().get(&handle.raw).cloned().ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("shared handle {} is closed", handle.raw))
        })
    }

    /// Number of handles not closed yet.
    pub(crate) fn open_count(&self) -> usize {
        self.entries.lock().len()
    }

    fn close(&self, raw: u64) {
        self.entries.lock().remove(&raw);
    }
}

/// An exported handle. Closed when dropped.
#[derive(Debug)]
pub(crate) struct SharedHandle {
    raw: u64,
    table: Arc<HandleTable>,
}

impl SharedHandle {
    #[cfg(test)]
    pub(crate) fn raw(&self) -> u64 {
        self.raw
    }
}

impl Drop for SharedHandle {
    fn drop(&mut self) {
        self.table.close(self.raw);
    }
}
