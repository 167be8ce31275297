//! The shared handle→fence registry.
//!
//! One [`FenceRegistry`] exists per service, constructed at service start
//! and shared by every concurrent CREATE/SIGNAL caller. It is the only
//! piece of shared mutable state in the core.
//!
//! # Locking
//!
//! All structural operations (insert, the scan during lookup, remove) run
//! under one coarse mutex, distinct from every fence's own lock. The
//! registry lock is never held across a fence-state mutation: [`lookup`]
//! clones the shared fence reference out and releases the lock before the
//! caller touches the fence. Entries are kept in a plain vector and found
//! by linear scan; at this scale correctness wins over throughput.
//!
//! [`lookup`]: FenceRegistry::lookup

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use crate::fence::Fence;
use crate::handle::Handle;

/// One registered fence, keyed by its exported handle.
#[derive(Debug)]
struct RegistryEntry {
    handle: Handle,
    fence: Arc<Fence>,
}

/// Concurrent mapping from exported handle to fence.
///
/// The registry holds one ownership share of each registered fence;
/// [`remove`](FenceRegistry::remove) releases it.
#[derive(Debug, Default)]
pub struct FenceRegistry {
    entries: StdMutex<Vec<RegistryEntry>>,
}

impl FenceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(Vec::new()),
        }
    }

    /// Adds an entry for `handle`.
    ///
    /// The exporter guarantees fresh tokens, so a duplicate handle cannot
    /// occur in correct operation. If one does, the new fence replaces the
    /// old (last-write-wins) rather than producing two entries for one key.
    pub fn insert(&self, handle: Handle, fence: Arc<Fence>) {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.iter_mut().find(|e| e.handle == handle) {
            entry.fence = fence;
        } else {
            entries.push(RegistryEntry { handle, fence });
        }
        drop(entries);
        tracing::debug!(handle = %handle, "registry entry added");
    }

    /// Returns the fence registered under `handle`, if any.
    ///
    /// Read-only; the entry stays. The returned reference is cloned out
    /// under the registry lock, which is released before this returns, so
    /// the caller never mutates fence state while holding it.
    #[must_use]
    pub fn lookup(&self, handle: Handle) -> Option<Arc<Fence>> {
        let entries = self.lock_entries();
        entries
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| Arc::clone(&e.fence))
    }

    /// Removes the entry for `handle`, releasing the registry's ownership
    /// share. Returns false (no-op) if no entry exists.
    pub fn remove(&self, handle: Handle) -> bool {
        let mut entries = self.lock_entries();
        if let Some(index) = entries.iter().position(|e| e.handle == handle) {
            entries.swap_remove(index);
            drop(entries);
            tracing::debug!(handle = %handle, "registry entry removed");
            true
        } else {
            false
        }
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Returns true if no entries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<RegistryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
