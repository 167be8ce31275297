//! Handle export: wrapping fences in externally-presentable tokens.
//!
//! The [`HandleExporter`] plays the role a descriptor table plays for file
//! handles. [`HandleExporter::export`] builds a wrapper object around a
//! fence (the externally held side of the fence) and binds it to a fresh
//! process-unique [`Handle`] token. The wrapper keeps its own ownership
//! share of the fence; the token stays reserved for as long as the wrapper
//! lives and is retired to a free pool by [`HandleExporter::close`].
//!
//! The exporter is the single authority on token freshness: a token handed
//! out by `export` is never handed out again while its wrapper is live.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use thiserror::Error;

use crate::fence::Fence;

/// An opaque token referring to an exported fence.
///
/// Tokens are nonzero, process-unique integers. Their numeric value carries
/// no meaning beyond identity; clients hold them and present them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Builds a handle from its raw token value, as received off the wire.
    #[must_use]
    pub const fn from_raw(token: u32) -> Self {
        Self(token)
    }

    /// Returns the raw token value for marshaling.
    #[must_use]
    pub const fn into_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a fence cannot be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExportError {
    /// No fresh handle token or wrapper slot could be allocated.
    #[error("handle space exhausted")]
    Exhausted,
}

/// The externally held side of an exported fence.
///
/// Holds one ownership share of the fence, so the fence outlives its
/// registry entry for as long as any external holder keeps the handle open.
#[derive(Debug)]
struct SyncWrapper {
    fence: Arc<Fence>,
}

impl SyncWrapper {
    fn new(fence: Arc<Fence>) -> Self {
        Self { fence }
    }
}

/// Allocates fresh handle tokens and owns the wrapper table.
#[derive(Debug)]
pub struct HandleExporter {
    inner: StdMutex<ExporterShared>,
}

#[derive(Debug)]
struct ExporterShared {
    /// Next never-used token. Tokens start at 1; 0 is never handed out.
    next_token: u32,
    /// Tokens retired by `close`, available for reuse.
    free_tokens: Vec<u32>,
    /// Live wrappers by token.
    wrappers: HashMap<u32, SyncWrapper>,
    /// Maximum number of simultaneously live wrappers.
    capacity: usize,
}

impl HandleExporter {
    /// Creates an exporter that allows at most `capacity` live handles.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: StdMutex::new(ExporterShared {
                next_token: 1,
                free_tokens: Vec::new(),
                wrappers: HashMap::new(),
                capacity,
            }),
        }
    }

    /// Wraps `fence` and binds it to a fresh token.
    ///
    /// The wrapper is built before the token is allocated; if no token can
    /// be had, the wrapper (and its ownership share of the fence) is
    /// released before returning, leaking nothing.
    ///
    /// # Errors
    ///
    /// [`ExportError::Exhausted`] when the wrapper table is at capacity or
    /// the token space is used up.
    pub fn export(&self, fence: Arc<Fence>) -> Result<Handle, ExportError> {
        let wrapper = SyncWrapper::new(fence);

        let mut shared = self.lock_shared();
        if shared.wrappers.len() >= shared.capacity {
            // `wrapper` dropped here, releasing its fence share.
            return Err(ExportError::Exhausted);
        }

        let token = match shared.free_tokens.pop() {
            Some(token) => token,
            None => {
                let token = shared.next_token;
                match token.checked_add(1) {
                    Some(next) => shared.next_token = next,
                    None => return Err(ExportError::Exhausted),
                }
                token
            }
        };

        shared.wrappers.insert(token, wrapper);
        drop(shared);

        tracing::debug!(handle = token, "fence exported");
        Ok(Handle(token))
    }

    /// Resolves a token back to its fence, if the wrapper is still live.
    ///
    /// This is the resolution path an external holder uses to reach the
    /// fence it is waiting on; it hands out a fresh ownership share.
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<Arc<Fence>> {
        let shared = self.lock_shared();
        shared
            .wrappers
            .get(&handle.into_raw())
            .map(|wrapper| Arc::clone(&wrapper.fence))
    }

    /// Drops the wrapper for `handle` and retires its token.
    ///
    /// Models the external holder closing its descriptor. Returns false if
    /// the handle has no live wrapper. The retired token becomes available
    /// for reuse; nothing that still resolved the fence is affected, since
    /// resolution hands out independent ownership shares.
    pub fn close(&self, handle: Handle) -> bool {
        let token = handle.into_raw();
        let mut shared = self.lock_shared();
        if shared.wrappers.remove(&token).is_some() {
            shared.free_tokens.push(token);
            drop(shared);
            tracing::debug!(handle = token, "handle closed");
            true
        } else {
            false
        }
    }

    /// Returns the number of live wrappers.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.lock_shared().wrappers.len()
    }

    fn lock_shared(&self) -> MutexGuard<'_, ExporterShared> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
