//! The two-operation protocol handler.
//!
//! [`FenceService`] composes the fence primitive, the handle exporter, and
//! the registry into the client-facing protocol:
//!
//! - **CREATE**: build a fence, export it, register it, hand the handle
//!   back.
//! - **SIGNAL(handle)**: resolve the handle through the registry, signal
//!   the fence, retire the registry entry.
//!
//! The service is stateless between calls except for its effect on the
//! registry. Construct one instance at service start and pass it by
//! reference to every caller; the registry must never be ambient global
//! state.
//!
//! # Lock ordering
//!
//! SIGNAL copies the fence reference out of the registry (registry lock
//! released) before the fence transition (fence lock), then reacquires the
//! registry lock for removal. Signal and removal are two separate
//! critical sections: a second SIGNAL racing in between finds either a
//! live entry (and re-signals harmlessly, the transition is idempotent) or
//! nothing (`NotFound`). Both removals are safe; removing an absent key is
//! a no-op.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::fence::Fence;
use crate::handle::{Handle, HandleExporter};
use crate::registry::FenceRegistry;

/// A decoded client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Create a fence and return its exported handle.
    Create,
    /// Signal the fence behind `handle` and retire it.
    Signal {
        /// The handle to signal.
        handle: Handle,
    },
}

/// A successful reply to a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// CREATE succeeded; the client now holds `handle`.
    Created {
        /// The freshly exported handle.
        handle: Handle,
    },
    /// SIGNAL succeeded.
    Signaled,
}

/// The fence lifecycle service.
///
/// # Example
///
/// ```
/// use fenceline::dispatch::FenceService;
///
/// let service = FenceService::with_defaults();
/// let handle = service.create().expect("create");
/// service.signal(handle).expect("signal");
/// assert!(service.signal(handle).is_err()); // handle already reaped
/// ```
#[derive(Debug)]
pub struct FenceService {
    registry: FenceRegistry,
    exporter: HandleExporter,
    driver_name: Arc<str>,
    timeline_name: Arc<str>,
}

impl FenceService {
    /// Creates a service from `config`. Values are normalized first.
    #[must_use]
    pub fn new(mut config: ServiceConfig) -> Self {
        config.normalize();
        Self {
            registry: FenceRegistry::new(),
            exporter: HandleExporter::with_capacity(config.max_live_handles),
            driver_name: Arc::from(config.driver_name.as_str()),
            timeline_name: Arc::from(config.timeline_name.as_str()),
        }
    }

    /// Creates a service with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ServiceConfig::default())
    }

    /// CREATE: builds an unsignaled fence, exports it, registers it.
    ///
    /// On export failure the fence is discarded; no partial state is
    /// retained. The registry entry is inserted only after a successful
    /// export, so a returned error never leaves an orphan.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Exhausted`](crate::error::ErrorKind::Exhausted) when no
    /// fence wrapper or handle token can be allocated.
    pub fn create(&self) -> Result<Handle> {
        let fence = Arc::new(Fence::with_names(
            Arc::clone(&self.driver_name),
            Arc::clone(&self.timeline_name),
        ));

        let handle = match self.exporter.export(Arc::clone(&fence)) {
            Ok(handle) => handle,
            Err(err) => {
                // `fence` is dropped with this frame; nothing was
                // registered yet.
                tracing::warn!(error = %err, "fence export failed");
                return Err(Error::from(err));
            }
        };

        self.registry.insert(handle, fence);
        tracing::info!(handle = %handle, "fence created");
        Ok(handle)
    }

    /// SIGNAL: transitions the fence behind `handle` and retires its
    /// registry entry.
    ///
    /// An already-signaled fence (a concurrent caller won the transition
    /// between our lookup and signal) degrades to success; the transition
    /// is idempotent. The wrapper held by the exporter stays open: it
    /// belongs to whatever external holder still has the handle.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) when the
    /// handle has no live registry entry (never created, already signaled
    /// and reaped, or garbage).
    pub fn signal(&self, handle: Handle) -> Result<()> {
        let Some(fence) = self.registry.lookup(handle) else {
            tracing::warn!(handle = %handle, "signal on unknown handle");
            return Err(Error::not_found(handle));
        };

        // Registry lock already released; only the fence lock is taken here.
        if fence.signal().is_err() {
            tracing::debug!(handle = %handle, "fence was already signaled");
        }

        let removed = self.registry.remove(handle);
        tracing::info!(handle = %handle, removed, "fence signaled");
        Ok(())
    }

    /// Retires a fence that will never be signaled.
    ///
    /// Removes the registry entry and closes the exporter's wrapper
    /// without touching fence state; any external holder that already
    /// resolved the fence keeps its share, and the fence simply never
    /// completes. This is the cleanup path for clients abandoning a
    /// handle, including one whose CREATE reply was lost in transit.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound) when the
    /// handle has no live registry entry.
    pub fn abandon(&self, handle: Handle) -> Result<()> {
        if !self.registry.remove(handle) {
            tracing::warn!(handle = %handle, "abandon on unknown handle");
            return Err(Error::not_found(handle));
        }
        self.exporter.close(handle);
        tracing::info!(handle = %handle, "fence abandoned");
        Ok(())
    }

    /// Dispatches a decoded request.
    pub fn dispatch(&self, request: Request) -> Result<Reply> {
        match request {
            Request::Create => self.create().map(|handle| Reply::Created { handle }),
            Request::Signal { handle } => self.signal(handle).map(|()| Reply::Signaled),
        }
    }

    /// Resolves `handle` to its registered fence without mutating anything.
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<Arc<Fence>> {
        self.registry.lookup(handle)
    }

    /// The registry owned by this service.
    #[must_use]
    pub fn registry(&self) -> &FenceRegistry {
        &self.registry
    }

    /// The handle exporter owned by this service.
    #[must_use]
    pub fn exporter(&self) -> &HandleExporter {
        &self.exporter
    }
}

impl Default for FenceService {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fence::FenceState;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn create_registers_and_exports() {
        init_test("create_registers_and_exports");
        let service = FenceService::with_defaults();

        let handle = service.create().expect("create");
        assert_eq!(service.registry().len(), 1);
        assert_eq!(service.exporter().live_handles(), 1);

        let fence = service.resolve(handle).expect("resolve");
        let state = fence.state();
        crate::assert_with_log!(
            state == FenceState::Unsignaled,
            "created fence unsignaled",
            FenceState::Unsignaled,
            state
        );
        crate::test_complete!("create_registers_and_exports");
    }

    #[test]
    fn signal_completes_and_retires() {
        init_test("signal_completes_and_retires");
        let service = FenceService::with_defaults();
        let handle = service.create().expect("create");

        // Keep an external share to observe the fence after retirement.
        let fence = service.resolve(handle).expect("resolve");

        service.signal(handle).expect("signal");
        assert!(fence.is_signaled());
        assert!(service.resolve(handle).is_none());
        assert!(service.registry().is_empty());
        crate::test_complete!("signal_completes_and_retires");
    }

    #[test]
    fn second_signal_reports_not_found() {
        init_test("second_signal_reports_not_found");
        let service = FenceService::with_defaults();
        let handle = service.create().expect("create");

        service.signal(handle).expect("first signal");
        let err = service.signal(handle).unwrap_err();
        crate::assert_with_log!(
            err.kind() == ErrorKind::NotFound,
            "reaped handle is NotFound",
            ErrorKind::NotFound,
            err.kind()
        );
        crate::test_complete!("second_signal_reports_not_found");
    }

    #[test]
    fn signal_unknown_handle_mutates_nothing() {
        init_test("signal_unknown_handle_mutates_nothing");
        let service = FenceService::with_defaults();
        let live = service.create().expect("create");

        let err = service.signal(Handle::from_raw(0xDEAD)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // The unrelated live fence is untouched.
        assert_eq!(service.registry().len(), 1);
        let fence = service.resolve(live).expect("resolve");
        assert!(!fence.is_signaled());
        crate::test_complete!("signal_unknown_handle_mutates_nothing");
    }

    #[test]
    fn create_surfaces_exhaustion_without_partial_state() {
        init_test("create_surfaces_exhaustion_without_partial_state");
        let service = FenceService::new(ServiceConfig::default().with_max_live_handles(1));

        service.create().expect("first create");
        let err = service.create().unwrap_err();
        crate::assert_with_log!(
            err.kind() == ErrorKind::Exhausted,
            "exhausted",
            ErrorKind::Exhausted,
            err.kind()
        );
        assert!(err.is_retryable());

        // Only the first fence exists anywhere.
        assert_eq!(service.registry().len(), 1);
        assert_eq!(service.exporter().live_handles(), 1);
        crate::test_complete!("create_surfaces_exhaustion_without_partial_state");
    }

    #[test]
    fn abandon_retires_without_signaling() {
        init_test("abandon_retires_without_signaling");
        let service = FenceService::with_defaults();
        let handle = service.create().expect("create");
        let fence = service.resolve(handle).expect("resolve");

        service.abandon(handle).expect("abandon");
        assert!(service.resolve(handle).is_none());
        assert_eq!(service.exporter().live_handles(), 0);
        // The fence never completed.
        assert!(!fence.is_signaled());

        let err = service.abandon(handle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        crate::test_complete!("abandon_retires_without_signaling");
    }

    #[test]
    fn abandon_frees_capacity() {
        init_test("abandon_frees_capacity");
        let service = FenceService::new(ServiceConfig::default().with_max_live_handles(1));

        let handle = service.create().expect("create");
        assert!(service.create().is_err());

        service.abandon(handle).expect("abandon");
        service.create().expect("capacity reclaimed");
        crate::test_complete!("abandon_frees_capacity");
    }

    #[test]
    fn dispatch_routes_both_operations() {
        init_test("dispatch_routes_both_operations");
        let service = FenceService::with_defaults();

        let Reply::Created { handle } = service.dispatch(Request::Create).expect("create") else {
            unreachable!("CREATE must reply Created");
        };

        let reply = service.dispatch(Request::Signal { handle }).expect("signal");
        crate::assert_with_log!(
            reply == Reply::Signaled,
            "signal reply",
            Reply::Signaled,
            reply
        );
        crate::test_complete!("dispatch_routes_both_operations");
    }

    #[test]
    fn created_fences_carry_configured_names() {
        init_test("created_fences_carry_configured_names");
        let service = FenceService::new(
            ServiceConfig::default()
                .with_driver_name("render-node")
                .with_timeline_name("present-queue"),
        );

        let handle = service.create().expect("create");
        let fence = service.resolve(handle).expect("resolve");
        assert_eq!(fence.driver_name(), "render-node");
        assert_eq!(fence.timeline_name(), "present-queue");
        crate::test_complete!("created_fences_carry_configured_names");
    }
}
