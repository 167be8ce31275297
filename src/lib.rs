//! Fenceline: a minimal fence-handle synchronization service.
//!
//! # Overview
//!
//! Fenceline lets clients request opaque "fence" handles, pass them around
//! as descriptor-like tokens, and later signal one of those handles exactly
//! once to mark an associated asynchronous operation as complete. Waiters
//! observe completion through the fence object itself.
//!
//! # Core Guarantees
//!
//! - **At-most-once signaling**: a fence's UNSIGNALED→SIGNALED transition
//!   happens exactly once; racing signalers degrade to no-ops
//! - **No handle reuse races**: the exporter hands out a token again only
//!   after its wrapper has been closed
//! - **No dangling lookups**: a removed registry entry is gone; a stale
//!   handle yields `NotFound`, never a freed fence
//! - **Two-tier locking**: one coarse registry lock for structure, one
//!   private lock per fence for state; the registry lock is never held
//!   across a fence transition
//!
//! # Module Structure
//!
//! - [`fence`]: the one-shot completion primitive
//! - [`handle`]: handle export, the descriptor-table analog
//! - [`registry`]: the shared handle→fence map
//! - [`dispatch`]: the CREATE/SIGNAL protocol handler
//! - [`wire`]: request marshaling at the transport boundary
//! - [`config`]: service configuration
//! - [`error`]: error types
//! - [`test_utils`]: shared test helpers
//!
//! # Example
//!
//! ```
//! use fenceline::{FenceService, ServiceConfig};
//!
//! let service = FenceService::new(ServiceConfig::default());
//!
//! let handle = service.create().expect("allocate a fence");
//! let fence = service.resolve(handle).expect("fence is registered");
//! assert!(!fence.is_signaled());
//!
//! service.signal(handle).expect("first signal wins");
//! assert!(fence.is_signaled());
//! assert!(service.resolve(handle).is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fence;
pub mod handle;
pub mod registry;
pub mod test_utils;
pub mod wire;

// Re-exports for convenient access to core types
pub use config::ServiceConfig;
pub use dispatch::{FenceService, Reply, Request};
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, Result, ResultExt};
pub use fence::{AlreadySignaled, Fence, FenceState, Signaled};
pub use handle::{ExportError, Handle, HandleExporter};
pub use registry::FenceRegistry;
pub use wire::{WireError, CREATE_FENCE, SIGNAL_FENCE};
