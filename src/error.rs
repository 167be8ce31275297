//! Error types and error handling strategy for Fenceline.
//!
//! This module defines the core error type used throughout the service.
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Every failure is local, synchronous, and recoverable by the caller;
//!   none is fatal to the service itself
//! - No retries are performed internally; retry, where it makes sense, is
//!   the calling client's responsibility
//! - Errors are classified by recoverability so clients can make that call
//!
//! # Error Categories
//!
//! - **Resource**: allocation of a fence, wrapper, or handle token failed
//! - **Protocol**: the client presented a handle or command the service
//!   does not know
//! - **Transport**: the request/reply channel itself failed
//! - **Internal**: service bugs and invalid states

use core::fmt;
use std::sync::Arc;

use crate::handle::{ExportError, Handle};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Resource ===
    /// Allocation of a fence, its wrapper, or its handle token failed.
    Exhausted,

    // === Protocol ===
    /// A handle with no live registry entry was presented.
    NotFound,
    /// The command selector is not one the service implements.
    UnsupportedCommand,

    // === Transport ===
    /// The channel failed to deliver request input or reply output.
    TransportFault,

    // === Internal ===
    /// Internal service error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Exhausted => ErrorCategory::Resource,
            Self::NotFound | Self::UnsupportedCommand => ErrorCategory::Protocol,
            Self::TransportFault => ErrorCategory::Transport,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns the recoverability classification for this error kind.
    ///
    /// This helps a client decide whether to attempt the operation again.
    /// The service itself never retries.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            // Exhaustion clears when outstanding handles are released.
            Self::Exhausted => Recoverability::Transient,
            // A stale or forged handle never becomes valid again, and an
            // unknown command never becomes known.
            Self::NotFound | Self::UnsupportedCommand | Self::Internal => {
                Recoverability::Permanent
            }
            // Depends on why the channel faulted.
            Self::TransportFault => Recoverability::Unknown,
        }
    }

    /// Returns true if a client retry is typically worthwhile.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.recoverability(), Recoverability::Transient)
    }
}

/// Coarse classification of errors by the subsystem that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Allocation and capacity failures.
    Resource,
    /// Client-visible protocol failures (unknown handle or command).
    Protocol,
    /// Request/reply channel failures.
    Transport,
    /// Internal service errors.
    Internal,
}

/// Recoverability classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Temporary failure, safe to retry.
    Transient,
    /// Unrecoverable, do not retry.
    Permanent,
    /// Recoverability depends on context.
    Unknown,
}

/// The main error type for Fenceline operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    handle: Option<Handle>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            handle: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the handle involved in the failure, if any.
    #[must_use]
    pub const fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Attaches the handle involved in the failure.
    #[must_use]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a resource-exhaustion error.
    #[must_use]
    pub fn exhausted(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exhausted).with_message(detail)
    }

    /// Creates a not-found error for the given handle.
    #[must_use]
    pub fn not_found(handle: Handle) -> Self {
        Self::new(ErrorKind::NotFound)
            .with_handle(handle)
            .with_message(format!("no live fence for handle {handle}"))
    }

    /// Creates a transport fault.
    #[must_use]
    pub fn transport_fault(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportFault).with_message(detail)
    }

    /// Creates an unsupported-command error for the given selector.
    #[must_use]
    pub fn unsupported_command(selector: u32) -> Self {
        Self::new(ErrorKind::UnsupportedCommand)
            .with_message(format!("unknown command selector {selector:#06x}"))
    }

    /// Creates an internal error (service bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<ExportError> for Error {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Exhausted => Self::exhausted(err.to_string()).with_source(err),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach a context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for Fenceline operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn kind_maps_to_category() {
        assert_eq!(ErrorKind::Exhausted.category(), ErrorCategory::Resource);
        assert_eq!(ErrorKind::NotFound.category(), ErrorCategory::Protocol);
        assert_eq!(
            ErrorKind::UnsupportedCommand.category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            ErrorKind::TransportFault.category(),
            ErrorCategory::Transport
        );
        assert_eq!(ErrorKind::Internal.category(), ErrorCategory::Internal);
    }

    #[test]
    fn only_exhaustion_is_retryable() {
        assert!(ErrorKind::Exhausted.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::UnsupportedCommand.is_retryable());
        assert!(!ErrorKind::TransportFault.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::exhausted("no free handle tokens");
        let text = err.to_string();
        assert!(text.contains("Exhausted"));
        assert!(text.contains("no free handle tokens"));
    }

    #[test]
    fn not_found_carries_handle() {
        let handle = Handle::from_raw(42);
        let err = Error::not_found(handle);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.handle(), Some(handle));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn source_chain_is_preserved() {
        #[derive(Debug)]
        struct Underlying;

        impl fmt::Display for Underlying {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "underlying fault")
            }
        }

        impl std::error::Error for Underlying {}

        let err = Error::transport_fault("reply write failed").with_source(Underlying);
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "underlying fault");
    }

    #[test]
    fn result_ext_attaches_context() {
        fn fails() -> core::result::Result<(), Error> {
            Err(Error::new(ErrorKind::Internal))
        }

        let err = fails().context("while dispatching").unwrap_err();
        assert!(err.to_string().contains("while dispatching"));
    }
}
