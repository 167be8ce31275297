//! Request marshaling at the transport boundary.
//!
//! The service is driven through a single control call carrying a command
//! selector and an in/out byte buffer. This module decodes that call into
//! a [`Request`], runs it through the dispatcher, and encodes the
//! [`Reply`] back into the caller's buffer.
//!
//! Marshaling failures are transport concerns: they surface as
//! [`TransportFault`](crate::error::ErrorKind::TransportFault) (or
//! [`UnsupportedCommand`](crate::error::ErrorKind::UnsupportedCommand) for
//! an unknown selector) and never leave the registry inconsistent. The
//! registry mutation, when it happens, happens strictly before any attempt
//! to write the reply.

use thiserror::Error;

use crate::dispatch::{FenceService, Reply, Request};
use crate::error::{Error, ErrorKind, Result};
use crate::handle::Handle;

/// Command selector for CREATE.
pub const CREATE_FENCE: u32 = 0x1001;

/// Command selector for SIGNAL.
pub const SIGNAL_FENCE: u32 = 0x1002;

/// Handle tokens travel as little-endian u32.
const TOKEN_LEN: usize = 4;

/// Marshaling failures at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// The selector names no command the service implements.
    #[error("unknown command selector {0:#06x}")]
    UnknownCommand(u32),

    /// The request payload ended before the expected field.
    #[error("request payload truncated: need {need} bytes, got {got}")]
    Truncated {
        /// Bytes the command requires.
        need: usize,
        /// Bytes actually present.
        got: usize,
    },

    /// The request payload carried bytes past the expected field.
    #[error("request payload has {0} trailing bytes")]
    TrailingBytes(usize),

    /// The reply buffer cannot hold the encoded reply.
    #[error("reply buffer too small: need {need} bytes, got {got}")]
    ReplyTruncated {
        /// Bytes the reply requires.
        need: usize,
        /// Bytes available in the caller's buffer.
        got: usize,
    },
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        let kind = match err {
            WireError::UnknownCommand(_) => ErrorKind::UnsupportedCommand,
            WireError::Truncated { .. }
            | WireError::TrailingBytes(_)
            | WireError::ReplyTruncated { .. } => ErrorKind::TransportFault,
        };
        Self::new(kind).with_message(err.to_string()).with_source(err)
    }
}

/// Decodes a control call into a [`Request`].
///
/// CREATE takes no payload. SIGNAL takes exactly one little-endian u32
/// handle token.
///
/// # Errors
///
/// [`WireError::UnknownCommand`] for a selector the service does not
/// implement; [`WireError::Truncated`] / [`WireError::TrailingBytes`] when
/// the payload does not match the command's shape.
pub fn decode_request(selector: u32, payload: &[u8]) -> core::result::Result<Request, WireError> {
    match selector {
        CREATE_FENCE => {
            if payload.is_empty() {
                Ok(Request::Create)
            } else {
                Err(WireError::TrailingBytes(payload.len()))
            }
        }
        SIGNAL_FENCE => {
            if payload.len() < TOKEN_LEN {
                return Err(WireError::Truncated {
                    need: TOKEN_LEN,
                    got: payload.len(),
                });
            }
            if payload.len() > TOKEN_LEN {
                return Err(WireError::TrailingBytes(payload.len() - TOKEN_LEN));
            }
            let mut raw = [0u8; TOKEN_LEN];
            raw.copy_from_slice(payload);
            Ok(Request::Signal {
                handle: Handle::from_raw(u32::from_le_bytes(raw)),
            })
        }
        other => Err(WireError::UnknownCommand(other)),
    }
}

/// Encodes `reply` into `out`, returning the number of bytes written.
///
/// # Errors
///
/// [`WireError::ReplyTruncated`] when `out` is too small for the reply.
pub fn encode_reply(reply: &Reply, out: &mut [u8]) -> core::result::Result<usize, WireError> {
    match reply {
        Reply::Created { handle } => {
            if out.len() < TOKEN_LEN {
                return Err(WireError::ReplyTruncated {
                    need: TOKEN_LEN,
                    got: out.len(),
                });
            }
            out[..TOKEN_LEN].copy_from_slice(&handle.into_raw().to_le_bytes());
            Ok(TOKEN_LEN)
        }
        Reply::Signaled => Ok(0),
    }
}

/// Serves one control call: decode, dispatch, encode.
///
/// Returns the number of reply bytes written into `out`. When the reply
/// for a successful CREATE cannot be written back, the registry entry is
/// deliberately kept: a marshaling failure must not unwind a completed
/// registry mutation. The orphaned handle is logged so an operator (or the
/// client, via [`FenceService::abandon`]) can clean it up.
///
/// # Errors
///
/// Any dispatcher error, plus
/// [`TransportFault`](crate::error::ErrorKind::TransportFault) /
/// [`UnsupportedCommand`](crate::error::ErrorKind::UnsupportedCommand) for
/// marshaling failures.
pub fn serve(
    service: &FenceService,
    selector: u32,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize> {
    let request = match decode_request(selector, payload) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(selector, error = %err, "request rejected at wire boundary");
            return Err(Error::from(err));
        }
    };

    let reply = service.dispatch(request)?;

    match encode_reply(&reply, out) {
        Ok(written) => Ok(written),
        Err(err) => {
            if let Reply::Created { handle } = reply {
                tracing::warn!(
                    handle = %handle,
                    error = %err,
                    "created fence reply lost in transit; entry retained, abandon() is the cleanup path"
                );
            }
            Err(Error::from(err))
        }
    }
}
