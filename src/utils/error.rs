//! Error types for the server side of the broker.
//!
//! Framing and grammar errors live in [`crate::protocol`]. The types here
//! describe why a connection ended and why the server failed to start.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Why a connection handler stopped. A clean end of stream is not an error.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no request received within {0:?}")]
    IdleTimeout(Duration),
}

impl ConnectionError {
    /// `true` for framing problems attributable to the peer, as opposed to
    /// timeouts or transport failures.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ConnectionError::Protocol(
                ProtocolError::InvalidLength(_)
                    | ProtocolError::FrameTooLarge { .. }
                    | ProtocolError::Truncated { .. }
                    | ProtocolError::InvalidUtf8(_)
            )
        )
    }
}

/// Failures that prevent the server from starting or keep it from accepting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}
