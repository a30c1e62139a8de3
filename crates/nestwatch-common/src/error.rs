//! Common error types for Nestwatch.
//!
//! Connection-level failures (`Transport`, `Handshake`, `Protocol`) are
//! fatal to the current connection generation and recovered by the
//! reconnection supervisor; everything else is recovered closer to where
//! it occurs.

use thiserror::Error;

/// Result type alias using Nestwatch's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Nestwatch operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect/send/receive failure or connection closed by peer
    #[error("transport error: {0}")]
    Transport(String),

    /// Registration handshake not acknowledged
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Inbound message violated the signaling protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a transport error from any displayable type.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create a handshake error from any displayable type.
    pub fn handshake(msg: impl std::fmt::Display) -> Self {
        Self::Handshake(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }
}
