//! Error types for the bridge
//!
//! Backend plumbing (HTTP clients, provider construction, config loading) uses
//! `eyre` for ergonomic error handling with context. Everything that crosses the
//! bridge boundary is flattened into [`BridgeError`], whose variants decide how
//! a failure is reported: as a call rejection to the peer, or locally.

use std::fmt;
use std::time::Duration;

pub use eyre::{eyre, Context, Report};

/// Result alias for bridge operations
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Error taxonomy of the bridge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Session handshake or transport failure; the session stays unestablished
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or out-of-sequence peer message
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The signer refused or failed the operation
    #[error("signing error: {0}")]
    Signing(String),

    /// Malformed transaction or message parameters from the peer
    #[error("encoding error: {0}")]
    Encoding(String),

    /// RPC failure while resolving nonce, gas price or broadcasting
    #[error("network error: {0}")]
    Network(String),

    /// Operation attempted outside its valid state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A signer or network call did not finish in time
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl BridgeError {
    pub fn connection(err: impl fmt::Display) -> Self {
        Self::Connection(format!("{err:#}"))
    }

    pub fn protocol(err: impl fmt::Display) -> Self {
        Self::Protocol(format!("{err:#}"))
    }

    pub fn signing(err: impl fmt::Display) -> Self {
        Self::Signing(format!("{err:#}"))
    }

    pub fn encoding(err: impl fmt::Display) -> Self {
        Self::Encoding(format!("{err:#}"))
    }

    pub fn network(err: impl fmt::Display) -> Self {
        Self::Network(format!("{err:#}"))
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
