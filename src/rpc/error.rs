//! Errors raised by the streaming RPC channel.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The connection could not be established at startup.
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// The shared connection is gone; no reconnect is attempted.
    #[error("RPC connection closed")]
    Disconnected,

    /// The remote side failed the logical stream.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("unknown route '{0}'")]
    UnknownRoute(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}
