//! Error types for the transport layer.

use std::fmt;
use thinlink_crypto::CryptoError;
use thinlink_protocol::ProtocolError;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Error codes delivered to the application's error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorCode {
    /// No carrier is configured, or every carrier has been tried.
    NoConnectionData,
    /// The active carrier failed.
    LostConnection,
    /// The server asked the client to reconnect on another port.
    ReconnectRequired,
    /// The server asked the client to disconnect.
    DisconnectRequired,
    /// A queued message could not be framed or encrypted and was dropped.
    /// The carrier stays up.
    SendFailed,
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoConnectionData => "no connection data",
            Self::LostConnection => "lost connection",
            Self::ReconnectRequired => "reconnect required",
            Self::DisconnectRequired => "disconnect required",
            Self::SendFailed => "send failed",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Packet payload could not be encrypted or decrypted.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP round trip failed.
    #[error("http error: {0}")]
    Http(String),

    /// Response body violated the polling contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The carrier has no address configured.
    #[error("no connection data configured for {0}")]
    NoConnectionData(&'static str),

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The client's coordinator task has stopped.
    #[error("transport client closed")]
    Closed,
}

impl TransportError {
    /// Code reported to the application for this failure.
    pub fn code(&self) -> TransportErrorCode {
        match self {
            Self::NoConnectionData(_) => TransportErrorCode::NoConnectionData,
            _ => TransportErrorCode::LostConnection,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e.to_string())
        }
    }
}
