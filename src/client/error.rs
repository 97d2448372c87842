//! src/client/error.rs

use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::time::Duration;
use thiserror::Error;

/// Step of the exchange an error or timeout belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Handshake,
    Write,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connect => "connect",
            Phase::Handshake => "TLS handshake",
            Phase::Write => "write",
            Phase::Read => "read",
        };
        f.write_str(name)
    }
}

/// Everything that can end a one-shot exchange. Nothing here is retried.
#[derive(Debug, Error)]
pub enum ClientError {
    /* ───────────── Transport / Socket ───────────── */
    #[error("Connecting to {target} failed: {source}")]
    Connect { target: String, #[source] source: io::Error },

    #[error("TLS handshake with {target} failed: {source}")]
    TlsHandshake { target: String, #[source] source: io::Error },

    #[error("Writing to {target} failed: {source}")]
    Write { target: String, #[source] source: io::Error },

    #[error("Reading from {target} failed: {source}")]
    Read { target: String, #[source] source: io::Error },

    #[error("{phase} with {target} timed out after {after:?}")]
    Timeout { target: String, phase: Phase, after: Duration },

    /* ───────────── Codec ───────────── */
    #[error("Response from {target} is not valid UTF-8: {source}")]
    Decode { target: String, #[source] source: Utf8Error },

    #[error("Payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),

    /* ───────────── Setup ───────────── */
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Interrupted")]
    Interrupted,
}

impl ClientError {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ClientError::Connect { .. } => Some(Phase::Connect),
            ClientError::TlsHandshake { .. } => Some(Phase::Handshake),
            ClientError::Write { .. } => Some(Phase::Write),
            ClientError::Read { .. } | ClientError::Decode { .. } => Some(Phase::Read),
            ClientError::Timeout { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Process exit status for a failed invocation.
    pub fn exit_code(&self) -> u8 {
        match self {
            ClientError::Io(_) => 1,
            ClientError::Connect { .. } => 2,
            ClientError::TlsHandshake { .. } => 3,
            ClientError::Write { .. } => 4,
            ClientError::Read { .. } => 5,
            ClientError::Decode { .. } => 6,
            ClientError::Config(_) => 7,
            ClientError::Timeout { .. } => 8,
            ClientError::Payload(_) => 9,
            ClientError::Interrupted => 130,
        }
    }
}
