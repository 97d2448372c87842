

pub mod client;
pub mod config;
pub mod message;
pub mod oneshot_log;

/* Re-exports */
pub use client::{ClientError, OneShotClient, Phase};
pub use config::{ClientConfig, ConnectionTarget, ReadMode, TlsTrustConfig, Transport, VerifyMode, DEFAULT_MAX_RESPONSE};
pub use message::{InboundResponse, LoginRequest, OutboundPayload, MESSAGE_TERMINATOR};
