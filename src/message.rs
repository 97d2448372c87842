use std::fmt;
use std::path::Path;
use std::str::Utf8Error;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::ClientError;

/// Ad-hoc end-of-message marker appended to JSON payloads.
pub const MESSAGE_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Login object sent by the structured-payload variant. All values come
/// from the caller; there are no built-in credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub locale: String,
    pub token: Uuid,
    pub platform_game_account_id: Uuid,
}

impl LoginRequest {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("cannot read login request {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ClientError::Config(format!("invalid login request {}: {e}", path.display()))
        })
    }
}

/// Bytes handed to the peer in one go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundPayload {
    /// UTF-8 text, no framing.
    Text(String),
    /// Arbitrary bytes, no framing.
    Raw(Bytes),
    /// Serialized JSON followed by [`MESSAGE_TERMINATOR`].
    Framed(Bytes),
}

impl OutboundPayload {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundPayload::Text(text.into())
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        OutboundPayload::Raw(bytes.into())
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, ClientError> {
        let mut buf = serde_json::to_vec(value)?;
        buf.extend_from_slice(MESSAGE_TERMINATOR);
        Ok(OutboundPayload::Framed(Bytes::from(buf)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            OutboundPayload::Text(text) => text.as_bytes(),
            OutboundPayload::Raw(bytes) | OutboundPayload::Framed(bytes) => bytes,
        }
    }

    #[inline] pub fn len(&self) -> usize       { self.as_bytes().len() }
    #[inline] pub fn is_empty(&self) -> bool   { self.as_bytes().is_empty() }
}

/// Decoded reply. Construction fails on invalid UTF-8 instead of
/// substituting replacement characters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundResponse {
    text: String,
}

impl InboundResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self, Utf8Error> {
        let text = std::str::from_utf8(bytes)?;
        Ok(Self { text: text.to_owned() })
    }

    #[inline] pub fn as_str(&self) -> &str     { &self.text }
    #[inline] pub fn as_bytes(&self) -> &[u8]  { self.text.as_bytes() }
    #[inline] pub fn len(&self) -> usize       { self.text.len() }
    #[inline] pub fn is_empty(&self) -> bool   { self.text.is_empty() }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for InboundResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
