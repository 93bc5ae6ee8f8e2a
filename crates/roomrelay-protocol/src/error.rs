//! Error types for the protocol layer.
//!
//! Each crate in roomrelay defines its own error enum, so a
//! `ProtocolError` always means the problem is in the frame text itself,
//! not in networking or room bookkeeping.

/// Errors that can occur while decoding or encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An inbound frame did not match `verb,roomId,{json}`.
    ///
    /// Covers wrong field count, unknown verb, empty room id, invalid
    /// JSON, and payloads missing a required field.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Serializing an outbound payload failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame(reason.into())
    }
}
