//! Codec trait and the text codec used on the wire.
//!
//! A codec converts between raw frame text and typed values. The relay
//! core only talks to the [`Codec`] trait, so a different framing (for
//! example a JSON envelope instead of comma-separated fields) can be
//! swapped in without touching the session or room layers.

use crate::{Command, Outbound, ProtocolError};

/// Decodes inbound frames and encodes outbound ones.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Decodes one inbound text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedFrame`] if the text does not
    /// follow the grammar.
    fn decode(&self, frame: &str) -> Result<Command, ProtocolError>;

    /// Encodes one outbound frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode(&self, msg: &Outbound) -> Result<String, ProtocolError>;
}

/// The `verb,roomId,{json}` codec.
///
/// ```rust
/// use roomrelay_protocol::{Codec, Command, TextCodec};
///
/// let codec = TextCodec;
/// let cmd = codec
///     .decode(r#"roomJoin,lobby,{"username":"u1","userId":"1","version":2}"#)
///     .unwrap();
/// assert!(matches!(cmd, Command::Join { .. }));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn decode(&self, frame: &str) -> Result<Command, ProtocolError> {
        crate::parse(frame)
    }

    fn encode(&self, msg: &Outbound) -> Result<String, ProtocolError> {
        msg.encode()
    }
}
