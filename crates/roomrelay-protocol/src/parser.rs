//! Parser for inbound `verb,roomId,{json}` frames.
//!
//! Only the first two commas are separators. The JSON payload routinely
//! contains commas of its own, so everything after the second comma is
//! handed to `serde_json` untouched.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{Command, ProtocolError, ProtocolVersion, RoomId, UserRef, Verb};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionedPayload {
    username: String,
    user_id: String,
    version: ProtocolVersion,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityPayload {
    username: String,
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentPayload {
    username: String,
    user_id: String,
    content: String,
}

fn user_ref(user_id: String, username: String) -> UserRef {
    UserRef { user_id, username }
}

/// Decodes one text frame into a [`Command`].
///
/// # Errors
/// Returns [`ProtocolError::MalformedFrame`] when the frame has fewer than
/// three fields, names an unknown verb, has an empty room id, carries a
/// payload that is not a JSON object, or misses a field the verb requires.
pub fn parse(frame: &str) -> Result<Command, ProtocolError> {
    let mut fields = frame.splitn(3, ',');
    let (Some(verb), Some(room_id), Some(payload)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(ProtocolError::malformed(
            "expected `verb,roomId,{json}`",
        ));
    };

    let verb: Verb = verb.trim().parse()?;
    let room_id = parse_room_id(room_id)?;

    let command = match verb {
        Verb::RoomHello => {
            let p: VersionedPayload = parse_payload(payload)?;
            Command::Hello {
                room_id,
                user: user_ref(p.user_id, p.username),
                version: p.version,
            }
        }
        Verb::RoomJoin => {
            let p: VersionedPayload = parse_payload(payload)?;
            Command::Join {
                room_id,
                user: user_ref(p.user_id, p.username),
                version: p.version,
            }
        }
        Verb::RoomGoodbye => {
            let p: IdentityPayload = parse_payload(payload)?;
            Command::Goodbye {
                room_id,
                user: user_ref(p.user_id, p.username),
            }
        }
        Verb::RoomPart => {
            let p: IdentityPayload = parse_payload(payload)?;
            Command::Part {
                room_id,
                user: user_ref(p.user_id, p.username),
            }
        }
        Verb::Room => {
            let p: ContentPayload = parse_payload(payload)?;
            Command::Message {
                room_id,
                user: user_ref(p.user_id, p.username),
                content: p.content,
            }
        }
    };

    Ok(command)
}

fn parse_room_id(raw: &str) -> Result<RoomId, ProtocolError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ProtocolError::malformed("room id is empty"));
    }
    // A frame like `roomHello,{"a":1,"b":2}` splits inside the JSON; the
    // brace in the "room id" gives that away.
    if id.contains(['{', '}', '"']) {
        return Err(ProtocolError::malformed(format!(
            "invalid room id `{id}`"
        )));
    }
    Ok(RoomId::new(id))
}

fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| ProtocolError::malformed(format!("invalid json: {e}")))?;
    // serde would happily read a struct out of a JSON array.
    if !value.is_object() {
        return Err(ProtocolError::malformed("payload must be a JSON object"));
    }
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::malformed(format!("invalid payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str) -> UserRef {
        UserRef {
            user_id: id.into(),
            username: name.into(),
        }
    }

    fn assert_malformed(frame: &str) {
        match parse(frame) {
            Err(ProtocolError::MalformedFrame(_)) => {}
            other => panic!("expected MalformedFrame for {frame:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_hello() {
        let cmd = parse(r#"roomHello,lobby,{"username":"u1","userId":"1","version":2}"#)
            .unwrap();
        assert_eq!(
            cmd,
            Command::Hello {
                room_id: RoomId::new("lobby"),
                user: user("1", "u1"),
                version: ProtocolVersion::V2,
            }
        );
    }

    #[test]
    fn test_parse_join_version_one() {
        let cmd = parse(r#"roomJoin,lobby,{"username":"u1","userId":"1","version":1}"#)
            .unwrap();
        assert!(matches!(
            cmd,
            Command::Join { version: ProtocolVersion::V1, .. }
        ));
    }

    #[test]
    fn test_parse_goodbye_and_part() {
        let bye = parse(r#"roomGoodbye,lobby,{"username":"u1","userId":"1"}"#).unwrap();
        assert_eq!(bye.verb(), Verb::RoomGoodbye);
        let part = parse(r#"roomPart,lobby,{"username":"u1","userId":"1"}"#).unwrap();
        assert_eq!(
            part,
            Command::Part {
                room_id: RoomId::new("lobby"),
                user: user("1", "u1"),
            }
        );
    }

    #[test]
    fn test_parse_message_keeps_commas_in_content() {
        let cmd = parse(
            r#"room,lobby,{"username":"u1","userId":"1","content":"a, b, and c"}"#,
        )
        .unwrap();
        match cmd {
            Command::Message { content, .. } => assert_eq!(content, "a, b, and c"),
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_trims_room_id_and_ignores_extra_fields() {
        let cmd = parse(
            r#"roomPart, cellar ,{"type":"roomPart","username":"u1","userId":"1"}"#,
        )
        .unwrap();
        assert_eq!(cmd.room_id().as_str(), "cellar");
    }

    #[test]
    fn test_wrong_field_count() {
        assert_malformed("roomHello");
        assert_malformed("roomHello,lobby");
        assert_malformed("");
    }

    #[test]
    fn test_unknown_verb() {
        assert_malformed(r#"roomShout,lobby,{"username":"u1","userId":"1"}"#);
    }

    #[test]
    fn test_empty_room_id() {
        assert_malformed(r#"roomPart,,{"username":"u1","userId":"1"}"#);
        assert_malformed(r#"roomPart,  ,{"username":"u1","userId":"1"}"#);
    }

    #[test]
    fn test_missing_room_id_splits_inside_json() {
        assert_malformed(r#"roomPart,{"username":"u1","userId":"1"}"#);
    }

    #[test]
    fn test_invalid_json() {
        assert_malformed(r#"roomPart,lobby,{"username":"u1""#);
        assert_malformed("roomPart,lobby,not json");
    }

    #[test]
    fn test_payload_must_be_object() {
        assert_malformed(r#"roomPart,lobby,["u1","1"]"#);
    }

    #[test]
    fn test_missing_required_fields() {
        assert_malformed(r#"roomHello,lobby,{"username":"u1","userId":"1"}"#);
        assert_malformed(r#"roomJoin,lobby,{"userId":"1","version":2}"#);
        assert_malformed(r#"roomPart,lobby,{"username":"u1"}"#);
        assert_malformed(r#"room,lobby,{"username":"u1","userId":"1"}"#);
    }

    #[test]
    fn test_unsupported_version() {
        assert_malformed(r#"roomHello,lobby,{"username":"u1","userId":"1","version":3}"#);
    }
}
