use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::approval::Identity;
use crate::ws::handler::AppState;

/// Chat broadcast payload. `room` is carried on the wire but never used for
/// routing; delivery is always to all connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub username: String,
    pub room: String,
    pub body: String,
}

/// Join request payload: a username plus a PEM-encoded public key, passed
/// through verbatim. Any client-supplied timestamp field is ignored; the
/// workflow assigns its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRequest {
    pub username: String,
    pub pub_key: String,
}

/// Wire envelope, discriminated by the `type` field. A closed union over
/// the known frame shapes; unknown tags decode to `Unrecognized` instead of
/// failing, so unfamiliar message shapes never crash the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "chat_message")]
    Chat(ChatMessage),
    #[serde(rename = "join_request")]
    Join(JoinRequest),
    #[serde(other)]
    Unrecognized,
}

impl From<JoinRequest> for Identity {
    fn from(request: JoinRequest) -> Self {
        Identity {
            username: request.username,
            pub_key: request.pub_key,
        }
    }
}

/// Decode one inbound text frame and route it.
///
/// Error policy: a malformed frame is logged and dropped, an unrecognized
/// tag is ignored; in both cases the connection stays open and processing
/// continues with the next frame.
pub async fn dispatch_frame(state: &AppState, text: &str) {
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope::Chat(message)) => state.hub.broadcast(message),
        Ok(Envelope::Join(request)) => {
            let mut joins = state.joins.lock().await;
            joins.submit(request.into());
        }
        Ok(Envelope::Unrecognized) => {
            debug!("ignoring frame with unrecognized type");
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_chat_frame() {
        let frame = r#"{"type":"chat_message","username":"bob","room":"general","body":"hi"}"#;
        let envelope: Envelope = serde_json::from_str(frame).unwrap();
        assert_eq!(
            envelope,
            Envelope::Chat(ChatMessage {
                username: "bob".to_string(),
                room: "general".to_string(),
                body: "hi".to_string(),
            })
        );
    }

    #[test]
    fn decodes_join_frame_and_ignores_client_timestamp() {
        let frame = r#"{"type":"join_request","username":"bob","pub_key":"<PEM1>","timestamp":12345}"#;
        let envelope: Envelope = serde_json::from_str(frame).unwrap();
        assert_eq!(
            envelope,
            Envelope::Join(JoinRequest {
                username: "bob".to_string(),
                pub_key: "<PEM1>".to_string(),
            })
        );
    }

    #[test]
    fn unknown_tag_decodes_to_unrecognized() {
        let frame = r#"{"type":"presence_ping","username":"bob"}"#;
        let envelope: Envelope = serde_json::from_str(frame).unwrap();
        assert_eq!(envelope, Envelope::Unrecognized);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(serde_json::from_str::<Envelope>("{not json").is_err());
        // A known tag with missing fields is malformed, not unrecognized.
        assert!(serde_json::from_str::<Envelope>(r#"{"type":"chat_message"}"#).is_err());
    }

    #[test]
    fn chat_envelope_serializes_with_discriminator() {
        let envelope = Envelope::Chat(ChatMessage {
            username: "bob".to_string(),
            room: "general".to_string(),
            body: "hi".to_string(),
        });
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "chat_message",
                "username": "bob",
                "room": "general",
                "body": "hi",
            })
        );
    }
}
