use super::{ConnectionId, RelayError, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Events a participant sends over its channel.
///
/// Wire form is `{"event": "<name>", "data": {...}}`. Payload blobs (`offer`,
/// `ans`, `candidate`) are carried as raw JSON and never inspected. Any
/// sender identity a client puts into `data` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "room:join")]
    JoinRoom {
        #[serde(default)]
        email: Option<String>,
        room: RoomId,
    },
    #[serde(rename = "room:leave")]
    LeaveRoom(LeaveRequest),
    #[serde(rename = "user:call")]
    Call { to: ConnectionId, offer: Value },
    #[serde(rename = "call:accepted")]
    Answer { to: ConnectionId, ans: Value },
    #[serde(rename = "ice:candidate")]
    Candidate { to: ConnectionId, candidate: Value },
}

/// Body of `room:leave`. Carries nothing; `{}`, `null` and an absent
/// `data` field are all accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Map<String, Value>>")]
pub struct LeaveRequest {}

impl From<Option<Map<String, Value>>> for LeaveRequest {
    fn from(_: Option<Map<String, Value>>) -> Self {
        LeaveRequest {}
    }
}

impl ClientEvent {
    /// Parse and validate a text frame. Nothing that fails here may reach
    /// shared state.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let event: ClientEvent = serde_json::from_str(text).map_err(RelayError::malformed)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        match self {
            ClientEvent::JoinRoom { room, .. } if room.trim().is_empty() => {
                Err(RelayError::malformed("room must not be empty"))
            }
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "room:join",
            ClientEvent::LeaveRoom(_) => "room:leave",
            ClientEvent::Call { .. } => "user:call",
            ClientEvent::Answer { .. } => "call:accepted",
            ClientEvent::Candidate { .. } => "ice:candidate",
        }
    }
}

/// Events the relay delivers to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// First frame on every channel, tells the client its own identifier
    #[serde(rename = "connected")]
    Connected { id: ConnectionId },
    #[serde(rename = "room:join")]
    RoomJoined {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        room: RoomId,
    },
    #[serde(rename = "user:joined")]
    UserJoined {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        id: ConnectionId,
    },
    #[serde(rename = "user:left")]
    UserLeft {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        id: ConnectionId,
    },
    #[serde(rename = "incoming:call")]
    IncomingCall { from: ConnectionId, offer: Value },
    #[serde(rename = "call:accepted")]
    CallAccepted { from: ConnectionId, ans: Value },
    #[serde(rename = "ice:candidate")]
    Candidate {
        from: ConnectionId,
        candidate: Value,
    },
    #[serde(rename = "target:unreachable")]
    TargetUnreachable { to: ConnectionId },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::RoomJoined { .. } => "room:join",
            ServerEvent::UserJoined { .. } => "user:joined",
            ServerEvent::UserLeft { .. } => "user:left",
            ServerEvent::IncomingCall { .. } => "incoming:call",
            ServerEvent::CallAccepted { .. } => "call:accepted",
            ServerEvent::Candidate { .. } => "ice:candidate",
            ServerEvent::TargetUnreachable { .. } => "target:unreachable",
        }
    }

    pub fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(RelayError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let event = ClientEvent::parse(r#"{"event":"room:join","data":{"email":"a@x","room":"r1"}}"#)
            .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                email: Some("a@x".to_string()),
                room: "r1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_join_without_label() {
        let event = ClientEvent::parse(r#"{"event":"room:join","data":{"room":"r1"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                email: None,
                room: "r1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_leave() {
        for text in [
            r#"{"event":"room:leave"}"#,
            r#"{"event":"room:leave","data":null}"#,
            r#"{"event":"room:leave","data":{}}"#,
            r#"{"event":"room:leave","data":{"room":"r1"}}"#,
        ] {
            let event = ClientEvent::parse(text).unwrap();
            assert_eq!(event, ClientEvent::LeaveRoom(LeaveRequest::default()), "{text}");
        }
    }

    #[test]
    fn test_leave_serializes_with_empty_body() {
        let text = serde_json::to_string(&ClientEvent::LeaveRoom(LeaveRequest::default())).unwrap();
        assert_eq!(text, r#"{"event":"room:leave","data":{}}"#);
    }

    #[test]
    fn test_client_supplied_from_is_ignored() {
        let text = json!({
            "event": "user:call",
            "data": {
                "to": "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8",
                "from": "00000000-0000-0000-0000-000000000001",
                "offer": {"sdp": "O1"}
            }
        })
        .to_string();
        let event = ClientEvent::parse(&text).unwrap();
        assert_eq!(
            event,
            ClientEvent::Call {
                to: ConnectionId::parse_str("a1a2a3a4b1b2c1c2d1d2d3d4d5d6d7d8").unwrap(),
                offer: json!({"sdp": "O1"}),
            }
        );
    }

    #[test]
    fn test_missing_target_is_malformed() {
        let result = ClientEvent::parse(r#"{"event":"user:call","data":{"offer":{"sdp":"O1"}}}"#);
        assert!(matches!(result, Err(RelayError::MalformedPayload(_))));
    }

    #[test]
    fn test_invalid_target_is_malformed() {
        let result =
            ClientEvent::parse(r#"{"event":"call:accepted","data":{"to":"nobody","ans":{}}}"#);
        assert!(matches!(result, Err(RelayError::MalformedPayload(_))));
    }

    #[test]
    fn test_empty_room_is_malformed() {
        let result = ClientEvent::parse(r#"{"event":"room:join","data":{"room":"  "}}"#);
        assert!(matches!(result, Err(RelayError::MalformedPayload(_))));
    }

    #[test]
    fn test_unknown_event_is_malformed() {
        let result = ClientEvent::parse(r#"{"event":"user:kick","data":{}}"#);
        assert!(matches!(result, Err(RelayError::MalformedPayload(_))));
    }

    #[test]
    fn test_serialize_incoming_call() {
        let event = ServerEvent::IncomingCall {
            from: ConnectionId::parse_str("a1a2a3a4b1b2c1c2d1d2d3d4d5d6d7d8").unwrap(),
            offer: json!({"sdp": "O1"}),
        };
        assert_eq!(
            event.to_json().unwrap(),
            r#"{"event":"incoming:call","data":{"from":"a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8","offer":{"sdp":"O1"}}}"#
        );
    }

    #[test]
    fn test_serialize_user_joined_omits_missing_label() {
        let event = ServerEvent::UserJoined {
            email: None,
            id: ConnectionId::nil(),
        };
        assert_eq!(
            event.to_json().unwrap(),
            r#"{"event":"user:joined","data":{"id":"00000000-0000-0000-0000-000000000000"}}"#
        );
    }
}
