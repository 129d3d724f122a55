//! Wire messages exchanged with the whiteboard server.
//!
//! Both directions are JSON objects tagged by `type`. Commands carry no
//! origin; the server stamps it on the events it broadcasts back.

use crate::element::{Element, ElementDraft, ElementId, ParticipantId};
use crate::history::MovePair;
use crate::ongoing::{ActionKind, ActionPayload};
use crate::query::{QueryKind, QueryMode};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create elements; the server assigns ids
    Add {
        elements: Vec<ElementDraft>,
        #[serde(default)]
        undo: bool,
        /// Select the created elements once confirmed
        #[serde(default)]
        select: bool,
    },
    /// Delete elements by id
    Delete {
        ids: Vec<ElementId>,
        #[serde(default)]
        undo: bool,
    },
    /// Move elements; `offset` is subtracted from their geometry
    Move {
        ids: Vec<ElementId>,
        offset: Vec2,
        #[serde(default)]
        undo: bool,
    },
    /// Remove every element
    Clear,
    /// Ask for elements near a query path
    Query {
        kind: QueryKind,
        path: Vec<Point>,
        padding: f64,
        #[serde(default)]
        mode: QueryMode,
    },
    /// Share the progress of a local gesture
    Ongoing {
        kind: ActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<ActionPayload>,
    },
}

/// Events received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Our own participant id
    Identify { id: ParticipantId },
    /// Everyone connected when we joined
    AllParticipants { ids: Vec<ParticipantId> },
    ParticipantJoined { id: ParticipantId },
    ParticipantLeft { id: ParticipantId },
    /// Full element table, sent on connect
    AllElements { elements: Vec<Element> },
    Added {
        origin: ParticipantId,
        elements: Vec<Element>,
        #[serde(default)]
        undo: bool,
        #[serde(default)]
        select: bool,
    },
    Deleted {
        origin: ParticipantId,
        ids: Vec<ElementId>,
        #[serde(default)]
        undo: bool,
    },
    Moved {
        origin: ParticipantId,
        pairs: Vec<MovePair>,
        offset: Vec2,
        #[serde(default)]
        undo: bool,
    },
    Cleared {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<ParticipantId>,
    },
    Ongoing {
        origin: ParticipantId,
        kind: ActionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<ActionPayload>,
    },
    /// Bounding-box candidates for one of our queries, with the query echoed
    Matches {
        kind: QueryKind,
        path: Vec<Point>,
        padding: f64,
        #[serde(default)]
        mode: QueryMode,
        ids: Vec<ElementId>,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Errors that can occur encoding or decoding messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl ClientMessage {
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Message type name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Add { .. } => "add",
            ClientMessage::Delete { .. } => "delete",
            ClientMessage::Move { .. } => "move",
            ClientMessage::Clear => "clear",
            ClientMessage::Query { .. } => "query",
            ClientMessage::Ongoing { .. } => "ongoing",
        }
    }
}

impl ServerMessage {
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Message type name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::Identify { .. } => "identify",
            ServerMessage::AllParticipants { .. } => "all_participants",
            ServerMessage::ParticipantJoined { .. } => "participant_joined",
            ServerMessage::ParticipantLeft { .. } => "participant_left",
            ServerMessage::AllElements { .. } => "all_elements",
            ServerMessage::Added { .. } => "added",
            ServerMessage::Deleted { .. } => "deleted",
            ServerMessage::Moved { .. } => "moved",
            ServerMessage::Cleared { .. } => "cleared",
            ServerMessage::Ongoing { .. } => "ongoing",
            ServerMessage::Matches { .. } => "matches",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementStyle, Shape};

    #[test]
    fn test_client_message_tags() {
        let json = ClientMessage::Delete {
            ids: vec![7],
            undo: true,
        }
        .encode()
        .unwrap();
        assert_eq!(json, r#"{"type":"delete","ids":[7],"undo":true}"#);
        assert_eq!(ClientMessage::Clear.encode().unwrap(), r#"{"type":"clear"}"#);
    }

    #[test]
    fn test_add_command_carries_drafts() {
        let msg = ClientMessage::Add {
            elements: vec![ElementDraft::new(
                Shape::Line {
                    start: Point::new(0.0, 0.0),
                    end: Point::new(1.0, 1.0),
                },
                ElementStyle::default(),
            )],
            undo: false,
            select: true,
        };
        let json = msg.encode().unwrap();
        assert!(json.contains(r#""kind":"line""#));
        assert_eq!(ClientMessage::decode(&json).unwrap(), msg);
    }

    #[test]
    fn test_decode_moved_event() {
        let json = r#"{"type":"moved","origin":2,"pairs":[{"old":3,"new":9},{"old":5,"new":11}],"offset":{"x":10.0,"y":-4.0}}"#;
        match ServerMessage::decode(json).unwrap() {
            ServerMessage::Moved {
                origin,
                pairs,
                offset,
                undo,
            } => {
                assert_eq!(origin, 2);
                assert_eq!(pairs, vec![MovePair::new(3, 9), MovePair::new(5, 11)]);
                assert_eq!(offset, Vec2::new(10.0, -4.0));
                assert!(!undo);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_ongoing_without_payload() {
        let msg = ServerMessage::decode(r#"{"type":"ongoing","origin":4,"kind":"none"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Ongoing {
                origin: 4,
                kind: ActionKind::None,
                payload: None
            }
        );
    }

    #[test]
    fn test_decode_matches_defaults_mode() {
        let json = r#"{"type":"matches","kind":"eraser","path":[{"x":0.0,"y":0.0},{"x":5.0,"y":0.0}],"padding":8.0,"ids":[1,2]}"#;
        let msg = ServerMessage::decode(json).unwrap();
        assert_eq!(msg.name(), "matches");
        if let ServerMessage::Matches { mode, ids, .. } = msg {
            assert_eq!(mode, QueryMode::Intersect);
            assert_eq!(ids, vec![1, 2]);
        }
    }

    #[test]
    fn test_malformed_message() {
        assert!(ServerMessage::decode("{not json").is_err());
        assert!(ServerMessage::decode(r#"{"type":"unknown"}"#).is_err());
    }
}
