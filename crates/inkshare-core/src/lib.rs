//! Inkshare Core Library
//!
//! Client-side core of the shared whiteboard: element model, hit testing,
//! in-progress gestures of every participant, and reconciliation of server
//! events with local undo/redo and selection. Rendering and transport live
//! outside this crate.

pub mod config;
pub mod element;
pub mod engine;
pub mod geometry;
pub mod history;
pub mod ongoing;
pub mod protocol;
pub mod query;
pub mod selection;
pub mod store;
pub mod tools;

pub use config::{ConfigError, EngineConfig};
pub use element::{
    Element, ElementDraft, ElementId, ElementKind, ElementStyle, ParticipantId, SerializableColor,
    Shape,
};
pub use engine::{Engine, EngineEvent};
pub use history::{History, HistoryEntry, MovePair};
pub use ongoing::{ActionKind, ActionPayload, OngoingAction, OngoingTracker, TrackerError};
pub use protocol::{ClientMessage, ConnectionState, ProtocolError, ServerMessage};
pub use query::{QueryEngine, QueryKind, QueryMode, QueryRequest};
pub use selection::Selection;
pub use store::DocumentStore;
pub use tools::{SelectMode, ToolKind, ToolManager};
