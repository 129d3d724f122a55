//! Reconciliation of server events with local state.
//!
//! The engine is the only place that mutates the document store, the
//! history, and the selection. Local intent goes out as commands; nothing
//! changes locally until the server broadcasts the resulting event back.

use crate::config::{ConfigResult, EngineConfig};
use crate::element::{Element, ElementDraft, ElementId, ParticipantId, SerializableColor};
use crate::history::{History, HistoryEntry, MovePair, Stack};
use crate::ongoing::{ActionKind, ActionPayload, OngoingTracker};
use crate::protocol::{ClientMessage, ConnectionState, ServerMessage};
use crate::query::{QueryEngine, QueryKind, QueryRequest, pick_sample};
use crate::selection::Selection;
use crate::store::DocumentStore;
use kurbo::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};

/// Something the host may want to react to after an event was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The server told us our participant id.
    Identified(ParticipantId),
    ParticipantJoined(ParticipantId),
    ParticipantLeft(ParticipantId),
    /// The pipette picked up a color.
    ColorSampled(SerializableColor),
    /// A `moved` event referenced ids we do not have.
    Desync { skipped: Vec<ElementId> },
}

/// Client-side state of one whiteboard session.
pub struct Engine {
    config: EngineConfig,
    self_id: Option<ParticipantId>,
    participants: BTreeSet<ParticipantId>,
    connection: ConnectionState,
    store: DocumentStore,
    selection: Selection,
    history: History,
    ongoing: OngoingTracker,
    queries: QueryEngine,
    /// Pipette tie-break source.
    rng: StdRng,
    /// Commands waiting to be sent.
    outgoing: Vec<ClientMessage>,
}

impl Engine {
    /// Create an engine after validating `config`.
    pub fn new(config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config, StdRng::from_rng(&mut rand::rng())))
    }

    /// Like [`Engine::new`], with a fixed seed for the pipette.
    pub fn with_seed(config: EngineConfig, seed: u64) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config, StdRng::seed_from_u64(seed)))
    }

    fn build(config: EngineConfig, rng: StdRng) -> Self {
        Self {
            history: History::new(config.max_undo_history),
            queries: QueryEngine::new(config.ellipse_segments),
            config,
            self_id: None,
            participants: BTreeSet::new(),
            connection: ConnectionState::Disconnected,
            store: DocumentStore::new(),
            selection: Selection::new(),
            ongoing: OngoingTracker::new(),
            rng,
            outgoing: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn self_id(&self) -> Option<ParticipantId> {
        self.self_id
    }

    fn is_self(&self, origin: ParticipantId) -> bool {
        self.self_id == Some(origin)
    }

    pub fn participants(&self) -> &BTreeSet<ParticipantId> {
        &self.participants
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// Record a transport state change.
    ///
    /// Losing the connection drops remote ongoing state; the server resends
    /// everything on reconnect.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if state == self.connection {
            return;
        }
        log::info!("Connection state {:?} -> {:?}", self.connection, state);
        if matches!(state, ConnectionState::Disconnected | ConnectionState::Error) {
            self.ongoing.reset_remote();
        }
        self.connection = state;
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn ongoing(&self) -> &OngoingTracker {
        &self.ongoing
    }

    pub fn ongoing_mut(&mut self) -> &mut OngoingTracker {
        &mut self.ongoing
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Outgoing commands ---

    fn queue(&mut self, msg: ClientMessage) {
        log::debug!("Queueing {} command", msg.name());
        self.outgoing.push(msg);
    }

    /// Queue a command issued by the user, invalidating redo.
    fn queue_edit(&mut self, msg: ClientMessage) {
        self.history.clear_redo();
        self.queue(msg);
    }

    /// Take pending commands as JSON (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
            .into_iter()
            .filter_map(|msg| match msg.encode() {
                Ok(json) => Some(json),
                Err(err) => {
                    log::warn!("Dropping {} command: {err}", msg.name());
                    None
                }
            })
            .collect()
    }

    /// Take pending commands (drains the queue).
    pub fn take_commands(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Ask the server to create elements.
    pub fn add(&mut self, elements: Vec<ElementDraft>, select: bool) {
        if elements.is_empty() {
            return;
        }
        self.queue_edit(ClientMessage::Add {
            elements,
            undo: false,
            select,
        });
    }

    pub fn delete(&mut self, ids: Vec<ElementId>) {
        if ids.is_empty() {
            return;
        }
        self.queue_edit(ClientMessage::Delete { ids, undo: false });
    }

    /// Ask the server to move elements; `offset` is subtracted from their geometry.
    pub fn move_elements(&mut self, ids: Vec<ElementId>, offset: Vec2) {
        if ids.is_empty() {
            return;
        }
        self.queue_edit(ClientMessage::Move {
            ids,
            offset,
            undo: false,
        });
    }

    pub fn clear(&mut self) {
        self.queue_edit(ClientMessage::Clear);
    }

    pub fn query(&mut self, request: QueryRequest) {
        if request.path.is_empty() {
            return;
        }
        self.queue(ClientMessage::Query {
            kind: request.kind,
            path: request.path,
            padding: request.padding,
            mode: request.mode,
        });
    }

    pub fn send_ongoing(&mut self, kind: ActionKind, payload: Option<ActionPayload>) {
        self.queue(ClientMessage::Ongoing { kind, payload });
    }

    // --- Undo/redo ---

    /// Issue the inverse of the most recent undo entry.
    ///
    /// Returns false when there was nothing left to undo. The entry reappears
    /// on the redo stack once the server confirms the inverse.
    pub fn undo(&mut self) -> bool {
        self.invert_top(Stack::Undo)
    }

    /// Issue the inverse of the most recent redo entry.
    pub fn redo(&mut self) -> bool {
        self.invert_top(Stack::Redo)
    }

    fn invert_top(&mut self, stack: Stack) -> bool {
        let undo = stack == Stack::Undo;
        while let Some(entry) = self.history.pop(stack) {
            if let Some(msg) = self.inverse(&entry, undo) {
                self.queue(msg);
                return true;
            }
            log::debug!("Skipping history entry with no live elements");
        }
        false
    }

    fn inverse(&self, entry: &HistoryEntry, undo: bool) -> Option<ClientMessage> {
        match entry {
            HistoryEntry::Added { ids } => {
                let ids: Vec<_> = ids
                    .iter()
                    .copied()
                    .filter(|id| self.store.contains(*id))
                    .collect();
                (!ids.is_empty()).then_some(ClientMessage::Delete { ids, undo })
            }
            HistoryEntry::Deleted { elements } => {
                (!elements.is_empty()).then(|| ClientMessage::Add {
                    elements: elements.iter().map(Element::to_draft).collect(),
                    undo,
                    select: false,
                })
            }
            HistoryEntry::Moved { pairs, offset } => {
                let ids: Vec<_> = pairs
                    .iter()
                    .map(|p| p.new)
                    .filter(|id| self.store.contains(*id))
                    .collect();
                (!ids.is_empty()).then_some(ClientMessage::Move {
                    ids,
                    offset: -*offset,
                    undo,
                })
            }
        }
    }

    // --- Incoming events ---

    /// Parse and apply a server message.
    pub fn handle_message(&mut self, json: &str) -> Option<EngineEvent> {
        match ServerMessage::decode(json) {
            Ok(msg) => self.handle_event(msg),
            Err(err) => {
                log::warn!("Ignoring server message: {err}");
                None
            }
        }
    }

    /// Apply one server event.
    pub fn handle_event(&mut self, msg: ServerMessage) -> Option<EngineEvent> {
        log::debug!("Handling {} event", msg.name());
        match msg {
            ServerMessage::Identify { id } => {
                self.self_id = Some(id);
                self.participants.insert(id);
                self.ongoing.set_self(id);
                self.set_connection_state(ConnectionState::Connected);
                Some(EngineEvent::Identified(id))
            }
            ServerMessage::AllParticipants { ids } => {
                let ids: BTreeSet<_> = ids.into_iter().chain(self.self_id).collect();
                for gone in self.participants.difference(&ids) {
                    self.ongoing.leave(*gone);
                }
                for id in &ids {
                    self.ongoing.join(*id);
                }
                self.participants = ids;
                None
            }
            ServerMessage::ParticipantJoined { id } => {
                self.participants.insert(id);
                self.ongoing.join(id);
                Some(EngineEvent::ParticipantJoined(id))
            }
            ServerMessage::ParticipantLeft { id } => {
                self.participants.remove(&id);
                self.ongoing.leave(id);
                Some(EngineEvent::ParticipantLeft(id))
            }
            ServerMessage::AllElements { elements } => {
                log::info!("Loaded {} elements", elements.len());
                self.store.replace_all(elements);
                self.selection.retain_live(&self.store);
                self.history.retain_live(&self.store);
                self.ongoing.reset_remote();
                None
            }
            ServerMessage::Added {
                origin,
                elements,
                undo,
                select,
            } => {
                self.on_added(origin, elements, undo, select);
                None
            }
            ServerMessage::Deleted { origin, ids, undo } => {
                self.on_deleted(origin, ids, undo);
                None
            }
            ServerMessage::Moved {
                origin,
                pairs,
                offset,
                undo,
            } => self.on_moved(origin, pairs, offset, undo),
            ServerMessage::Cleared { .. } => {
                self.store.clear();
                self.history.clear();
                self.selection.clear();
                None
            }
            ServerMessage::Ongoing {
                origin,
                kind,
                payload,
            } => {
                if let Err(err) = self.ongoing.apply_remote_update(origin, kind, payload.as_ref()) {
                    log::warn!("Bad ongoing update from participant {origin}: {err}");
                }
                None
            }
            ServerMessage::Matches {
                kind,
                path,
                padding,
                mode,
                ids,
            } => {
                let request = QueryRequest {
                    kind,
                    path,
                    padding,
                    mode,
                };
                self.on_matches(&request, ids)
            }
        }
    }

    fn on_added(
        &mut self,
        origin: ParticipantId,
        elements: Vec<Element>,
        undo: bool,
        select: bool,
    ) {
        let ids: BTreeSet<_> = elements.iter().map(|e| e.id).collect();
        for element in elements {
            if let Some(old) = self.store.insert(element) {
                log::warn!("Element {} was added twice", old.id);
            }
        }
        if self.is_self(origin) {
            if !ids.is_empty() {
                self.history
                    .push(Stack::for_undo_flag(undo), HistoryEntry::Added { ids: ids.clone() });
            }
            if select {
                self.selection.extend(ids);
            }
        } else {
            self.ongoing.clear(origin);
        }
    }

    fn on_deleted(&mut self, origin: ParticipantId, ids: Vec<ElementId>, undo: bool) {
        let removed: BTreeSet<_> = ids.iter().copied().collect();
        let snapshots: Vec<Element> = ids
            .into_iter()
            .filter_map(|id| self.store.remove(id))
            .collect();
        if snapshots.len() < removed.len() {
            log::debug!(
                "{} deleted ids were already gone",
                removed.len() - snapshots.len()
            );
        }
        self.history.prune(&removed);
        self.selection.subtract(removed);
        if self.is_self(origin) && !snapshots.is_empty() {
            self.history.push(
                Stack::for_undo_flag(undo),
                HistoryEntry::Deleted {
                    elements: snapshots,
                },
            );
        }
    }

    fn on_moved(
        &mut self,
        origin: ParticipantId,
        pairs: Vec<MovePair>,
        offset: Vec2,
        undo: bool,
    ) -> Option<EngineEvent> {
        let mut applied = Vec::with_capacity(pairs.len());
        let mut skipped = Vec::new();
        for pair in pairs {
            if self.store.move_element(pair.old, pair.new, offset) {
                applied.push(pair);
            } else {
                log::warn!("Moved element {} is unknown, skipping", pair.old);
                skipped.push(pair.old);
            }
        }

        let moves: BTreeMap<_, _> = applied.iter().map(|p| (p.old, p.new)).collect();
        self.history.remap(&moves);
        self.selection.remap(&moves);

        if self.is_self(origin) {
            self.selection.replace(applied.iter().map(|p| p.new));
            if !applied.is_empty() {
                self.history.push(
                    Stack::for_undo_flag(undo),
                    HistoryEntry::Moved {
                        pairs: applied,
                        offset,
                    },
                );
            }
        } else {
            self.ongoing.clear(origin);
        }

        (!skipped.is_empty()).then_some(EngineEvent::Desync { skipped })
    }

    fn on_matches(
        &mut self,
        request: &QueryRequest,
        candidates: Vec<ElementId>,
    ) -> Option<EngineEvent> {
        let matched = self.queries.query(&self.store, request, candidates);
        log::debug!("{:?} query matched {} elements", request.kind, matched.len());
        match request.kind {
            QueryKind::Select => self.selection.replace(matched),
            QueryKind::Expand => self.selection.extend(matched),
            QueryKind::Deselect => self.selection.subtract(matched),
            QueryKind::Eraser => self.delete(matched),
            QueryKind::Pipette => {
                // Overlapping candidates are equally likely to be sampled.
                return pick_sample(&self.store, &matched, &mut self.rng)
                    .map(|e| EngineEvent::ColorSampled(e.style().color));
            }
        }
        None
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::build(EngineConfig::default(), StdRng::from_rng(&mut rand::rng()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementStyle, Shape};
    use crate::ongoing::OngoingAction;
    use crate::query::QueryMode;
    use kurbo::Point;

    const ME: ParticipantId = 1;
    const PEER: ParticipantId = 2;

    fn engine() -> Engine {
        let mut engine = Engine::with_seed(EngineConfig::default(), 42).unwrap();
        engine.handle_event(ServerMessage::Identify { id: ME });
        engine
    }

    fn line(id: ElementId, x0: f64, y0: f64, x1: f64, y1: f64) -> Element {
        Element::new(
            id,
            Shape::Line {
                start: Point::new(x0, y0),
                end: Point::new(x1, y1),
            },
            ElementStyle::default(),
        )
    }

    fn added(origin: ParticipantId, elements: Vec<Element>, undo: bool) -> ServerMessage {
        ServerMessage::Added {
            origin,
            elements,
            undo,
            select: false,
        }
    }

    fn deleted(origin: ParticipantId, ids: Vec<ElementId>, undo: bool) -> ServerMessage {
        ServerMessage::Deleted { origin, ids, undo }
    }

    fn matches(kind: QueryKind, ids: Vec<ElementId>) -> ServerMessage {
        ServerMessage::Matches {
            kind,
            path: vec![Point::new(-5.0, -5.0), Point::new(200.0, 200.0)],
            padding: 0.0,
            mode: QueryMode::Contain,
            ids,
        }
    }

    #[test]
    fn test_identify() {
        let mut engine = Engine::default();
        assert_eq!(engine.connection_state(), ConnectionState::Disconnected);
        let event = engine.handle_message(r#"{"type":"identify","id":5}"#);
        assert_eq!(event, Some(EngineEvent::Identified(5)));
        assert_eq!(engine.self_id(), Some(5));
        assert_eq!(engine.connection_state(), ConnectionState::Connected);
    }

    #[test]
    fn test_malformed_message_ignored() {
        let mut engine = engine();
        assert!(engine.handle_message("{\"type\":\"bogus\"}").is_none());
        assert!(engine.store().is_empty());
    }

    #[test]
    fn test_local_add_pushes_undo() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::Added {
            origin: ME,
            elements: vec![line(7, 0.0, 0.0, 1.0, 1.0)],
            undo: false,
            select: true,
        });
        assert!(engine.store().contains(7));
        assert!(engine.can_undo());
        assert!(engine.selection().contains(7));

        assert!(engine.undo());
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Delete {
                ids: vec![7],
                undo: true
            }]
        );
    }

    #[test]
    fn test_remote_add_not_undoable() {
        let mut engine = engine();
        engine.handle_event(added(PEER, vec![line(7, 0.0, 0.0, 1.0, 1.0)], false));
        assert!(engine.store().contains(7));
        assert!(!engine.can_undo());
        assert!(!engine.undo());
        assert!(!engine.has_outgoing());
    }

    #[test]
    fn test_remote_delete_prunes_undo() {
        let mut engine = engine();
        engine.handle_event(added(ME, vec![line(7, 0.0, 0.0, 1.0, 1.0)], false));
        engine.handle_event(deleted(PEER, vec![7], false));

        assert!(!engine.can_undo());
        assert!(!engine.undo());
        assert!(engine.take_commands().is_empty());
    }

    #[test]
    fn test_remote_delete_prunes_selection() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::Added {
            origin: ME,
            elements: vec![line(7, 0.0, 0.0, 1.0, 1.0)],
            undo: false,
            select: true,
        });
        assert!(engine.selection().contains(7));

        engine.handle_event(deleted(PEER, vec![7], false));
        assert!(engine.selection().is_empty());
    }

    #[test]
    fn test_remote_delete_shrinks_undo_entry() {
        let mut engine = engine();
        engine.handle_event(added(
            ME,
            vec![line(4, 0.0, 0.0, 1.0, 1.0), line(7, 0.0, 0.0, 1.0, 1.0)],
            false,
        ));
        engine.handle_event(deleted(PEER, vec![7], false));

        assert!(engine.undo());
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Delete {
                ids: vec![4],
                undo: true
            }]
        );
    }

    #[test]
    fn test_unknown_delete_is_noop() {
        let mut engine = engine();
        engine.handle_event(added(PEER, vec![line(1, 0.0, 0.0, 1.0, 1.0)], false));
        engine.handle_event(deleted(ME, vec![1, 99], false));
        assert!(engine.store().is_empty());
        match engine.history().entries(Stack::Undo) {
            [HistoryEntry::Deleted { elements }] => assert_eq!(elements.len(), 1),
            other => panic!("unexpected history: {other:?}"),
        }
    }

    #[test]
    fn test_move_then_undo_restores_geometry() {
        let mut engine = engine();
        let a = line(3, 0.0, 0.0, 10.0, 10.0);
        let b = line(5, 20.0, 20.0, 30.0, 20.0);
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![a.clone(), b.clone()],
        });

        let offset = Vec2::new(10.0, -4.0);
        let event = engine.handle_event(ServerMessage::Moved {
            origin: ME,
            pairs: vec![MovePair::new(3, 9), MovePair::new(5, 11)],
            offset,
            undo: false,
        });
        assert!(event.is_none());
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec![9, 11]);
        let moved = engine.store().get(9).unwrap();
        assert_eq!(moved.bounds(), a.bounds() + Vec2::new(-10.0, 4.0));

        assert!(engine.undo());
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Move {
                ids: vec![9, 11],
                offset: Vec2::new(-10.0, 4.0),
                undo: true
            }]
        );

        engine.handle_event(ServerMessage::Moved {
            origin: ME,
            pairs: vec![MovePair::new(9, 12), MovePair::new(11, 13)],
            offset: Vec2::new(-10.0, 4.0),
            undo: true,
        });
        assert!(engine.store().get(12).unwrap().same_content(&a));
        assert!(engine.store().get(13).unwrap().same_content(&b));
        assert!(!engine.can_undo());
        assert!(engine.can_redo());
    }

    #[test]
    fn test_moved_missing_old_id_skipped() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![line(3, 0.0, 0.0, 1.0, 1.0)],
        });
        let event = engine.handle_event(ServerMessage::Moved {
            origin: PEER,
            pairs: vec![MovePair::new(3, 9), MovePair::new(4, 10)],
            offset: Vec2::new(1.0, 1.0),
            undo: false,
        });
        assert_eq!(event, Some(EngineEvent::Desync { skipped: vec![4] }));
        assert_eq!(engine.store().ids().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_remote_move_follows_history_and_selection() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::Added {
            origin: ME,
            elements: vec![line(3, 0.0, 0.0, 1.0, 1.0)],
            undo: false,
            select: true,
        });
        engine.handle_event(ServerMessage::Moved {
            origin: PEER,
            pairs: vec![MovePair::new(3, 8)],
            offset: Vec2::new(5.0, 5.0),
            undo: false,
        });
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec![8]);

        assert!(engine.undo());
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Delete {
                ids: vec![8],
                undo: true
            }]
        );
    }

    #[test]
    fn test_undo_redo_delete_roundtrip() {
        let mut engine = engine();
        let before = line(3, 1.0, 2.0, 3.0, 4.0);
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![before.clone()],
        });
        engine.handle_event(deleted(ME, vec![3], false));
        assert!(engine.store().is_empty());

        assert!(engine.undo());
        let drafts = match engine.take_commands().as_slice() {
            [ClientMessage::Add { elements, undo: true, select: false }] => elements.clone(),
            other => panic!("unexpected commands: {other:?}"),
        };
        let restored: Vec<Element> = drafts
            .into_iter()
            .map(|d| Element::from_draft(20, d))
            .collect();
        engine.handle_event(added(ME, restored, true));
        assert!(engine.store().get(20).unwrap().same_content(&before));
        assert!(engine.can_redo());

        assert!(engine.redo());
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Delete {
                ids: vec![20],
                undo: false
            }]
        );
        engine.handle_event(deleted(ME, vec![20], false));
        assert!(engine.can_undo());
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_add_undo_redo_preserves_content() {
        let mut engine = engine();
        let stroke = Element::new(
            7,
            Shape::Freehand {
                points: vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(6.0, 0.0)],
            },
            ElementStyle::new(SerializableColor::new(17, 68, 136, 255), 3.0),
        );
        engine.handle_event(added(ME, vec![stroke.clone()], false));

        assert!(engine.undo());
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Delete {
                ids: vec![7],
                undo: true
            }]
        );
        engine.handle_event(deleted(ME, vec![7], true));
        assert!(engine.store().is_empty());

        assert!(engine.redo());
        let drafts = match engine.take_commands().as_slice() {
            [ClientMessage::Add { elements, undo: false, .. }] => elements.clone(),
            other => panic!("unexpected commands: {other:?}"),
        };
        let readded: Vec<Element> = drafts
            .into_iter()
            .map(|d| Element::from_draft(8, d))
            .collect();
        engine.handle_event(added(ME, readded, false));

        let contents: Vec<&Element> = engine.store().iter().collect();
        assert_eq!(contents.len(), 1);
        assert!(contents[0].same_content(&stroke));
        assert!(engine.can_undo());
    }

    #[test]
    fn test_local_edit_clears_redo() {
        let mut engine = engine();
        engine.handle_event(added(ME, vec![line(1, 0.0, 0.0, 1.0, 1.0)], true));
        assert!(engine.can_redo());
        engine.delete(vec![1]);
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_undo_on_empty_stack() {
        let mut engine = engine();
        assert!(!engine.undo());
        assert!(!engine.redo());
        assert!(!engine.has_outgoing());
    }

    #[test]
    fn test_history_is_bounded() {
        let config = EngineConfig {
            max_undo_history: 2,
            ..Default::default()
        };
        let mut engine = Engine::with_seed(config, 1).unwrap();
        engine.handle_event(ServerMessage::Identify { id: ME });
        for id in 1..=3 {
            engine.handle_event(added(ME, vec![line(id, 0.0, 0.0, 1.0, 1.0)], false));
        }
        assert_eq!(engine.history().entries(Stack::Undo).len(), 2);
    }

    #[test]
    fn test_cleared_resets_everything() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::Added {
            origin: ME,
            elements: vec![line(1, 0.0, 0.0, 1.0, 1.0)],
            undo: false,
            select: true,
        });
        engine.handle_event(ServerMessage::Cleared { origin: Some(PEER) });
        assert!(engine.store().is_empty());
        assert!(engine.selection().is_empty());
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_all_elements_prunes_to_live() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::Added {
            origin: ME,
            elements: vec![line(1, 0.0, 0.0, 1.0, 1.0), line(2, 0.0, 0.0, 1.0, 1.0)],
            undo: false,
            select: true,
        });
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![line(2, 0.0, 0.0, 1.0, 1.0)],
        });
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(
            engine.history().entries(Stack::Undo),
            &[HistoryEntry::Added {
                ids: BTreeSet::from([2])
            }]
        );
    }

    #[test]
    fn test_remote_ongoing_and_confirmation() {
        let mut engine = engine();
        engine.handle_message(
            r#"{"type":"ongoing","origin":2,"kind":"freehand","payload":{"form":"points","points":[{"x":0.0,"y":0.0}]}}"#,
        );
        assert_eq!(
            engine.ongoing().remote(PEER).map(OngoingAction::kind),
            Some(ActionKind::Freehand)
        );
        engine.handle_event(added(PEER, vec![line(1, 0.0, 0.0, 1.0, 1.0)], false));
        assert_eq!(engine.ongoing().remote(PEER), Some(&OngoingAction::None));

        engine.handle_event(ServerMessage::ParticipantLeft { id: PEER });
        assert!(engine.ongoing().remote(PEER).is_none());
    }

    #[test]
    fn test_selection_queries() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![
                line(1, 0.0, 0.0, 10.0, 10.0),
                line(2, 50.0, 50.0, 60.0, 60.0),
                line(3, 500.0, 500.0, 600.0, 600.0),
            ],
        });
        engine.handle_event(matches(QueryKind::Select, vec![1, 3]));
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec![1]);

        engine.handle_event(matches(QueryKind::Expand, vec![2]));
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec![1, 2]);

        engine.handle_event(matches(QueryKind::Deselect, vec![1]));
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_eraser_matches_forward_delete() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![line(1, 0.0, 0.0, 10.0, 10.0), line(2, 0.0, 10.0, 10.0, 0.0)],
        });
        engine.handle_event(ServerMessage::Matches {
            kind: QueryKind::Eraser,
            path: vec![Point::new(0.0, 0.0), Point::new(3.0, 0.0)],
            padding: 1.0,
            mode: QueryMode::Intersect,
            ids: vec![1, 2],
        });
        assert_eq!(
            engine.take_commands(),
            vec![ClientMessage::Delete {
                ids: vec![1],
                undo: false
            }]
        );
    }

    #[test]
    fn test_pipette_samples_color() {
        let red = SerializableColor::new(255, 0, 0, 255);
        let blue = SerializableColor::new(0, 0, 255, 255);
        let element = |id, color| {
            Element::new(
                id,
                Shape::Line {
                    start: Point::new(0.0, 0.0),
                    end: Point::new(10.0, 0.0),
                },
                ElementStyle::new(color, 2.0),
            )
        };
        let mut engine = engine();
        engine.handle_event(ServerMessage::AllElements {
            elements: vec![element(1, red), element(2, blue)],
        });
        let reply = ServerMessage::Matches {
            kind: QueryKind::Pipette,
            path: vec![Point::new(5.0, 0.0), Point::new(5.0, 0.0)],
            padding: 2.0,
            mode: QueryMode::Intersect,
            ids: vec![1, 2],
        };
        match engine.handle_event(reply) {
            Some(EngineEvent::ColorSampled(color)) => assert!(color == red || color == blue),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_outgoing_json() {
        let mut engine = engine();
        engine.clear();
        engine.send_ongoing(ActionKind::None, None);
        assert_eq!(
            engine.take_outgoing(),
            vec![
                r#"{"type":"clear"}"#.to_string(),
                r#"{"type":"ongoing","kind":"none"}"#.to_string(),
            ]
        );
        assert!(!engine.has_outgoing());
    }

    #[test]
    fn test_participants() {
        let mut engine = engine();
        engine.handle_event(ServerMessage::AllParticipants { ids: vec![2, 3] });
        assert_eq!(engine.participants().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        engine.handle_event(ServerMessage::ParticipantJoined { id: 4 });
        engine.handle_event(ServerMessage::AllParticipants { ids: vec![1, 4] });
        assert_eq!(engine.participants().iter().copied().collect::<Vec<_>>(), vec![1, 4]);
        assert!(engine.ongoing().remote(2).is_none());
    }
}
