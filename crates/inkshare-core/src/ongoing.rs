//! In-progress gestures of every participant.
//!
//! Each participant has at most one ongoing action. Local actions are driven
//! by the input layer through `start_local`/`extend_local`/`commit_local`;
//! remote ones arrive as partial updates from the server and are folded in
//! with `apply_remote_update`. Which of the two things happens to an update
//! (start over, merge, or reject) is decided by [`transition`] alone.

use crate::element::{ElementId, ParticipantId};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Kind of an ongoing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    None,
    Freehand,
    Line,
    Rectangle,
    Ellipse,
    Eraser,
    Select,
    Move,
    Copy,
}

/// Partial update to an ongoing action.
///
/// Point buffers are appended to. Every other field replaces the current
/// value when present, so re-applying one of those updates is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ActionPayload {
    Points {
        points: Vec<Point>,
    },
    Span {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<Point>,
    },
    Ellipse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        center: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius_x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius_y: Option<f64>,
    },
    Transfer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ids: Option<Vec<ElementId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<Vec2>,
    },
}

/// Errors from misusing the local action state machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("An action is already in progress: {0:?}")]
    AlreadyActive(ActionKind),
    #[error("No action in progress")]
    NotActive,
    #[error("Payload does not fit a {0:?} action")]
    PayloadMismatch(ActionKind),
    #[error("Cannot start an action of kind None")]
    NothingToStart,
}

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// The state of one participant's gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OngoingAction {
    #[default]
    None,
    Freehand {
        points: Vec<Point>,
    },
    Eraser {
        points: Vec<Point>,
    },
    Line {
        start: Point,
        end: Point,
    },
    Rectangle {
        start: Point,
        end: Point,
    },
    Select {
        start: Point,
        end: Point,
    },
    Ellipse {
        center: Point,
        radius_x: f64,
        radius_y: f64,
    },
    Move {
        ids: BTreeSet<ElementId>,
        offset: Vec2,
    },
    Copy {
        ids: BTreeSet<ElementId>,
        offset: Vec2,
    },
}

impl OngoingAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            OngoingAction::None => ActionKind::None,
            OngoingAction::Freehand { .. } => ActionKind::Freehand,
            OngoingAction::Eraser { .. } => ActionKind::Eraser,
            OngoingAction::Line { .. } => ActionKind::Line,
            OngoingAction::Rectangle { .. } => ActionKind::Rectangle,
            OngoingAction::Select { .. } => ActionKind::Select,
            OngoingAction::Ellipse { .. } => ActionKind::Ellipse,
            OngoingAction::Move { .. } => ActionKind::Move,
            OngoingAction::Copy { .. } => ActionKind::Copy,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, OngoingAction::None)
    }

    /// An action of `kind` with an empty payload.
    pub fn empty(kind: ActionKind) -> Self {
        let span = (Point::ZERO, Point::ZERO);
        match kind {
            ActionKind::None => OngoingAction::None,
            ActionKind::Freehand => OngoingAction::Freehand { points: Vec::new() },
            ActionKind::Eraser => OngoingAction::Eraser { points: Vec::new() },
            ActionKind::Line => OngoingAction::Line {
                start: span.0,
                end: span.1,
            },
            ActionKind::Rectangle => OngoingAction::Rectangle {
                start: span.0,
                end: span.1,
            },
            ActionKind::Select => OngoingAction::Select {
                start: span.0,
                end: span.1,
            },
            ActionKind::Ellipse => OngoingAction::Ellipse {
                center: Point::ZERO,
                radius_x: 0.0,
                radius_y: 0.0,
            },
            ActionKind::Move => OngoingAction::Move {
                ids: BTreeSet::new(),
                offset: Vec2::ZERO,
            },
            ActionKind::Copy => OngoingAction::Copy {
                ids: BTreeSet::new(),
                offset: Vec2::ZERO,
            },
        }
    }

    /// A fresh action of `kind` built from a (possibly partial) payload.
    ///
    /// A span given only one end starts collapsed onto that end.
    pub fn start(kind: ActionKind, payload: &ActionPayload) -> TrackerResult<Self> {
        if kind == ActionKind::None {
            return Err(TrackerError::NothingToStart);
        }
        let mut action = Self::empty(kind);
        if let ActionPayload::Span { start, end } = payload {
            let anchor = start.or(*end).unwrap_or(Point::ZERO);
            action.set_span(anchor, anchor);
        }
        action.merge(payload)?;
        Ok(action)
    }

    fn set_span(&mut self, new_start: Point, new_end: Point) {
        if let OngoingAction::Line { start, end }
        | OngoingAction::Rectangle { start, end }
        | OngoingAction::Select { start, end } = self
        {
            *start = new_start;
            *end = new_end;
        }
    }

    /// Fold a partial update into this action.
    pub fn merge(&mut self, payload: &ActionPayload) -> TrackerResult<()> {
        let kind = self.kind();
        match (self, payload) {
            (
                OngoingAction::Freehand { points } | OngoingAction::Eraser { points },
                ActionPayload::Points { points: more },
            ) => points.extend_from_slice(more),
            (
                OngoingAction::Line { start, end }
                | OngoingAction::Rectangle { start, end }
                | OngoingAction::Select { start, end },
                ActionPayload::Span {
                    start: new_start,
                    end: new_end,
                },
            ) => {
                if let Some(p) = new_start {
                    *start = *p;
                }
                if let Some(p) = new_end {
                    *end = *p;
                }
            }
            (
                OngoingAction::Ellipse {
                    center,
                    radius_x,
                    radius_y,
                },
                ActionPayload::Ellipse {
                    center: new_center,
                    radius_x: new_rx,
                    radius_y: new_ry,
                },
            ) => {
                if let Some(c) = new_center {
                    *center = *c;
                }
                if let Some(rx) = new_rx {
                    *radius_x = *rx;
                }
                if let Some(ry) = new_ry {
                    *radius_y = *ry;
                }
            }
            (
                OngoingAction::Move { ids, offset } | OngoingAction::Copy { ids, offset },
                ActionPayload::Transfer {
                    ids: new_ids,
                    offset: new_offset,
                },
            ) => {
                if let Some(new_ids) = new_ids {
                    *ids = new_ids.iter().copied().collect();
                }
                if let Some(o) = new_offset {
                    *offset = *o;
                }
            }
            _ => return Err(TrackerError::PayloadMismatch(kind)),
        }
        Ok(())
    }
}

/// Where an update comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    LocalStart,
    LocalExtend,
    Remote,
}

/// What an update does to the tracked action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Replace the tracked action wholesale.
    Start,
    /// Merge into the tracked action.
    Merge,
    /// Leave the tracked action alone.
    Reject,
}

/// Transition table for ongoing actions.
///
/// Remote updates never get rejected: a kind change (including a missed
/// start notification) simply starts over, which resynchronizes the state.
pub fn transition(source: UpdateSource, current: ActionKind, incoming: ActionKind) -> Transition {
    use ActionKind::None as Idle;
    match (source, current, incoming) {
        (UpdateSource::LocalStart, _, Idle) => Transition::Reject,
        (UpdateSource::LocalStart, Idle, _) => Transition::Start,
        (UpdateSource::LocalStart, _, _) => Transition::Reject,
        (UpdateSource::LocalExtend, Idle, _) => Transition::Reject,
        (UpdateSource::LocalExtend, c, i) if c == i => Transition::Merge,
        (UpdateSource::LocalExtend, _, _) => Transition::Reject,
        (UpdateSource::Remote, c, i) if c == i && c != Idle => Transition::Merge,
        (UpdateSource::Remote, _, _) => Transition::Start,
    }
}

/// Ongoing actions of the local client and every known remote participant.
#[derive(Debug, Clone, Default)]
pub struct OngoingTracker {
    self_id: Option<ParticipantId>,
    local: OngoingAction,
    remote: BTreeMap<ParticipantId, OngoingAction>,
}

impl OngoingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record our own participant id; updates from it are then ignored.
    pub fn set_self(&mut self, id: ParticipantId) {
        self.self_id = Some(id);
        self.remote.remove(&id);
    }

    pub fn is_self(&self, id: ParticipantId) -> bool {
        self.self_id == Some(id)
    }

    /// The local action.
    pub fn local(&self) -> &OngoingAction {
        &self.local
    }

    /// Begin a local gesture. Fails if one is already in progress.
    pub fn start_local(&mut self, kind: ActionKind, payload: ActionPayload) -> TrackerResult<()> {
        match transition(UpdateSource::LocalStart, self.local.kind(), kind) {
            Transition::Start => {
                self.local = OngoingAction::start(kind, &payload)?;
                Ok(())
            }
            _ if kind == ActionKind::None => Err(TrackerError::NothingToStart),
            _ => Err(TrackerError::AlreadyActive(self.local.kind())),
        }
    }

    /// Merge a partial update into the local gesture.
    pub fn extend_local(&mut self, payload: ActionPayload) -> TrackerResult<()> {
        let kind = self.local.kind();
        match transition(UpdateSource::LocalExtend, kind, kind) {
            Transition::Merge => self.local.merge(&payload),
            _ => Err(TrackerError::NotActive),
        }
    }

    /// Finish the local gesture, handing back its final state.
    pub fn commit_local(&mut self) -> TrackerResult<OngoingAction> {
        if !self.local.is_active() {
            return Err(TrackerError::NotActive);
        }
        Ok(std::mem::take(&mut self.local))
    }

    /// Abandon the local gesture, if any.
    pub fn reset_local(&mut self) {
        self.local = OngoingAction::None;
    }

    /// Apply an update broadcast for another participant.
    ///
    /// Updates for our own id are ignored; the local state is authoritative
    /// for those. A missing payload starts the kind empty. Merging point
    /// buffers appends, so re-applying a freehand or eraser update duplicates
    /// its points.
    pub fn apply_remote_update(
        &mut self,
        origin: ParticipantId,
        kind: ActionKind,
        payload: Option<&ActionPayload>,
    ) -> TrackerResult<()> {
        if self.is_self(origin) {
            return Ok(());
        }
        let current = self.remote.entry(origin).or_default();
        match (transition(UpdateSource::Remote, current.kind(), kind), payload) {
            (Transition::Merge, Some(payload)) => current.merge(payload),
            (Transition::Merge, None) | (Transition::Reject, _) => Ok(()),
            (Transition::Start, Some(payload)) if kind != ActionKind::None => {
                match OngoingAction::start(kind, payload) {
                    Ok(action) => {
                        *current = action;
                        Ok(())
                    }
                    Err(err) => {
                        *current = OngoingAction::empty(kind);
                        Err(err)
                    }
                }
            }
            (Transition::Start, _) => {
                *current = OngoingAction::empty(kind);
                Ok(())
            }
        }
    }

    /// Force an origin back to `None`.
    pub fn clear(&mut self, origin: ParticipantId) {
        if self.is_self(origin) {
            self.local = OngoingAction::None;
        } else if let Some(action) = self.remote.get_mut(&origin) {
            *action = OngoingAction::None;
        }
    }

    /// Start tracking a participant.
    pub fn join(&mut self, origin: ParticipantId) {
        if !self.is_self(origin) {
            self.remote.entry(origin).or_default();
        }
    }

    /// Forget a participant that left.
    pub fn leave(&mut self, origin: ParticipantId) {
        self.remote.remove(&origin);
    }

    /// Reset every remote participant to `None`.
    pub fn reset_remote(&mut self) {
        for action in self.remote.values_mut() {
            *action = OngoingAction::None;
        }
    }

    /// Action of a remote participant.
    pub fn remote(&self, origin: ParticipantId) -> Option<&OngoingAction> {
        self.remote.get(&origin)
    }

    /// Every active action, local first when we know our id.
    pub fn snapshot(&self) -> impl Iterator<Item = (ParticipantId, &OngoingAction)> {
        let local = self.self_id.map(|id| (id, &self.local));
        local
            .into_iter()
            .chain(self.remote.iter().map(|(id, action)| (*id, action)))
            .filter(|(_, action)| action.is_active())
    }
}
