//! Tool system: turns pointer gestures into engine commands.

use crate::config::EngineConfig;
use crate::element::{ElementDraft, ElementStyle, Shape};
use crate::engine::Engine;
use crate::geometry::DEGENERATE_EPSILON;
use crate::ongoing::{ActionKind, ActionPayload, OngoingAction};
use crate::query::{QueryKind, QueryMode, QueryRequest};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Use web-time on WASM, std::time otherwise
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Freehand,
    Line,
    Rectangle,
    Ellipse,
    Eraser,
    Select,
    Move,
    Copy,
    Pipette,
}

impl ToolKind {
    /// Ongoing action kind tracked while the tool is in use.
    pub fn action_kind(self) -> Option<ActionKind> {
        match self {
            ToolKind::Freehand => Some(ActionKind::Freehand),
            ToolKind::Line => Some(ActionKind::Line),
            ToolKind::Rectangle => Some(ActionKind::Rectangle),
            ToolKind::Ellipse => Some(ActionKind::Ellipse),
            ToolKind::Eraser => Some(ActionKind::Eraser),
            ToolKind::Select => Some(ActionKind::Select),
            ToolKind::Move => Some(ActionKind::Move),
            ToolKind::Copy => Some(ActionKind::Copy),
            ToolKind::Pipette => None,
        }
    }

    /// Whether other participants see this tool's gestures in progress.
    pub fn shares_ongoing(self) -> bool {
        matches!(
            self,
            ToolKind::Freehand
                | ToolKind::Line
                | ToolKind::Rectangle
                | ToolKind::Ellipse
                | ToolKind::Move
                | ToolKind::Copy
        )
    }
}

/// How a select drag combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    #[default]
    Replace,
    Expand,
    Deselect,
}

impl SelectMode {
    fn query_kind(self) -> QueryKind {
        match self {
            SelectMode::Replace => QueryKind::Select,
            SelectMode::Expand => QueryKind::Expand,
            SelectMode::Deselect => QueryKind::Deselect,
        }
    }
}

/// Rate limiter: lets at most one call through per interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Whether a call may go through now; records it if so.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    pub fn ready_at(&mut self, now: Instant) -> bool {
        let ready = self
            .last
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if ready {
            self.last = Some(now);
        }
        ready
    }

    /// Record a call made outside the throttle.
    pub fn touch(&mut self) {
        self.last = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Copy, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// Tool is actively being used.
    Active {
        /// Starting point of the interaction.
        start: Point,
        /// Current point of the interaction.
        current: Point,
    },
}

/// Manages the current tool and its state.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current state of the tool.
    pub state: ToolState,
    /// Current style to apply to new elements.
    pub current_style: ElementStyle,
    /// Modifier state for the select tool.
    pub select_mode: SelectMode,
    /// Freehand points not yet shared, or the eraser path not yet queried.
    unsent: Vec<Point>,
    ongoing_throttle: Throttle,
    query_throttle: Throttle,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl ToolManager {
    /// Create a tool manager using the throttles and default style of `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::default(),
            current_style: config.default_style(),
            select_mode: SelectMode::default(),
            unsent: Vec::new(),
            ongoing_throttle: Throttle::from_millis(config.ongoing_throttle_ms),
            query_throttle: Throttle::from_millis(config.query_throttle_ms),
        }
    }

    /// Set the current tool, finishing any gesture in progress.
    pub fn set_tool(&mut self, engine: &mut Engine, tool: ToolKind) {
        if let ToolState::Active { current, .. } = self.state {
            self.on_gesture_cancel(engine, current);
        }
        self.current_tool = tool;
    }

    /// Check if a tool interaction is active.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Active { .. })
    }

    pub fn on_gesture_start(&mut self, engine: &mut Engine, position: Point) {
        if let ToolState::Active { current, .. } = self.state {
            log::debug!("Gesture started while another was active");
            self.on_gesture_end(engine, current);
        }
        self.unsent.clear();

        let tool = self.current_tool;
        let Some(kind) = tool.action_kind() else {
            let padding = engine.config().pipette_padding;
            engine.query(QueryRequest::new(
                QueryKind::Pipette,
                vec![position, position],
                padding,
            ));
            self.state = ToolState::Active {
                start: position,
                current: position,
            };
            return;
        };

        let payload = match tool {
            ToolKind::Freehand | ToolKind::Eraser => ActionPayload::Points {
                points: vec![position],
            },
            ToolKind::Line | ToolKind::Rectangle | ToolKind::Select => ActionPayload::Span {
                start: Some(position),
                end: Some(position),
            },
            ToolKind::Ellipse => ellipse_payload(position, position),
            ToolKind::Move | ToolKind::Copy => {
                if engine.selection().is_empty() {
                    log::debug!("Nothing selected to {tool:?}");
                    return;
                }
                ActionPayload::Transfer {
                    ids: Some(engine.selection().iter().collect()),
                    offset: Some(Vec2::ZERO),
                }
            }
            ToolKind::Pipette => return,
        };

        if let Err(err) = engine.ongoing_mut().start_local(kind, payload.clone()) {
            log::warn!("Cannot start {tool:?} gesture: {err}");
            return;
        }
        self.state = ToolState::Active {
            start: position,
            current: position,
        };

        if tool == ToolKind::Eraser {
            self.unsent.push(position);
            self.query_throttle.reset();
        }
        if tool.shares_ongoing() {
            engine.send_ongoing(kind, Some(payload));
            self.ongoing_throttle.touch();
        }
    }

    pub fn on_gesture_move(&mut self, engine: &mut Engine, position: Point) {
        let ToolState::Active { start, current } = &mut self.state else {
            return;
        };
        *current = position;
        let start = *start;

        let tool = self.current_tool;
        let payload = gesture_payload(tool, start, position);
        let (Some(kind), Some(payload)) = (tool.action_kind(), payload) else {
            return;
        };
        if let Err(err) = engine.ongoing_mut().extend_local(payload.clone()) {
            log::warn!("Dropping {tool:?} update: {err}");
            return;
        }

        match tool {
            ToolKind::Freehand => {
                self.unsent.push(position);
                if self.ongoing_throttle.ready() {
                    let points = std::mem::take(&mut self.unsent);
                    engine.send_ongoing(kind, Some(ActionPayload::Points { points }));
                }
            }
            ToolKind::Eraser => {
                self.unsent.push(position);
                if self.query_throttle.ready() {
                    self.flush_eraser(engine);
                }
            }
            _ if tool.shares_ongoing() => {
                if self.ongoing_throttle.ready() {
                    engine.send_ongoing(kind, Some(payload));
                }
            }
            _ => {}
        }
    }

    /// Finish the gesture and send whatever command it produced.
    pub fn on_gesture_end(&mut self, engine: &mut Engine, position: Point) {
        let ToolState::Active { start, current } = std::mem::take(&mut self.state) else {
            return;
        };
        let tool = self.current_tool;
        let Some(payload) = gesture_payload(tool, start, position) else {
            return;
        };

        let repeated = matches!(tool, ToolKind::Freehand | ToolKind::Eraser) && position == current;
        if !repeated {
            if let Err(err) = engine.ongoing_mut().extend_local(payload) {
                log::warn!("Dropping final {tool:?} update: {err}");
            }
            if tool == ToolKind::Eraser {
                self.unsent.push(position);
            }
        }
        if tool == ToolKind::Eraser {
            if self.unsent.len() == 1 {
                self.unsent.push(position);
            }
            self.flush_eraser(engine);
        }
        self.unsent.clear();

        let action = match engine.ongoing_mut().commit_local() {
            Ok(action) => action,
            Err(err) => {
                log::debug!("No {tool:?} action to commit: {err}");
                return;
            }
        };
        let committed = self.commit(engine, action);
        if !committed && tool.shares_ongoing() {
            engine.send_ongoing(ActionKind::None, None);
        }
    }

    /// Abort the gesture. Takes the same path as ending it.
    pub fn on_gesture_cancel(&mut self, engine: &mut Engine, position: Point) {
        self.on_gesture_end(engine, position);
    }

    /// Query the eraser path collected so far, keeping its last point as the
    /// start of the next chunk.
    fn flush_eraser(&mut self, engine: &mut Engine) {
        if self.unsent.len() < 2 {
            return;
        }
        let path = std::mem::take(&mut self.unsent);
        if let Some(last) = path.last() {
            self.unsent.push(*last);
        }
        let padding = engine.config().eraser_padding;
        engine.query(QueryRequest::new(QueryKind::Eraser, path, padding));
    }

    /// Turn a finished action into a command. Returns false when the
    /// gesture produced nothing.
    fn commit(&self, engine: &mut Engine, action: OngoingAction) -> bool {
        let style = self.current_style;
        let degenerate = |a: Point, b: Point| (b - a).hypot2() < DEGENERATE_EPSILON;
        let shape = match action {
            OngoingAction::Freehand { points } => {
                if points.len() < 2 {
                    log::debug!("Dropping freehand stroke with {} points", points.len());
                    return false;
                }
                Shape::Freehand { points }
            }
            OngoingAction::Line { start, end } => {
                if degenerate(start, end) {
                    return false;
                }
                Shape::Line { start, end }
            }
            OngoingAction::Rectangle { start, end } => {
                if degenerate(start, end) {
                    return false;
                }
                Shape::Rectangle { start, end }
            }
            OngoingAction::Ellipse {
                center,
                radius_x,
                radius_y,
            } => {
                if radius_x * radius_x + radius_y * radius_y < DEGENERATE_EPSILON {
                    return false;
                }
                Shape::Ellipse {
                    center,
                    radius_x,
                    radius_y,
                }
            }
            OngoingAction::Select { start, end } => {
                let padding = engine.config().select_padding;
                let kind = self.select_mode.query_kind();
                let request = if degenerate(start, end) {
                    QueryRequest::new(kind, vec![start, start], padding)
                } else {
                    QueryRequest::new(kind, vec![start, end], padding).with_mode(QueryMode::Contain)
                };
                engine.query(request);
                return true;
            }
            OngoingAction::Move { ids, offset } => {
                let ids: Vec<_> = ids
                    .into_iter()
                    .filter(|id| engine.store().contains(*id))
                    .collect();
                if ids.is_empty() || offset.hypot2() < DEGENERATE_EPSILON {
                    return false;
                }
                engine.move_elements(ids, offset);
                return true;
            }
            OngoingAction::Copy { ids, offset } => {
                if offset.hypot2() < DEGENERATE_EPSILON {
                    return false;
                }
                let copies: Vec<ElementDraft> = engine
                    .store()
                    .snapshot(ids)
                    .iter()
                    .map(|e| ElementDraft::new(e.shape().translated(-offset), *e.style()))
                    .collect();
                if copies.is_empty() {
                    return false;
                }
                engine.add(copies, true);
                return true;
            }
            OngoingAction::Eraser { .. } | OngoingAction::None => return false,
        };
        engine.add(vec![ElementDraft::new(shape, style)], false);
        true
    }
}

/// Incremental update for a pointer at `position` in a gesture begun at `start`.
fn gesture_payload(tool: ToolKind, start: Point, position: Point) -> Option<ActionPayload> {
    match tool {
        ToolKind::Freehand | ToolKind::Eraser => Some(ActionPayload::Points {
            points: vec![position],
        }),
        ToolKind::Line | ToolKind::Rectangle | ToolKind::Select => Some(ActionPayload::Span {
            start: None,
            end: Some(position),
        }),
        ToolKind::Ellipse => Some(ellipse_payload(start, position)),
        ToolKind::Move | ToolKind::Copy => Some(ActionPayload::Transfer {
            ids: None,
            offset: Some(start - position),
        }),
        ToolKind::Pipette => None,
    }
}

/// Ellipse inscribed in the box spanned by two corners.
fn ellipse_payload(a: Point, b: Point) -> ActionPayload {
    ActionPayload::Ellipse {
        center: Some(a.midpoint(b)),
        radius_x: Some((b.x - a.x).abs() / 2.0),
        radius_y: Some((b.y - a.y).abs() / 2.0),
    }
}
