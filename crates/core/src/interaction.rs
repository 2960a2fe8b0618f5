//! Pointer interaction state machine
//!
//! Translates pointer gestures into annotation edits. One gesture runs at a
//! time: press picks the gesture from what was hit, move applies it, release
//! returns to idle. All math converts to document space first so behavior is
//! identical at every zoom level.
//!
//! Coordinates are top-left origin with y growing downward, matching the
//! viewport.

use crate::annotation::{
    Annotation, AnnotationError, AnnotationId, AnnotationKind, AnnotationStore, Transform,
    TransformPatch, MIN_HEIGHT, MIN_SHAPE_SIZE, MIN_WIDTH,
};
use crate::ledger::PageRefId;
use crate::selection::{ArmedTool, SelectionState};
use crate::transform::{
    delta_to_document_space, normalize_degrees, to_document_space, ScreenPoint,
};

/// Default box for a freshly placed text annotation, in points.
const DEFAULT_TEXT_SIZE: (f32, f32) = (200.0, 50.0);
/// Default box for a freshly placed signature, in points.
const DEFAULT_SIGNATURE_SIZE: (f32, f32) = (150.0, 75.0);
/// Default edge for a freshly placed shape, in points.
const DEFAULT_SHAPE_SIZE: f32 = 40.0;

/// Current viewport: zoom scale plus the scroll origin of the page in
/// screen pixels. Gestures subtract the origin and divide by the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub origin: ScreenPoint,
}

impl Viewport {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            origin: ScreenPoint::new(0.0, 0.0),
        }
    }

    pub fn with_origin(scale: f32, origin: ScreenPoint) -> Self {
        Self { scale, origin }
    }
}

/// The eight resize handles around a selected annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDirection {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeDirection {
    fn moves_left_edge(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    fn moves_right_edge(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    fn moves_top_edge(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    fn moves_bottom_edge(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }
}

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerTarget {
    AnnotationBody(AnnotationId),
    ResizeHandle(AnnotationId, ResizeDirection),
    RotateHandle(AnnotationId),
    Canvas { page: PageRefId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Dragging,
    Resizing(ResizeDirection),
    Rotating,
}

/// Result of a pointer press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// A gesture began on an existing annotation, which is now selected.
    GestureStarted(AnnotationId),
    /// An armed tool placed a new annotation, which is now selected.
    Created(AnnotationId),
    /// Empty canvas press with no armed tool: selection cleared.
    Cleared,
    /// Press arrived while a gesture was already active; nothing changed.
    Ignored,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error("no gesture in progress")]
    NoGesture,
}

/// Geometry snapshot taken at press time. Moves are computed against this,
/// never against intermediate state, so clamping cannot accumulate drift.
#[derive(Debug, Clone, Copy)]
struct GestureOrigin {
    annotation: AnnotationId,
    screen: ScreenPoint,
    transform: Transform,
    is_shape: bool,
}

/// Gesture state machine over an [`AnnotationStore`] and [`SelectionState`].
#[derive(Debug, Default)]
pub struct GestureController {
    state: GestureState,
    origin: Option<GestureOrigin>,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Dispatch a pointer press.
    ///
    /// Presses on annotations or handles select and begin a gesture.
    /// Presses on empty canvas either spend the armed tool to place a new
    /// annotation at the press point, or clear the selection. A press while
    /// a gesture is already active is ignored; only release ends a gesture.
    pub fn pointer_down(
        &mut self,
        target: PointerTarget,
        point: ScreenPoint,
        viewport: Viewport,
        store: &mut AnnotationStore,
        selection: &mut SelectionState,
    ) -> Result<PointerOutcome, InteractionError> {
        if self.state != GestureState::Idle {
            return Ok(PointerOutcome::Ignored);
        }
        match target {
            PointerTarget::AnnotationBody(id) => {
                self.begin(id, point, GestureState::Dragging, store, selection)
            }
            PointerTarget::ResizeHandle(id, direction) => {
                self.begin(id, point, GestureState::Resizing(direction), store, selection)
            }
            PointerTarget::RotateHandle(id) => {
                self.begin(id, point, GestureState::Rotating, store, selection)
            }
            PointerTarget::Canvas { page } => {
                match selection.take_armed() {
                    Some(tool) => {
                        let id = store.add(place_annotation(tool, page, point, viewport));
                        selection.select(id);
                        Ok(PointerOutcome::Created(id))
                    }
                    None => {
                        selection.clear();
                        Ok(PointerOutcome::Cleared)
                    }
                }
            }
        }
    }

    fn begin(
        &mut self,
        id: AnnotationId,
        point: ScreenPoint,
        state: GestureState,
        store: &mut AnnotationStore,
        selection: &mut SelectionState,
    ) -> Result<PointerOutcome, InteractionError> {
        let annotation = store.get(id).ok_or(AnnotationError::NotFound(id))?;
        self.origin = Some(GestureOrigin {
            annotation: id,
            screen: point,
            transform: annotation.transform,
            is_shape: matches!(annotation.kind, AnnotationKind::Shape { .. }),
        });
        self.state = state;
        selection.select(id);
        Ok(PointerOutcome::GestureStarted(id))
    }

    /// Apply a pointer move to the active gesture. Returns the updated
    /// transform, or `None` while idle.
    pub fn pointer_move(
        &mut self,
        point: ScreenPoint,
        viewport: Viewport,
        store: &mut AnnotationStore,
    ) -> Result<Option<Transform>, InteractionError> {
        let origin = match (self.state, self.origin) {
            (GestureState::Idle, _) => return Ok(None),
            (_, Some(origin)) => origin,
            (_, None) => return Err(InteractionError::NoGesture),
        };

        let (dx, dy) = delta_to_document_space(
            point.x - origin.screen.x,
            point.y - origin.screen.y,
            viewport.scale,
        );

        let patch = match self.state {
            GestureState::Dragging => TransformPatch::position(
                origin.transform.x + dx,
                origin.transform.y + dy,
            ),
            GestureState::Resizing(direction) => resize_patch(&origin, direction, dx, dy),
            GestureState::Rotating => {
                TransformPatch::rotation(pointer_angle(&origin.transform, point, viewport))
            }
            GestureState::Idle => unreachable!(),
        };

        let transform = store.update_transform(origin.annotation, patch)?;
        Ok(Some(transform))
    }

    /// End the active gesture.
    pub fn pointer_up(&mut self) -> GestureState {
        let finished = self.state;
        self.state = GestureState::Idle;
        self.origin = None;
        finished
    }
}

/// Build the resize patch for one move, keeping the anchor fixed.
///
/// The edge or corner opposite the grabbed handle never moves, even when
/// the result hits the minimum size: position is recomputed from the fixed
/// edge and the clamped extent, not from the raw delta.
fn resize_patch(origin: &GestureOrigin, direction: ResizeDirection, dx: f32, dy: f32) -> TransformPatch {
    let start = origin.transform;
    let right = start.x + start.width;
    let bottom = start.y + start.height;

    let mut width = start.width;
    let mut height = start.height;
    if direction.moves_left_edge() {
        width = start.width - dx;
    } else if direction.moves_right_edge() {
        width = start.width + dx;
    }
    if direction.moves_top_edge() {
        height = start.height - dy;
    } else if direction.moves_bottom_edge() {
        height = start.height + dy;
    }

    if origin.is_shape {
        // Shapes grow by the dominant axis and stay square.
        let size = width.max(height).max(MIN_SHAPE_SIZE);
        width = size;
        height = size;
    } else {
        width = width.max(MIN_WIDTH);
        height = height.max(MIN_HEIGHT);
    }

    TransformPatch {
        x: direction.moves_left_edge().then(|| right - width),
        y: direction.moves_top_edge().then(|| bottom - height),
        width: Some(width),
        height: Some(height),
        rotation_degrees: None,
    }
}

/// Absolute rotation from the pointer's bearing around the annotation
/// center. Straight up is zero; the value is rounded to whole degrees.
fn pointer_angle(transform: &Transform, point: ScreenPoint, viewport: Viewport) -> f32 {
    let center = crate::transform::to_screen_space(
        crate::transform::DocumentPoint::new(
            transform.x + transform.width / 2.0,
            transform.y + transform.height / 2.0,
        ),
        viewport.scale,
        viewport.origin,
    );
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    let degrees = dy.atan2(dx).to_degrees() + 90.0;
    normalize_degrees(degrees.round())
}

fn place_annotation(
    tool: ArmedTool,
    page: PageRefId,
    point: ScreenPoint,
    viewport: Viewport,
) -> Annotation {
    let at = to_document_space(point, viewport.scale, viewport.origin);
    let (kind, (width, height)) = match tool {
        ArmedTool::Text => (AnnotationKind::text(""), DEFAULT_TEXT_SIZE),
        ArmedTool::Signature { image_data } => {
            (AnnotationKind::signature(image_data), DEFAULT_SIGNATURE_SIZE)
        }
        ArmedTool::Shape { shape } => (
            AnnotationKind::shape(shape),
            (DEFAULT_SHAPE_SIZE, DEFAULT_SHAPE_SIZE),
        ),
    };
    Annotation::new(
        Transform::new(page, at.x - width / 2.0, at.y - height / 2.0, width, height),
        kind,
    )
}

/// In-progress text edit on one annotation.
///
/// Commit trims the buffer; an all-whitespace result restores the text the
/// edit started from instead of leaving the annotation empty.
#[derive(Debug)]
pub struct TextEditSession {
    annotation: AnnotationId,
    original: String,
    buffer: String,
}

impl TextEditSession {
    pub fn begin(store: &AnnotationStore, id: AnnotationId) -> Result<Self, InteractionError> {
        let annotation = store.get(id).ok_or(AnnotationError::NotFound(id))?;
        match &annotation.kind {
            AnnotationKind::Text { text, .. } => Ok(Self {
                annotation: id,
                original: text.clone(),
                buffer: text.clone(),
            }),
            _ => Err(AnnotationError::NotText(id).into()),
        }
    }

    pub fn annotation(&self) -> AnnotationId {
        self.annotation
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn set_buffer(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    /// Write the edit back to the store.
    pub fn commit(self, store: &mut AnnotationStore) -> Result<String, InteractionError> {
        let trimmed = self.buffer.trim();
        let text = if trimmed.is_empty() {
            self.original
        } else {
            trimmed.to_string()
        };
        store.set_text(self.annotation, text.clone())?;
        Ok(text)
    }

    /// Abandon the edit, leaving the stored text as it was.
    pub fn cancel(self) -> String {
        self.original
    }
}
