//! Coordinate transforms between screen space and document space
//!
//! Document space is page-local, in points, and zoom-independent. All
//! persisted geometry lives there; screen coordinates exist only at the
//! edge of a gesture.

/// Lower bound on the viewport scale factor.
///
/// Keeps screen-to-document division well away from zero.
pub const MIN_SCALE: f32 = 0.08;

/// A point in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point in page-local document space, in points.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentPoint {
    pub x: f32,
    pub y: f32,
}

impl DocumentPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Clamp a viewport scale to its usable range.
pub fn effective_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.max(MIN_SCALE)
    } else {
        MIN_SCALE
    }
}

/// Map a screen point into document space at the given viewport scale and
/// scroll origin.
pub fn to_document_space(point: ScreenPoint, scale: f32, origin: ScreenPoint) -> DocumentPoint {
    let scale = effective_scale(scale);
    DocumentPoint::new((point.x - origin.x) / scale, (point.y - origin.y) / scale)
}

/// Map a document point into screen space at the given viewport scale and
/// scroll origin. Exact inverse of [`to_document_space`] within epsilon.
pub fn to_screen_space(point: DocumentPoint, scale: f32, origin: ScreenPoint) -> ScreenPoint {
    let scale = effective_scale(scale);
    ScreenPoint::new(point.x * scale + origin.x, point.y * scale + origin.y)
}

/// Convert a screen-pixel delta into a document-space delta.
pub fn delta_to_document_space(dx: f32, dy: f32, scale: f32) -> (f32, f32) {
    let scale = effective_scale(scale);
    (dx / scale, dy / scale)
}

/// Normalize an annotation angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Normalize a page rotation into `[0, 360)`.
///
/// Page rotations are stored as whole degrees; deltas arrive as signed
/// steps (quarter turns from the UI) and wrap on accumulation.
pub fn normalize_page_degrees(degrees: i32) -> u16 {
    degrees.rem_euclid(360) as u16
}
