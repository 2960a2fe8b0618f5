//! Annotation data model
//!
//! Text boxes, signature stamps, and vector shapes overlaid on pages. All
//! geometry is kept in page-local document space (points) so that zoom and
//! scroll never touch persisted state.

use crate::ledger::PageRefId;
use crate::transform::normalize_degrees;
use std::collections::HashMap;

/// Unique identifier for an annotation.
///
/// Generated with UUID v4, stable for the annotation's lifetime.
pub type AnnotationId = uuid::Uuid;

/// Minimum annotation box width, in points.
pub const MIN_WIDTH: f32 = 30.0;
/// Minimum annotation box height, in points.
pub const MIN_HEIGHT: f32 = 20.0;
/// Minimum edge length for square shape annotations, in points.
pub const MIN_SHAPE_SIZE: f32 = 20.0;

/// Text shown for a text annotation whose content is empty.
pub const PLACEHOLDER_TEXT: &str = "Insert text";

/// RGBA color for annotation fills and strokes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };
}

/// Horizontal alignment of text inside its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Shape annotation variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Checkmark,
    Cross,
    Circle,
    Square,
}

/// Placement of an annotation on its page.
///
/// `rotation_degrees` is always kept in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub page: PageRefId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation_degrees: f32,
}

impl Transform {
    pub fn new(page: PageRefId, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            page,
            x,
            y,
            width: width.max(MIN_WIDTH),
            height: height.max(MIN_HEIGHT),
            rotation_degrees: 0.0,
        }
    }
}

/// Partial update to a transform. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub rotation_degrees: Option<f32>,
}

impl TransformPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn rotation(degrees: f32) -> Self {
        Self {
            rotation_degrees: Some(degrees),
            ..Self::default()
        }
    }
}

/// Type-specific annotation payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationKind {
    Text {
        text: String,
        font_family: String,
        font_size: f32,
        color: Color,
        bold: bool,
        italic: bool,
        underline: bool,
        align: TextAlign,
        background: Color,
        /// Background opacity, clamped to `0..=100`.
        opacity_percent: u8,
    },
    Signature {
        /// Encoded raster image of the captured signature.
        image_data: Vec<u8>,
    },
    Shape {
        shape: ShapeKind,
        stroke_color: Color,
        stroke_width: f32,
    },
}

impl AnnotationKind {
    pub fn text(content: impl Into<String>) -> Self {
        AnnotationKind::Text {
            text: content.into(),
            font_family: "Helvetica".to_string(),
            font_size: 14.0,
            color: Color::BLACK,
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
            background: Color::TRANSPARENT,
            opacity_percent: 100,
        }
    }

    pub fn signature(image_data: Vec<u8>) -> Self {
        AnnotationKind::Signature { image_data }
    }

    pub fn shape(shape: ShapeKind) -> Self {
        AnnotationKind::Shape {
            shape,
            stroke_color: Color::BLACK,
            stroke_width: 2.0,
        }
    }

    fn is_shape(&self) -> bool {
        matches!(self, AnnotationKind::Shape { .. })
    }
}

/// One annotation: identity, placement, payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub transform: Transform,
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn new(transform: Transform, kind: AnnotationKind) -> Self {
        let mut annotation = Self {
            id: uuid::Uuid::new_v4(),
            transform,
            kind,
        };
        annotation.clamp_geometry();
        annotation
    }

    /// Shapes stay square: one size scalar drives both edges.
    pub fn size(&self) -> f32 {
        self.transform.width.max(self.transform.height)
    }

    fn clamp_geometry(&mut self) {
        if self.kind.is_shape() {
            let size = self.size().max(MIN_SHAPE_SIZE);
            self.transform.width = size;
            self.transform.height = size;
        } else {
            self.transform.width = self.transform.width.max(MIN_WIDTH);
            self.transform.height = self.transform.height.max(MIN_HEIGHT);
        }
        self.transform.rotation_degrees = normalize_degrees(self.transform.rotation_degrees);
        if let AnnotationKind::Text { opacity_percent, .. } = &mut self.kind {
            *opacity_percent = (*opacity_percent).min(100);
        }
    }

    /// Effective text content, falling back to the placeholder when empty.
    pub fn display_text(&self) -> Option<&str> {
        match &self.kind {
            AnnotationKind::Text { text, .. } => {
                if text.trim().is_empty() {
                    Some(PLACEHOLDER_TEXT)
                } else {
                    Some(text)
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("annotation {0} is not a text annotation")]
    NotText(AnnotationId),
}

/// Owning collection of annotations with a per-page index.
///
/// Per-page iteration order is insertion order, which doubles as z-order
/// when drawing.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    annotations: HashMap<AnnotationId, Annotation>,
    by_page: HashMap<PageRefId, Vec<AnnotationId>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id;
        let page = annotation.transform.page;
        self.by_page.entry(page).or_default().push(id);
        self.annotations.insert(id, annotation);
        tracing::debug!(%id, %page, "annotation added");
        id
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Apply a partial geometry update, then re-clamp.
    ///
    /// Undersized widths and heights are clamped rather than rejected, and
    /// rotations are wrapped into `[0, 360)`.
    pub fn update_transform(
        &mut self,
        id: AnnotationId,
        patch: TransformPatch,
    ) -> Result<Transform, AnnotationError> {
        let annotation = self
            .annotations
            .get_mut(&id)
            .ok_or(AnnotationError::NotFound(id))?;

        if let Some(x) = patch.x {
            annotation.transform.x = x;
        }
        if let Some(y) = patch.y {
            annotation.transform.y = y;
        }
        if let Some(width) = patch.width {
            annotation.transform.width = width;
        }
        if let Some(height) = patch.height {
            annotation.transform.height = height;
        }
        if let Some(rotation) = patch.rotation_degrees {
            annotation.transform.rotation_degrees = rotation;
        }
        annotation.clamp_geometry();
        Ok(annotation.transform)
    }

    pub fn set_text(
        &mut self,
        id: AnnotationId,
        text: impl Into<String>,
    ) -> Result<(), AnnotationError> {
        let annotation = self
            .annotations
            .get_mut(&id)
            .ok_or(AnnotationError::NotFound(id))?;
        match &mut annotation.kind {
            AnnotationKind::Text { text: current, .. } => {
                *current = text.into();
                Ok(())
            }
            _ => Err(AnnotationError::NotText(id)),
        }
    }

    /// Edit the type-specific payload in place, then re-clamp.
    pub fn modify_kind<F>(&mut self, id: AnnotationId, edit: F) -> Result<(), AnnotationError>
    where
        F: FnOnce(&mut AnnotationKind),
    {
        let annotation = self
            .annotations
            .get_mut(&id)
            .ok_or(AnnotationError::NotFound(id))?;
        edit(&mut annotation.kind);
        annotation.clamp_geometry();
        Ok(())
    }

    pub fn remove(&mut self, id: AnnotationId) -> Result<Annotation, AnnotationError> {
        let annotation = self
            .annotations
            .remove(&id)
            .ok_or(AnnotationError::NotFound(id))?;
        if let Some(ids) = self.by_page.get_mut(&annotation.transform.page) {
            ids.retain(|candidate| *candidate != id);
        }
        tracing::debug!(%id, "annotation removed");
        Ok(annotation)
    }

    /// Annotations on one page, in insertion order.
    ///
    /// Pages are addressed by composition id, so annotations on a deleted
    /// page simply stop being asked for. They are never discarded here and
    /// come back verbatim if the page is restored.
    pub fn on_page(&self, page: PageRefId) -> Vec<&Annotation> {
        self.by_page
            .get(&page)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.annotations.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageRefId {
        uuid::Uuid::new_v4()
    }

    fn text_annotation(page: PageRefId) -> Annotation {
        Annotation::new(
            Transform::new(page, 100.0, 100.0, 200.0, 50.0),
            AnnotationKind::text("hello"),
        )
    }

    #[test]
    fn undersized_boxes_are_clamped_not_rejected() {
        let mut store = AnnotationStore::new();
        let id = store.add(text_annotation(page()));

        let transform = store
            .update_transform(
                id,
                TransformPatch {
                    width: Some(5.0),
                    height: Some(1.0),
                    ..TransformPatch::default()
                },
            )
            .unwrap();

        assert_eq!(transform.width, MIN_WIDTH);
        assert_eq!(transform.height, MIN_HEIGHT);
    }

    #[test]
    fn rotation_is_normalized_on_update() {
        let mut store = AnnotationStore::new();
        let id = store.add(text_annotation(page()));

        let transform = store
            .update_transform(id, TransformPatch::rotation(-90.0))
            .unwrap();
        assert_eq!(transform.rotation_degrees, 270.0);

        let transform = store
            .update_transform(id, TransformPatch::rotation(450.0))
            .unwrap();
        assert_eq!(transform.rotation_degrees, 90.0);
    }

    #[test]
    fn shapes_stay_square_under_resize() {
        let mut store = AnnotationStore::new();
        let id = store.add(Annotation::new(
            Transform::new(page(), 0.0, 0.0, 40.0, 40.0),
            AnnotationKind::shape(ShapeKind::Circle),
        ));

        let transform = store
            .update_transform(
                id,
                TransformPatch {
                    width: Some(90.0),
                    height: Some(30.0),
                    ..TransformPatch::default()
                },
            )
            .unwrap();
        assert_eq!(transform.width, 90.0);
        assert_eq!(transform.height, 90.0);

        let transform = store
            .update_transform(
                id,
                TransformPatch {
                    width: Some(4.0),
                    height: Some(4.0),
                    ..TransformPatch::default()
                },
            )
            .unwrap();
        assert_eq!(transform.width, MIN_SHAPE_SIZE);
        assert_eq!(transform.height, MIN_SHAPE_SIZE);
    }

    #[test]
    fn empty_text_shows_placeholder() {
        let annotation = Annotation::new(
            Transform::new(page(), 0.0, 0.0, 200.0, 50.0),
            AnnotationKind::text("   "),
        );
        assert_eq!(annotation.display_text(), Some(PLACEHOLDER_TEXT));

        let annotation = Annotation::new(
            Transform::new(page(), 0.0, 0.0, 200.0, 50.0),
            AnnotationKind::text("signed"),
        );
        assert_eq!(annotation.display_text(), Some("signed"));
    }

    #[test]
    fn per_page_order_is_insertion_order() {
        let mut store = AnnotationStore::new();
        let target = page();
        let other = page();

        let first = store.add(text_annotation(target));
        store.add(text_annotation(other));
        let second = store.add(text_annotation(target));

        let ids: Vec<AnnotationId> = store.on_page(target).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn remove_detaches_from_page_index() {
        let mut store = AnnotationStore::new();
        let target = page();
        let id = store.add(text_annotation(target));

        store.remove(id).unwrap();
        assert!(store.on_page(target).is_empty());
        assert_eq!(store.remove(id), Err(AnnotationError::NotFound(id)));
    }

    #[test]
    fn set_text_rejects_non_text_annotations() {
        let mut store = AnnotationStore::new();
        let id = store.add(Annotation::new(
            Transform::new(page(), 0.0, 0.0, 40.0, 40.0),
            AnnotationKind::shape(ShapeKind::Checkmark),
        ));
        assert_eq!(
            store.set_text(id, "nope"),
            Err(AnnotationError::NotText(id))
        );
    }

    #[test]
    fn modify_kind_reclamps_the_payload() {
        let mut store = AnnotationStore::new();
        let id = store.add(text_annotation(page()));

        store
            .modify_kind(id, |kind| {
                if let AnnotationKind::Text { opacity_percent, bold, .. } = kind {
                    *opacity_percent = 200;
                    *bold = true;
                }
            })
            .unwrap();

        match &store.get(id).unwrap().kind {
            AnnotationKind::Text { opacity_percent, bold, .. } => {
                assert_eq!(*opacity_percent, 100);
                assert!(*bold);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn opacity_is_clamped_to_percent_range() {
        let mut kind = AnnotationKind::text("x");
        if let AnnotationKind::Text { opacity_percent, .. } = &mut kind {
            *opacity_percent = 250;
        }
        let annotation = Annotation::new(Transform::new(page(), 0.0, 0.0, 200.0, 50.0), kind);
        match annotation.kind {
            AnnotationKind::Text { opacity_percent, .. } => assert_eq!(opacity_percent, 100),
            _ => unreachable!(),
        }
    }

    #[test]
    fn annotations_survive_round_trip_through_json() {
        let annotation = Annotation::new(
            Transform::new(page(), 72.0, 144.0, 200.0, 50.0),
            AnnotationKind::text("sign here"),
        );
        let json = serde_json::to_string(&annotation).unwrap();
        let back: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, annotation);
    }
}
