//! Selection and tool arming
//!
//! At most one annotation is selected at a time; selecting one implicitly
//! deselects the previous. Placement tools are armed first and spent by the
//! next canvas click.

use crate::annotation::{Annotation, AnnotationId, ShapeKind};

/// A placement tool waiting for a canvas click.
#[derive(Debug, Clone, PartialEq)]
pub enum ArmedTool {
    Text,
    Signature { image_data: Vec<u8> },
    Shape { shape: ShapeKind },
}

/// Exclusive selection plus the currently armed tool, if any.
#[derive(Debug, Default)]
pub struct SelectionState {
    selected: Option<AnnotationId>,
    armed: Option<ArmedTool>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn is_selected(&self, id: AnnotationId) -> bool {
        self.selected == Some(id)
    }

    /// Select one annotation, displacing any previous selection.
    pub fn select(&mut self, id: AnnotationId) {
        self.selected = Some(id);
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Drop the selection if it points at the given annotation.
    pub fn forget(&mut self, id: AnnotationId) {
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    pub fn armed(&self) -> Option<&ArmedTool> {
        self.armed.as_ref()
    }

    pub fn arm(&mut self, tool: ArmedTool) {
        self.armed = Some(tool);
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Consume the armed tool. Arming is one-shot: the next canvas click
    /// spends it.
    pub fn take_armed(&mut self) -> Option<ArmedTool> {
        self.armed.take()
    }

    /// Draw order for a page: insertion order with the selected annotation
    /// moved last so it paints on top.
    pub fn render_order<'a>(&self, annotations: Vec<&'a Annotation>) -> Vec<&'a Annotation> {
        let Some(selected) = self.selected else {
            return annotations;
        };
        let (mut rest, on_top): (Vec<_>, Vec<_>) = annotations
            .into_iter()
            .partition(|annotation| annotation.id != selected);
        rest.extend(on_top);
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, Transform};

    fn annotation() -> Annotation {
        Annotation::new(
            Transform::new(uuid::Uuid::new_v4(), 0.0, 0.0, 200.0, 50.0),
            AnnotationKind::text("x"),
        )
    }

    #[test]
    fn selection_is_exclusive() {
        let mut selection = SelectionState::new();
        let first = annotation();
        let second = annotation();

        selection.select(first.id);
        assert!(selection.is_selected(first.id));

        selection.select(second.id);
        assert!(!selection.is_selected(first.id));
        assert!(selection.is_selected(second.id));
    }

    #[test]
    fn forget_only_drops_matching_selection() {
        let mut selection = SelectionState::new();
        let kept = annotation();
        selection.select(kept.id);

        selection.forget(uuid::Uuid::new_v4());
        assert!(selection.is_selected(kept.id));

        selection.forget(kept.id);
        assert_eq!(selection.selected(), None);
    }

    #[test]
    fn armed_tool_is_one_shot() {
        let mut selection = SelectionState::new();
        selection.arm(ArmedTool::Text);
        assert!(matches!(selection.take_armed(), Some(ArmedTool::Text)));
        assert!(selection.take_armed().is_none());
    }

    #[test]
    fn selected_annotation_renders_last() {
        let mut selection = SelectionState::new();
        let a = annotation();
        let b = annotation();
        let c = annotation();
        selection.select(b.id);

        let ordered = selection.render_order(vec![&a, &b, &c]);
        let ids: Vec<AnnotationId> = ordered.iter().map(|ann| ann.id).collect();
        assert_eq!(ids, vec![a.id, c.id, b.id]);
    }
}
