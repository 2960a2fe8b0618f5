//! Editing session
//!
//! Owns the whole composition state for one editing workspace: loaded
//! sources, the page ledger, annotations, selection, the gesture machine,
//! and the live preview. Callers drive it with commands and an explicit
//! clock, which keeps every timing rule testable.

use crate::annotation::{Annotation, AnnotationError, AnnotationId, AnnotationStore};
use crate::interaction::{
    GestureController, GestureState, InteractionError, PointerOutcome, PointerTarget,
    TextEditSession, Viewport,
};
use crate::ledger::{DocumentId, LedgerError, PageLedger, PageRef, PageRefId};
use crate::merge::{merge_composition, MergeError};
use crate::preview::{LivePreview, PreviewConfig};
use crate::selection::{ArmedTool, SelectionState};
use crate::transform::ScreenPoint;
use pdf_composer_engine::{
    AssemblyHandle, AssemblyService, DocumentHandle, EngineError, RenderOutcome, RenderService,
};
use pdf_composer_scheduler::{RenderCoordinator, RenderRequest, ViewportKey};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("unknown document {0}")]
    UnknownDocument(DocumentId),
}

/// One loaded source document.
#[derive(Debug)]
pub struct SourceDocument {
    id: DocumentId,
    name: String,
    page_count: u32,
    render: DocumentHandle,
    assembly: AssemblyHandle,
}

impl SourceDocument {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}

/// Complete state of one editing workspace.
pub struct EditorSession<R: RenderService, A: AssemblyService> {
    renderer: R,
    assembly: A,
    sources: HashMap<DocumentId, SourceDocument>,
    next_document_id: DocumentId,
    ledger: PageLedger,
    annotations: AnnotationStore,
    selection: SelectionState,
    gestures: GestureController,
    preview: LivePreview,
    render_slots: RenderCoordinator,
}

impl<R: RenderService, A: AssemblyService> EditorSession<R, A> {
    pub fn new(renderer: R, assembly: A, preview: PreviewConfig) -> Self {
        Self {
            renderer,
            assembly,
            sources: HashMap::new(),
            next_document_id: 0,
            ledger: PageLedger::new(),
            annotations: AnnotationStore::new(),
            selection: SelectionState::new(),
            gestures: GestureController::new(),
            preview: LivePreview::new(preview),
            render_slots: RenderCoordinator::new(),
        }
    }

    // ---- sources ----------------------------------------------------------

    /// Load a batch of files. Each file succeeds or fails on its own; one
    /// unreadable input never blocks the rest of the batch.
    pub fn load_documents<I>(
        &mut self,
        files: I,
        now: Instant,
    ) -> Vec<(String, Result<DocumentId, SessionError>)>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        files
            .into_iter()
            .map(|(name, bytes)| {
                let result = self.load_document(&name, &bytes, now);
                if let Err(err) = &result {
                    warn!(name = %name, %err, "document rejected");
                }
                (name, result)
            })
            .collect()
    }

    fn load_document(
        &mut self,
        name: &str,
        bytes: &[u8],
        now: Instant,
    ) -> Result<DocumentId, SessionError> {
        let render = self.renderer.open(bytes)?;
        let assembly = match self.assembly.open(bytes) {
            Ok(handle) => handle,
            Err(err) => {
                let _ = self.renderer.close(render);
                return Err(err.into());
            }
        };
        let page_count = self.renderer.page_count(render)?;

        self.next_document_id += 1;
        let id = self.next_document_id;
        self.sources.insert(
            id,
            SourceDocument {
                id,
                name: name.to_string(),
                page_count,
                render,
                assembly,
            },
        );
        self.ledger.load_document(id, page_count);
        self.preview.note_mutation(now);
        info!(name, id, page_count, "document loaded");
        Ok(id)
    }

    /// Drop a source and everything that referenced it: its ledger entries,
    /// deleted ones included, and the annotations on those pages.
    pub fn remove_document(&mut self, id: DocumentId, now: Instant) -> Result<(), SessionError> {
        let source = self
            .sources
            .remove(&id)
            .ok_or(SessionError::UnknownDocument(id))?;

        for page in self.ledger.remove_document(id) {
            let orphaned: Vec<AnnotationId> = self
                .annotations
                .on_page(page)
                .iter()
                .map(|annotation| annotation.id)
                .collect();
            for annotation in orphaned {
                self.selection.forget(annotation);
                self.annotations.remove(annotation)?;
            }
        }

        self.renderer.close(source.render)?;
        self.preview.note_mutation(now);
        info!(id, name = %source.name, "document removed");
        Ok(())
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceDocument> {
        self.sources.values()
    }

    // ---- pages ------------------------------------------------------------

    pub fn rotate_page(
        &mut self,
        page: PageRefId,
        delta_degrees: i32,
        now: Instant,
    ) -> Result<u16, SessionError> {
        let rotation = self.ledger.rotate(page, delta_degrees)?;
        self.preview.note_mutation(now);
        Ok(rotation)
    }

    pub fn duplicate_page(
        &mut self,
        page: PageRefId,
        now: Instant,
    ) -> Result<PageRefId, SessionError> {
        let copy = self.ledger.duplicate(page)?;
        self.preview.note_mutation(now);
        Ok(copy)
    }

    pub fn delete_page(&mut self, page: PageRefId, now: Instant) -> Result<(), SessionError> {
        self.ledger.delete(page)?;
        self.preview.note_mutation(now);
        Ok(())
    }

    pub fn undelete_page(&mut self, page: PageRefId, now: Instant) -> Result<(), SessionError> {
        self.ledger.undelete(page)?;
        self.preview.note_mutation(now);
        Ok(())
    }

    pub fn reorder_pages(
        &mut self,
        order: &[PageRefId],
        now: Instant,
    ) -> Result<(), SessionError> {
        self.ledger.reorder(order)?;
        self.preview.note_mutation(now);
        Ok(())
    }

    /// Visible pages in composition order.
    pub fn pages(&self) -> Vec<PageRef> {
        self.ledger.display_pages()
    }

    pub fn page(&self, id: PageRefId) -> Result<PageRef, SessionError> {
        Ok(*self.ledger.get(id)?)
    }

    // ---- annotations ------------------------------------------------------

    /// Add an annotation directly, bypassing the pointer flow. The new
    /// annotation is selected like any other fresh placement.
    pub fn add_annotation(&mut self, annotation: Annotation, now: Instant) -> AnnotationId {
        let id = self.annotations.add(annotation);
        self.selection.select(id);
        self.preview.note_mutation(now);
        id
    }

    pub fn update_annotation(
        &mut self,
        id: AnnotationId,
        patch: crate::annotation::TransformPatch,
        now: Instant,
    ) -> Result<(), SessionError> {
        self.annotations.update_transform(id, patch)?;
        self.preview.note_mutation(now);
        Ok(())
    }

    pub fn arm_tool(&mut self, tool: ArmedTool) {
        self.selection.arm(tool);
    }

    pub fn disarm_tool(&mut self) {
        self.selection.disarm();
    }

    pub fn pointer_down(
        &mut self,
        target: PointerTarget,
        point: ScreenPoint,
        viewport: Viewport,
        now: Instant,
    ) -> Result<PointerOutcome, SessionError> {
        let outcome = self.gestures.pointer_down(
            target,
            point,
            viewport,
            &mut self.annotations,
            &mut self.selection,
        )?;
        if matches!(outcome, PointerOutcome::Created(_)) {
            self.preview.note_mutation(now);
        }
        Ok(outcome)
    }

    pub fn pointer_move(
        &mut self,
        point: ScreenPoint,
        viewport: Viewport,
        now: Instant,
    ) -> Result<(), SessionError> {
        if self
            .gestures
            .pointer_move(point, viewport, &mut self.annotations)?
            .is_some()
        {
            self.preview.note_mutation(now);
        }
        Ok(())
    }

    pub fn pointer_up(&mut self) -> GestureState {
        self.gestures.pointer_up()
    }

    pub fn begin_text_edit(&self, id: AnnotationId) -> Result<TextEditSession, SessionError> {
        Ok(TextEditSession::begin(&self.annotations, id)?)
    }

    pub fn commit_text_edit(
        &mut self,
        edit: TextEditSession,
        now: Instant,
    ) -> Result<String, SessionError> {
        let text = edit.commit(&mut self.annotations)?;
        self.preview.note_mutation(now);
        Ok(text)
    }

    pub fn remove_annotation(&mut self, id: AnnotationId, now: Instant) -> Result<(), SessionError> {
        self.selection.forget(id);
        self.annotations.remove(id)?;
        self.preview.note_mutation(now);
        Ok(())
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    /// Annotations on one page in draw order, selected one last.
    pub fn annotations_on_page(&self, page: PageRefId) -> Vec<&Annotation> {
        self.selection.render_order(self.annotations.on_page(page))
    }

    pub fn selected_annotation(&self) -> Option<AnnotationId> {
        self.selection.selected()
    }

    // ---- rendering --------------------------------------------------------

    /// Render one page at the given scale, superseding any render still in
    /// flight for the same page slot.
    pub fn render_page(
        &mut self,
        page: PageRefId,
        scale: f32,
    ) -> Result<RenderOutcome, SessionError> {
        let page_ref = *self.ledger.get(page)?;
        let source = self
            .sources
            .get(&page_ref.source)
            .ok_or(SessionError::UnknownDocument(page_ref.source))?;

        let key = ViewportKey {
            document_id: page_ref.source,
            page_index: page_ref.original_page_number - 1,
        };
        let request = RenderRequest {
            zoom_percent: (scale * 100.0).round() as u16,
            rotation_degrees: page_ref.rotation_degrees,
        };
        let ticket = self.render_slots.begin(key, request);
        let outcome = self.renderer.render_page(
            source.render,
            page_ref.original_page_number - 1,
            scale,
            page_ref.rotation_degrees,
            &ticket.token,
        )?;
        self.render_slots.finish(key, ticket.generation);
        Ok(outcome)
    }

    // ---- merge and preview ------------------------------------------------

    fn assembly_handles(&self) -> HashMap<DocumentId, AssemblyHandle> {
        self.sources
            .iter()
            .map(|(&id, source)| (id, source.assembly))
            .collect()
    }

    /// Merge the current composition into output bytes immediately.
    pub fn export(&mut self) -> Result<Vec<u8>, SessionError> {
        let pages = self.ledger.display_pages();
        let handles = self.assembly_handles();
        Ok(merge_composition(&mut self.assembly, &pages, &handles)?)
    }

    /// Advance the live preview clock. When the quiet period after the last
    /// mutation has elapsed, re-merges and publishes the result.
    pub fn poll_preview(&mut self, now: Instant) -> Result<(), SessionError> {
        let Some(job) = self.preview.poll(now) else {
            return Ok(());
        };

        let pages = self.ledger.display_pages();
        let handles = self.assembly_handles();
        match merge_composition(&mut self.assembly, &pages, &handles) {
            Ok(bytes) => {
                self.preview.complete(job.generation, bytes);
                Ok(())
            }
            Err(MergeError::EmptyComposition) => {
                // Nothing to show is not a failure while editing.
                self.preview.fail(job.generation);
                Ok(())
            }
            Err(err) => {
                self.preview.fail(job.generation);
                Err(err.into())
            }
        }
    }

    /// The most recently published preview bytes, if any.
    pub fn preview_output(&self) -> Option<&[u8]> {
        self.preview.last_output()
    }

    /// Whether a preview re-merge is scheduled or running.
    pub fn preview_pending(&self) -> bool {
        self.preview.is_pending()
    }
}
