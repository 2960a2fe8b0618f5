//! PDF Composer Core Library
//!
//! Composition state model: annotations, the page ledger, pointer
//! interaction, and the merge that turns a composition into one output
//! document.

pub mod annotation;
pub mod interaction;
pub mod ledger;
pub mod merge;
pub mod preview;
pub mod selection;
pub mod session;
pub mod transform;

pub use annotation::{
    Annotation, AnnotationError, AnnotationId, AnnotationKind, AnnotationStore, Color, ShapeKind,
    TextAlign, Transform, TransformPatch, MIN_HEIGHT, MIN_SHAPE_SIZE, MIN_WIDTH, PLACEHOLDER_TEXT,
};
pub use interaction::{
    GestureController, GestureState, InteractionError, PointerOutcome, PointerTarget,
    ResizeDirection, TextEditSession, Viewport,
};
pub use ledger::{DocumentId, LedgerError, PageLedger, PageRef, PageRefId};
pub use merge::{merge_composition, MergeError};
pub use preview::{LivePreview, PreviewConfig, PreviewJob, DEFAULT_QUIET_PERIOD};
pub use selection::{ArmedTool, SelectionState};
pub use session::{EditorSession, SessionError, SourceDocument};
pub use transform::{
    normalize_degrees, normalize_page_degrees, to_document_space, to_screen_space, DocumentPoint,
    ScreenPoint, MIN_SCALE,
};
