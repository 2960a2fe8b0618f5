//! PDF Composer Engine Library
//!
//! The two external collaborators of the composer core, consumed only
//! through their traits:
//!
//! - [`RenderService`]: open a document from bytes and rasterize pages at a
//!   scale and rotation, with cooperative cancellation.
//! - [`AssemblyService`]: byte-level page copying between documents, used by
//!   the merge engine to build the output composition.
//!
//! Both ship a `lopdf`-backed default implementation. The renderer produces
//! geometry-accurate placeholder surfaces; a GPU or pdfium backend can stand
//! in behind the same trait.

mod assembly;
mod render;

pub use assembly::{AssemblyHandle, AssemblyService, CopiedPage, LopdfAssembly};
pub use render::{
    DocumentHandle, EngineConfig, LopdfRenderer, PageSize, RasterSurface, RenderOutcome,
    RenderService, RgbaImage,
};

/// Errors from the rendering and assembly services.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The input bytes are not a document this engine can read. Reported
    /// per file; other files in a batch are unaffected.
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),

    /// Rejected before parsing: the input exceeds the configured size limit.
    #[error("input of {actual} bytes exceeds the {limit} byte limit")]
    OversizeInput { actual: u64, limit: u64 },

    /// The handle does not refer to an open document.
    #[error("invalid handle {0}")]
    InvalidHandle(u64),

    /// The requested page does not exist in the document.
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// A page-copy or serialization step failed during assembly.
    #[error("assembly error: {0}")]
    Assembly(String),
}
