//! Composition merge
//!
//! Walks the visible page sequence and drives an [`AssemblyService`] to
//! produce one output document: copy each referenced native page, bake the
//! composition rotation on top of its intrinsic rotation, append in order,
//! serialize. Source documents are never modified.

use crate::ledger::{DocumentId, PageRef};
use pdf_composer_engine::{AssemblyHandle, AssemblyService, EngineError};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("nothing to merge")]
    EmptyComposition,
    #[error("no open source document {0}")]
    MissingSource(DocumentId),
    #[error("merge failed: {0}")]
    MergeFailed(#[from] EngineError),
}

/// Merge the given pages into a single document and return its bytes.
///
/// `sources` maps each loaded document to its assembly handle. Deleted
/// entries in `pages` are skipped; an identical input always produces an
/// identical page sequence in the output.
pub fn merge_composition<A: AssemblyService>(
    assembly: &mut A,
    pages: &[PageRef],
    sources: &HashMap<DocumentId, AssemblyHandle>,
) -> Result<Vec<u8>, MergeError> {
    let live: Vec<&PageRef> = pages.iter().filter(|page| !page.deleted).collect();
    if live.is_empty() {
        return Err(MergeError::EmptyComposition);
    }

    let target = assembly.create_empty()?;
    for page in &live {
        let source = *sources
            .get(&page.source)
            .ok_or(MergeError::MissingSource(page.source))?;
        let copied = assembly.copy_page(source, page.original_page_number, target)?;

        // Composition rotation stacks on whatever the native page carried.
        let intrinsic = assembly.rotation(copied)?;
        let combined = (intrinsic + page.rotation_degrees as i32).rem_euclid(360);
        if combined != intrinsic {
            assembly.set_rotation(copied, combined)?;
        }
        assembly.append_page(target, copied)?;
    }

    let bytes = assembly.save(target)?;
    info!(pages = live.len(), bytes = bytes.len(), "composition merged");
    Ok(bytes)
}
