//! Page ledger
//!
//! The composition is an ordered sequence of page references. Each entry
//! points back at one native page of one loaded source document and carries
//! the composition-local state layered on top of it: rotation and a soft
//! deletion flag. Native pages are never touched; every manipulation is an
//! edit to this ledger.

use crate::transform::normalize_page_degrees;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Identifier of a loaded source document.
pub type DocumentId = u64;

/// Identifier of one page entry in the composition.
///
/// Distinct from page position: ids are stable across reorder, rotation,
/// and deletion.
pub type PageRefId = uuid::Uuid;

/// One entry in the composition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageRef {
    pub id: PageRefId,
    pub source: DocumentId,
    /// 1-based page number in the source document. Never changes, no matter
    /// how the composition is rearranged.
    pub original_page_number: u32,
    /// Composition-local rotation in degrees, normalized to `[0, 360)`.
    /// UI rotation commands step in quarter turns, but any delta is
    /// accepted.
    pub rotation_degrees: u16,
    /// Soft deletion flag. Deleted entries keep their slot and state.
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("unknown page {0}")]
    UnknownPage(PageRefId),
    #[error("page {0} is deleted")]
    PageDeleted(PageRefId),
    #[error("page {0} is not deleted")]
    PageNotDeleted(PageRefId),
    #[error("reorder is not a permutation of the visible pages")]
    InvalidReorder,
}

/// Ordered collection of page references across all loaded sources.
#[derive(Debug, Default)]
pub struct PageLedger {
    pages: HashMap<PageRefId, PageRef>,
    sequence: Vec<PageRefId>,
}

impl PageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry per native page of a newly loaded source.
    ///
    /// Returns the new entries in source page order.
    pub fn load_document(&mut self, source: DocumentId, page_count: u32) -> Vec<PageRefId> {
        let mut ids = Vec::with_capacity(page_count as usize);
        for page_number in 1..=page_count {
            let id = uuid::Uuid::new_v4();
            self.pages.insert(
                id,
                PageRef {
                    id,
                    source,
                    original_page_number: page_number,
                    rotation_degrees: 0,
                    deleted: false,
                },
            );
            self.sequence.push(id);
            ids.push(id);
        }
        debug!(source, page_count, "document pages entered ledger");
        ids
    }

    pub fn get(&self, id: PageRefId) -> Result<&PageRef, LedgerError> {
        self.pages.get(&id).ok_or(LedgerError::UnknownPage(id))
    }

    fn live_mut(&mut self, id: PageRefId) -> Result<&mut PageRef, LedgerError> {
        let page = self.pages.get_mut(&id).ok_or(LedgerError::UnknownPage(id))?;
        if page.deleted {
            return Err(LedgerError::PageDeleted(id));
        }
        Ok(page)
    }

    /// Add a rotation delta to a visible page. Negative deltas rotate
    /// counter-clockwise; the result is normalized into `[0, 360)`.
    pub fn rotate(&mut self, id: PageRefId, delta_degrees: i32) -> Result<u16, LedgerError> {
        let page = self.live_mut(id)?;
        let rotated = normalize_page_degrees(page.rotation_degrees as i32 + delta_degrees);
        page.rotation_degrees = rotated;
        debug!(%id, rotation = rotated, "page rotated");
        Ok(rotated)
    }

    /// Insert a copy of a visible page directly after it.
    ///
    /// The copy points at the same native page and inherits the current
    /// rotation, but the two entries evolve independently from then on.
    pub fn duplicate(&mut self, id: PageRefId) -> Result<PageRefId, LedgerError> {
        let original = *self.live_mut(id)?;
        let copy_id = uuid::Uuid::new_v4();
        self.pages.insert(
            copy_id,
            PageRef {
                id: copy_id,
                ..original
            },
        );

        let position = self
            .sequence
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or(LedgerError::UnknownPage(id))?;
        self.sequence.insert(position + 1, copy_id);
        debug!(%id, copy = %copy_id, "page duplicated");
        Ok(copy_id)
    }

    /// Mark a visible page deleted. The entry keeps its slot, rotation, and
    /// annotations so that restoring it is loss-free.
    pub fn delete(&mut self, id: PageRefId) -> Result<(), LedgerError> {
        self.live_mut(id)?.deleted = true;
        debug!(%id, "page deleted");
        Ok(())
    }

    /// Restore a deleted page to visibility in its remembered slot.
    pub fn undelete(&mut self, id: PageRefId) -> Result<(), LedgerError> {
        let page = self.pages.get_mut(&id).ok_or(LedgerError::UnknownPage(id))?;
        if !page.deleted {
            return Err(LedgerError::PageNotDeleted(id));
        }
        page.deleted = false;
        debug!(%id, "page restored");
        Ok(())
    }

    /// Replace the visible ordering.
    ///
    /// `order` must be exactly the set of visible page ids. On any
    /// violation the sequence is left untouched. Deleted entries keep their
    /// position relative to the visible page that preceded them.
    pub fn reorder(&mut self, order: &[PageRefId]) -> Result<(), LedgerError> {
        let visible: Vec<PageRefId> = self
            .sequence
            .iter()
            .copied()
            .filter(|id| !self.pages[id].deleted)
            .collect();

        if order.len() != visible.len() {
            return Err(LedgerError::InvalidReorder);
        }
        let requested: HashSet<PageRefId> = order.iter().copied().collect();
        if requested.len() != order.len()
            || !visible.iter().all(|id| requested.contains(id))
        {
            return Err(LedgerError::InvalidReorder);
        }

        // Deleted entries ride along with the visible page before them.
        let mut trailing: HashMap<Option<PageRefId>, Vec<PageRefId>> = HashMap::new();
        let mut anchor = None;
        for &id in &self.sequence {
            if self.pages[&id].deleted {
                trailing.entry(anchor).or_default().push(id);
            } else {
                anchor = Some(id);
            }
        }

        let mut sequence = Vec::with_capacity(self.sequence.len());
        if let Some(orphans) = trailing.remove(&None) {
            sequence.extend(orphans);
        }
        for &id in order {
            sequence.push(id);
            if let Some(followers) = trailing.remove(&Some(id)) {
                sequence.extend(followers);
            }
        }
        self.sequence = sequence;
        debug!(pages = order.len(), "pages reordered");
        Ok(())
    }

    /// Physically drop every entry belonging to one source.
    ///
    /// Unlike deletion this is not reversible. Returns the removed ids so
    /// callers can retire dependent state.
    pub fn remove_document(&mut self, source: DocumentId) -> Vec<PageRefId> {
        let removed: Vec<PageRefId> = self
            .sequence
            .iter()
            .copied()
            .filter(|id| self.pages[id].source == source)
            .collect();
        self.sequence.retain(|id| self.pages[id].source != source);
        for id in &removed {
            self.pages.remove(id);
        }
        debug!(source, removed = removed.len(), "document removed");
        removed
    }

    /// Visible pages in composition order. This is the merge input.
    pub fn display_pages(&self) -> Vec<PageRef> {
        self.sequence
            .iter()
            .filter_map(|id| self.pages.get(id))
            .filter(|page| !page.deleted)
            .copied()
            .collect()
    }

    /// Every entry, deleted included, in sequence order.
    pub fn all_pages(&self) -> Vec<PageRef> {
        self.sequence
            .iter()
            .filter_map(|id| self.pages.get(id))
            .copied()
            .collect()
    }

    pub fn visible_len(&self) -> usize {
        self.sequence
            .iter()
            .filter(|id| !self.pages[*id].deleted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(pages: u32) -> (PageLedger, Vec<PageRefId>) {
        let mut ledger = PageLedger::new();
        let ids = ledger.load_document(1, pages);
        (ledger, ids)
    }

    #[test]
    fn loading_preserves_source_page_order() {
        let (ledger, ids) = ledger_with(3);
        let numbers: Vec<u32> = ledger
            .display_pages()
            .iter()
            .map(|page| page.original_page_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(ledger.display_pages().len(), ids.len());
    }

    #[test]
    fn rotation_composes_and_wraps() {
        let (mut ledger, ids) = ledger_with(1);
        assert_eq!(ledger.rotate(ids[0], 90).unwrap(), 90);
        assert_eq!(ledger.rotate(ids[0], 90).unwrap(), 180);
        assert_eq!(ledger.rotate(ids[0], 90).unwrap(), 270);
        assert_eq!(ledger.rotate(ids[0], 90).unwrap(), 0);
        assert_eq!(ledger.rotate(ids[0], -90).unwrap(), 270);
    }

    #[test]
    fn rotation_accepts_non_quarter_deltas() {
        let (mut ledger, ids) = ledger_with(1);
        assert_eq!(ledger.rotate(ids[0], 45).unwrap(), 45);
        assert_eq!(ledger.rotate(ids[0], -90).unwrap(), 315);
        assert_eq!(ledger.rotate(ids[0], 45).unwrap(), 0);
    }

    #[test]
    fn duplicate_lands_directly_after_original() {
        let (mut ledger, ids) = ledger_with(3);
        ledger.rotate(ids[1], 90).unwrap();
        let copy = ledger.duplicate(ids[1]).unwrap();

        let sequence: Vec<PageRefId> =
            ledger.display_pages().iter().map(|page| page.id).collect();
        assert_eq!(sequence, vec![ids[0], ids[1], copy, ids[2]]);

        let copied = ledger.get(copy).unwrap();
        assert_eq!(copied.rotation_degrees, 90);
        assert_eq!(copied.original_page_number, 2);

        // Independent from here on.
        ledger.rotate(copy, 90).unwrap();
        assert_eq!(ledger.get(ids[1]).unwrap().rotation_degrees, 90);
        assert_eq!(ledger.get(copy).unwrap().rotation_degrees, 180);
    }

    #[test]
    fn deleted_pages_leave_display_but_keep_state() {
        let (mut ledger, ids) = ledger_with(3);
        ledger.rotate(ids[1], 180).unwrap();
        ledger.delete(ids[1]).unwrap();

        assert_eq!(ledger.display_pages().len(), 2);
        assert_eq!(ledger.all_pages().len(), 3);
        assert_eq!(ledger.rotate(ids[1], 90), Err(LedgerError::PageDeleted(ids[1])));

        ledger.undelete(ids[1]).unwrap();
        let sequence: Vec<PageRefId> =
            ledger.display_pages().iter().map(|page| page.id).collect();
        assert_eq!(sequence, ids);
        assert_eq!(ledger.get(ids[1]).unwrap().rotation_degrees, 180);
    }

    #[test]
    fn undelete_requires_a_deleted_page() {
        let (mut ledger, ids) = ledger_with(1);
        assert_eq!(
            ledger.undelete(ids[0]),
            Err(LedgerError::PageNotDeleted(ids[0]))
        );
    }

    #[test]
    fn reorder_replaces_visible_sequence() {
        let (mut ledger, ids) = ledger_with(3);
        ledger.reorder(&[ids[2], ids[0], ids[1]]).unwrap();
        let sequence: Vec<PageRefId> =
            ledger.display_pages().iter().map(|page| page.id).collect();
        assert_eq!(sequence, vec![ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn reorder_rejects_non_permutations_atomically() {
        let (mut ledger, ids) = ledger_with(3);
        let stranger = uuid::Uuid::new_v4();

        for bad in [
            vec![ids[0], ids[1]],
            vec![ids[0], ids[1], stranger],
            vec![ids[0], ids[1], ids[1]],
        ] {
            assert_eq!(ledger.reorder(&bad), Err(LedgerError::InvalidReorder));
            let sequence: Vec<PageRefId> =
                ledger.display_pages().iter().map(|page| page.id).collect();
            assert_eq!(sequence, ids, "sequence must survive a rejected reorder");
        }
    }

    #[test]
    fn reorder_carries_deleted_pages_with_their_predecessor() {
        let (mut ledger, ids) = ledger_with(4);
        ledger.delete(ids[1]).unwrap();

        ledger.reorder(&[ids[3], ids[0], ids[2]]).unwrap();
        let all: Vec<PageRefId> = ledger.all_pages().iter().map(|page| page.id).collect();
        assert_eq!(all, vec![ids[3], ids[0], ids[1], ids[2]]);

        // Restoring shows it right after the page that used to precede it.
        ledger.undelete(ids[1]).unwrap();
        let sequence: Vec<PageRefId> =
            ledger.display_pages().iter().map(|page| page.id).collect();
        assert_eq!(sequence, vec![ids[3], ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn remove_document_only_touches_its_own_pages() {
        let mut ledger = PageLedger::new();
        let first = ledger.load_document(1, 2);
        let second = ledger.load_document(2, 2);

        let removed = ledger.remove_document(1);
        assert_eq!(removed, first);
        let sequence: Vec<PageRefId> =
            ledger.display_pages().iter().map(|page| page.id).collect();
        assert_eq!(sequence, second);
        assert_eq!(
            ledger.get(first[0]),
            Err(LedgerError::UnknownPage(first[0]))
        );
    }

    #[test]
    fn duplicate_then_delete_original_keeps_copy_content() {
        let (mut ledger, ids) = ledger_with(2);
        let copy = ledger.duplicate(ids[0]).unwrap();
        ledger.delete(ids[0]).unwrap();

        let display = ledger.display_pages();
        assert_eq!(display.len(), 2);
        assert_eq!(display[0].id, copy);
        assert_eq!(display[0].original_page_number, 1);
        assert_eq!(display[1].id, ids[1]);
    }
}
