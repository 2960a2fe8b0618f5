//! Assembly service contract and lopdf backend
//!
//! Byte-level page copying between documents. The merge engine drives this
//! through the [`AssemblyService`] trait: copy a page out of a source, set
//! its rotation, append it to the output being built, serialize at the end.
//!
//! The lopdf backend imports a source's object graph into the target with
//! remapped object ids (imported at most once per source/target pair), and
//! clones the page dictionary for every copy so duplicated pages can carry
//! independent rotations.

use crate::EngineError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// Opaque handle to a document opened or created by an [`AssemblyService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssemblyHandle(u64);

impl AssemblyHandle {
    /// Construct a handle from its raw id. Intended for service
    /// implementations and test doubles.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Contract for the external document assembler.
///
/// Page numbers are 1-based, matching the source document's native
/// numbering.
pub trait AssemblyService {
    /// Reference to one page copied into a target, valid until `save`.
    type Page: Copy;

    fn open(&mut self, bytes: &[u8]) -> Result<AssemblyHandle, EngineError>;

    fn create_empty(&mut self) -> Result<AssemblyHandle, EngineError>;

    fn copy_page(
        &mut self,
        source: AssemblyHandle,
        page_number: u32,
        target: AssemblyHandle,
    ) -> Result<Self::Page, EngineError>;

    /// The page's intrinsic rotation in degrees, as stored in the copied
    /// page itself.
    fn rotation(&self, page: Self::Page) -> Result<i32, EngineError>;

    fn set_rotation(&mut self, page: Self::Page, degrees: i32) -> Result<(), EngineError>;

    fn append_page(&mut self, target: AssemblyHandle, page: Self::Page)
        -> Result<(), EngineError>;

    /// Serialize the target's appended pages to bytes.
    ///
    /// The target is consumed: its handle is invalid afterwards and its
    /// imported object copies are released.
    fn save(&mut self, target: AssemblyHandle) -> Result<Vec<u8>, EngineError>;
}

/// A page copied into a target by [`LopdfAssembly`].
#[derive(Debug, Clone, Copy)]
pub struct CopiedPage {
    target: AssemblyHandle,
    id: ObjectId,
}

#[derive(Debug)]
struct AssemblyDoc {
    doc: Document,
    /// Output page order for targets under construction.
    pages: Vec<ObjectId>,
    /// Object-id offset per source already imported into this document.
    imported: HashMap<u64, u32>,
}

impl AssemblyDoc {
    fn new(doc: Document) -> Self {
        Self {
            doc,
            pages: Vec::new(),
            imported: HashMap::new(),
        }
    }
}

/// Default assembler built on `lopdf`.
#[derive(Debug, Default)]
pub struct LopdfAssembly {
    next_handle: u64,
    docs: HashMap<u64, AssemblyDoc>,
}

impl LopdfAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, doc: Document) -> AssemblyHandle {
        self.next_handle += 1;
        let handle = AssemblyHandle(self.next_handle);
        self.docs.insert(handle.raw(), AssemblyDoc::new(doc));
        handle
    }

    fn entry(&self, handle: AssemblyHandle) -> Result<&AssemblyDoc, EngineError> {
        self.docs
            .get(&handle.raw())
            .ok_or(EngineError::InvalidHandle(handle.raw()))
    }

    fn entry_mut(&mut self, handle: AssemblyHandle) -> Result<&mut AssemblyDoc, EngineError> {
        self.docs
            .get_mut(&handle.raw())
            .ok_or(EngineError::InvalidHandle(handle.raw()))
    }

    /// Import the source's object graph into the target once, returning the
    /// id offset under which it lives there.
    fn import_source(
        &mut self,
        source: AssemblyHandle,
        target: AssemblyHandle,
    ) -> Result<u32, EngineError> {
        if let Some(offset) = self.entry(target)?.imported.get(&source.raw()) {
            return Ok(*offset);
        }

        let (objects, source_max_id) = {
            let entry = self.entry(source)?;
            (entry.doc.objects.clone(), entry.doc.max_id)
        };

        let entry = self.entry_mut(target)?;
        let offset = entry.doc.max_id;
        for (old_id, object) in objects {
            entry
                .doc
                .objects
                .insert((old_id.0 + offset, old_id.1), remap_object_refs(object, offset));
        }
        entry.doc.max_id = source_max_id + offset;
        entry.imported.insert(source.raw(), offset);
        debug!(
            source = source.raw(),
            into = target.raw(),
            offset,
            "imported source objects"
        );

        Ok(offset)
    }

    fn pages_root_id(doc: &Document) -> Result<ObjectId, EngineError> {
        let catalog_id = doc
            .trailer
            .get(b"Root")
            .and_then(|obj| obj.as_reference())
            .map_err(|_| EngineError::Assembly("no catalog reference in trailer".into()))?;

        doc.get_dictionary(catalog_id)
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .get(b"Pages")
            .and_then(|obj| obj.as_reference())
            .map_err(|_| EngineError::Assembly("catalog has no page tree".into()))
    }
}

impl AssemblyService for LopdfAssembly {
    type Page = CopiedPage;

    fn open(&mut self, bytes: &[u8]) -> Result<AssemblyHandle, EngineError> {
        let doc = Document::load_mem(bytes)
            .map_err(|err| EngineError::UnreadableDocument(err.to_string()))?;
        Ok(self.insert(doc))
    }

    fn create_empty(&mut self) -> Result<AssemblyHandle, EngineError> {
        let mut doc = Document::with_version("1.5");

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(0));
        pages_dict.set("Kids", Object::Array(Vec::new()));
        let pages_id = doc.add_object(Object::Dictionary(pages_dict));

        let mut catalog_dict = Dictionary::new();
        catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog_dict.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog_dict));

        doc.trailer.set("Root", Object::Reference(catalog_id));

        Ok(self.insert(doc))
    }

    fn copy_page(
        &mut self,
        source: AssemblyHandle,
        page_number: u32,
        target: AssemblyHandle,
    ) -> Result<CopiedPage, EngineError> {
        let page_id = {
            let entry = self.entry(source)?;
            let pages = entry.doc.get_pages();
            let page_count = pages.len() as u32;
            pages
                .get(&page_number)
                .copied()
                .ok_or(EngineError::PageOutOfRange {
                    page: page_number,
                    page_count,
                })?
        };

        let offset = self.import_source(source, target)?;

        let entry = self.entry_mut(target)?;
        let imported_id = (page_id.0 + offset, page_id.1);
        let page_object = entry
            .doc
            .get_object(imported_id)
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .clone();

        // Fresh object per copy, so two copies of the same native page can
        // hold different rotations.
        let id = entry.doc.add_object(page_object);

        Ok(CopiedPage { target, id })
    }

    fn rotation(&self, page: CopiedPage) -> Result<i32, EngineError> {
        let entry = self.entry(page.target)?;
        let dict = entry
            .doc
            .get_dictionary(page.id)
            .map_err(|err| EngineError::Assembly(err.to_string()))?;

        Ok(dict
            .get(b"Rotate")
            .ok()
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0) as i32)
    }

    fn set_rotation(&mut self, page: CopiedPage, degrees: i32) -> Result<(), EngineError> {
        let entry = self.entry_mut(page.target)?;
        entry
            .doc
            .get_object_mut(page.id)
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .as_dict_mut()
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .set("Rotate", Object::Integer(degrees as i64));
        Ok(())
    }

    fn append_page(
        &mut self,
        target: AssemblyHandle,
        page: CopiedPage,
    ) -> Result<(), EngineError> {
        if page.target != target {
            return Err(EngineError::Assembly(
                "page was copied into a different target".into(),
            ));
        }
        self.entry_mut(target)?.pages.push(page.id);
        Ok(())
    }

    fn save(&mut self, target: AssemblyHandle) -> Result<Vec<u8>, EngineError> {
        // The target and its imported object copies are done after this;
        // keeping them resident would grow by a full document per merge.
        let mut entry = self
            .docs
            .remove(&target.raw())
            .ok_or(EngineError::InvalidHandle(target.raw()))?;
        let pages_id = Self::pages_root_id(&entry.doc)?;
        let page_ids = entry.pages.clone();

        for &page_id in &page_ids {
            entry
                .doc
                .get_object_mut(page_id)
                .map_err(|err| EngineError::Assembly(err.to_string()))?
                .as_dict_mut()
                .map_err(|err| EngineError::Assembly(err.to_string()))?
                .set("Parent", Object::Reference(pages_id));
        }

        let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
        entry
            .doc
            .get_object_mut(pages_id)
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .as_dict_mut()
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .set("Kids", Object::Array(kids));
        entry
            .doc
            .get_object_mut(pages_id)
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .as_dict_mut()
            .map_err(|err| EngineError::Assembly(err.to_string()))?
            .set("Count", Object::Integer(page_ids.len() as i64));

        entry.doc.compress();

        let mut buffer = Vec::new();
        entry
            .doc
            .save_to(&mut buffer)
            .map_err(|err| EngineError::Assembly(err.to_string()))?;

        debug!(output = target.raw(), pages = page_ids.len(), "saved assembly");
        Ok(buffer)
    }
}

/// Recursively shift object references by an id offset.
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(array) => Object::Array(
            array
                .into_iter()
                .map(|item| remap_object_refs(item, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
