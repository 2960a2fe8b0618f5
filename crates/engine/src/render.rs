//! Rendering service contract and placeholder backend
//!
//! Rasterization is cancellable: the caller passes a token and a superseded
//! render returns [`RenderOutcome::Cancelled`] instead of an error, since
//! supersession is an expected, frequent condition.

use crate::EngineError;
use image::{ImageBuffer, Rgba};
use lopdf::Document;
use pdf_composer_scheduler::CancellationToken;
use std::collections::HashMap;
use tracing::debug;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Opaque handle to a document opened by a [`RenderService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// Construct a handle from its raw id. Intended for service
    /// implementations and test doubles.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page dimensions in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// A rendered bitmap of one page, tagged with the parameters it was
/// produced at so stale surfaces are distinguishable.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pub pixels: RgbaImage,
    pub scale: f32,
    pub rotation_degrees: u16,
}

/// Outcome of a cancellable render call.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Rendered(RasterSurface),
    /// Superseded by a newer request; not an error.
    Cancelled,
}

/// Engine-level limits applied before parsing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum accepted input size in bytes.
    pub max_input_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 100 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_input_bytes(mut self, limit: u64) -> Self {
        self.max_input_bytes = limit;
        self
    }
}

/// Contract for the external page rasterizer.
pub trait RenderService {
    /// Open a document from raw bytes.
    ///
    /// Fails with `OversizeInput` before parsing when the bytes exceed the
    /// configured limit, and `UnreadableDocument` on malformed input.
    fn open(&mut self, bytes: &[u8]) -> Result<DocumentHandle, EngineError>;

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError>;

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, EngineError>;

    /// Rasterize one page (zero-based index) at a scale and rotation.
    ///
    /// The token is polled during rasterization; a cancelled render returns
    /// `RenderOutcome::Cancelled`.
    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
        rotation_degrees: u16,
        token: &CancellationToken,
    ) -> Result<RenderOutcome, EngineError>;

    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

/// Default backend: parses page geometry with `lopdf` and rasterizes
/// placeholder surfaces (white page with a border) at the requested scale
/// and rotation.
#[derive(Debug, Default)]
pub struct LopdfRenderer {
    config: EngineConfig,
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, EngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(EngineError::UnreadableDocument(
                "encrypted documents are not supported".to_owned(),
            ));
        }

        let doc = Document::load_mem(bytes)
            .map_err(|err| EngineError::UnreadableDocument(err.to_string()))?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc
                .get_dictionary(object_id)
                .map_err(|err| EngineError::UnreadableDocument(err.to_string()))?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize {
                        width_pt: (x1 - x0).abs(),
                        height_pt: (y1 - y0).abs(),
                    })
                })
                .unwrap_or(PageSize {
                    width_pt: 612.0,
                    height_pt: 792.0,
                });

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(EngineError::UnreadableDocument(
                "document has no pages".to_owned(),
            ));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, EngineError> {
        self.docs
            .get(&handle)
            .ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}

impl RenderService for LopdfRenderer {
    fn open(&mut self, bytes: &[u8]) -> Result<DocumentHandle, EngineError> {
        let actual = bytes.len() as u64;
        if actual > self.config.max_input_bytes {
            return Err(EngineError::OversizeInput {
                actual,
                limit: self.config.max_input_bytes,
            });
        }

        let page_sizes = Self::parse_sizes(bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        debug!(handle = handle.raw(), pages = page_sizes.len(), "opened document");
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, EngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, EngineError> {
        let record = self.record(handle)?;
        record
            .page_sizes
            .get(page_index as usize)
            .copied()
            .ok_or(EngineError::PageOutOfRange {
                page: page_index,
                page_count: record.page_sizes.len() as u32,
            })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
        rotation_degrees: u16,
        token: &CancellationToken,
    ) -> Result<RenderOutcome, EngineError> {
        let page_size = self.page_size(handle, page_index)?;
        let scale = if scale <= 0.0 { 1.0 } else { scale };
        let rotation = rotation_degrees % 360;

        let (width_pt, height_pt) = if rotation == 90 || rotation == 270 {
            (page_size.height_pt, page_size.width_pt)
        } else {
            (page_size.width_pt, page_size.height_pt)
        };

        let width = (width_pt * scale).round().max(1.0) as u32;
        let height = (height_pt * scale).round().max(1.0) as u32;

        if token.is_cancelled() {
            debug!(handle = handle.raw(), page_index, "render superseded before start");
            return Ok(RenderOutcome::Cancelled);
        }

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                // Poll between rows so a superseding request interrupts
                // promptly even on large surfaces.
                if y % 64 == 0 && token.is_cancelled() {
                    debug!(handle = handle.raw(), page_index, "render superseded mid-raster");
                    return Ok(RenderOutcome::Cancelled);
                }
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(RenderOutcome::Rendered(RasterSurface {
            pixels: image,
            scale,
            rotation_degrees: rotation,
        }))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), EngineError> {
        self.docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(EngineError::InvalidHandle(handle.raw()))
    }
}
