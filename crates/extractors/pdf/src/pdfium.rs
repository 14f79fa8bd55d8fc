//! Page rasterization through the pdfium library.
//!
//! Needs pdfium installed where the system loader can find it
//! (`libpdfium.so`, `libpdfium.dylib` or `pdfium.dll`).

use anyhow::{anyhow, Context, Result};
use pdfium_render::prelude::{
    PdfDocument as PdfiumDocument, PdfDocumentMetadataTagType, PdfRenderConfig, Pdfium,
};

use crate::{encode_png, parse_pdf_date, thumbnail_size, PdfDocument, PdfInspector, PdfMetadata, ThumbnailSpec};

pub struct PdfiumInspector {
    pdfium: Pdfium,
}

impl PdfiumInspector {
    /// Load the system pdfium library.
    pub fn bind() -> Result<Self> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| anyhow!("loading pdfium: {e}"))?;
        Ok(Self { pdfium: Pdfium::new(bindings) })
    }
}

impl PdfInspector for PdfiumInspector {
    fn open_document<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>> {
        let doc = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| anyhow!("opening PDF: {e}"))?;
        anyhow::ensure!(doc.pages().len() > 0, "document has no pages");
        Ok(Box::new(PdfiumPages { doc }))
    }
}

struct PdfiumPages<'a> {
    doc: PdfiumDocument<'a>,
}

impl PdfiumPages<'_> {
    fn tag(&self, tag: PdfDocumentMetadataTagType) -> Option<String> {
        self.doc
            .metadata()
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl PdfDocument for PdfiumPages<'_> {
    fn page_count(&self) -> u32 {
        self.doc.pages().len() as u32
    }

    fn read_metadata(&self) -> PdfMetadata {
        PdfMetadata {
            title: self.tag(PdfDocumentMetadataTagType::Title),
            author: self.tag(PdfDocumentMetadataTagType::Author),
            created_at: self
                .tag(PdfDocumentMetadataTagType::CreationDate)
                .and_then(|raw| parse_pdf_date(&raw)),
        }
    }

    fn render_page_thumbnail(&self, page_index: u32, spec: &ThumbnailSpec) -> Result<Vec<u8>> {
        let index = u16::try_from(page_index).context("page index out of range")?;
        let page = self
            .doc
            .pages()
            .get(index)
            .map_err(|e| anyhow!("loading page {}: {e}", page_index + 1))?;
        let (w, h) = thumbnail_size(page.width().value, page.height().value, spec);
        let config = PdfRenderConfig::new()
            .set_target_width(w as i32)
            .set_maximum_height(h as i32)
            .render_form_data(true)
            .render_annotations(true);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| anyhow!("rendering page {}: {e}", page_index + 1))?;
        encode_png(bitmap.as_image().to_rgb8())
    }
}
