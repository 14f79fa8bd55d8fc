//! PDF inspection: page count, document info, first-page thumbnails.
//!
//! Callers talk to the narrow [`PdfInspector`] / [`PdfDocument`] pair so the
//! engine behind it can change without touching enrichment control flow.
//!
//! Two engines ship here. With the `pdfium` feature, [`PdfiumInspector`]
//! rasterizes pages through the system pdfium library. The always-available
//! [`LopdfInspector`] parses the document structure with `lopdf` and draws
//! each page's content stream as a layout sketch (see `sketch`).
//! [`default_inspector`] picks pdfium when it can be loaded.

mod sketch;
#[cfg(feature = "pdfium")]
mod pdfium;

use std::io::Cursor;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, NaiveDate, TimeZone};
use image::{imageops, DynamicImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, ObjectId};
use serde::Serialize;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumInspector;

/// US Letter in points; used when a page has no resolvable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parent hops followed when looking for an inherited page attribute.
const MAX_INHERIT_DEPTH: usize = 16;

/// Opens PDF bytes into a document handle.
pub trait PdfInspector: Send + Sync {
    fn open_document<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>>;
}

/// The best engine available: pdfium when the feature is on and the library
/// loads, the lopdf sketch renderer otherwise.
pub fn default_inspector() -> Arc<dyn PdfInspector> {
    #[cfg(feature = "pdfium")]
    {
        match PdfiumInspector::bind() {
            Ok(inspector) => return Arc::new(inspector),
            Err(e) => tracing::warn!("pdfium unavailable, using lopdf sketches: {e:#}"),
        }
    }
    Arc::new(LopdfInspector)
}

/// An opened PDF.
pub trait PdfDocument {
    fn page_count(&self) -> u32;
    fn read_metadata(&self) -> PdfMetadata;
    /// Render one page (0-based) to PNG bytes.
    fn render_page_thumbnail(&self, page_index: u32, spec: &ThumbnailSpec) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// RFC 3339.
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ThumbnailSpec {
    /// Output pixels per page point.
    pub scale: f32,
    /// Clamp on the longest edge.
    pub max_px: u32,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self { scale: 0.5, max_px: 480 }
    }
}

/// Result of a full inspection pass.
#[derive(Debug, Clone)]
pub struct PdfInspection {
    pub page_count: u32,
    pub metadata: PdfMetadata,
    /// PNG bytes, one per rendered page, in page order.
    pub thumbnails: Vec<Vec<u8>>,
}

/// Open the document, read its facts and render the first
/// `min(page_count, max_thumbnails)` pages.
///
/// Parser panics on malformed input are caught and returned as errors so
/// one bad upload cannot take down the caller.
pub fn inspect(
    inspector: &dyn PdfInspector,
    bytes: &[u8],
    max_thumbnails: u32,
    spec: &ThumbnailSpec,
) -> Result<PdfInspection> {
    std::panic::catch_unwind(AssertUnwindSafe(|| {
        inspect_inner(inspector, bytes, max_thumbnails, spec)
    }))
    .unwrap_or_else(|_| Err(anyhow!("PDF reader panicked")))
}

fn inspect_inner(
    inspector: &dyn PdfInspector,
    bytes: &[u8],
    max_thumbnails: u32,
    spec: &ThumbnailSpec,
) -> Result<PdfInspection> {
    let doc = inspector.open_document(bytes)?;
    let page_count = doc.page_count();
    let metadata = doc.read_metadata();

    let wanted = page_count.min(max_thumbnails);
    let mut thumbnails = Vec::with_capacity(wanted as usize);
    for page_index in 0..wanted {
        let png = doc
            .render_page_thumbnail(page_index, spec)
            .with_context(|| format!("rendering page {}", page_index + 1))?;
        thumbnails.push(png);
    }

    Ok(PdfInspection { page_count, metadata, thumbnails })
}

/// Filename heuristic: does the name mention any pitch-deck keyword?
pub fn is_likely_pitch_deck(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| lower.contains(&k.to_lowercase()))
}

// ── lopdf engine ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfInspector;

impl PdfInspector for LopdfInspector {
    fn open_document<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PdfDocument + 'a>> {
        let doc = Document::load_mem(bytes).context("parsing PDF structure")?;
        if doc.is_encrypted() {
            bail!("document is encrypted");
        }
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            bail!("document has no pages");
        }
        Ok(Box::new(LopdfDocument { doc, pages }))
    }
}

struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn read_metadata(&self) -> PdfMetadata {
        let Some(info) = self.info_dictionary() else {
            return PdfMetadata::default();
        };
        PdfMetadata {
            title: self.info_text(info, b"Title"),
            author: self.info_text(info, b"Author"),
            created_at: self
                .info_text(info, b"CreationDate")
                .and_then(|raw| parse_pdf_date(&raw)),
        }
    }

    fn render_page_thumbnail(&self, page_index: u32, spec: &ThumbnailSpec) -> Result<Vec<u8>> {
        let page_id = *self
            .pages
            .get(page_index as usize)
            .ok_or_else(|| anyhow!("page {page_index} out of range"))?;
        let media_box = self.media_box(page_id);
        let (w, h) = thumbnail_size(media_box[2] - media_box[0], media_box[3] - media_box[1], spec);
        let mut img = sketch::blank_page(w, h);

        let drawn = self
            .doc
            .get_page_content(page_id)
            .and_then(|content| sketch::render(&content, sketch::device_matrix(media_box, w, h), &mut img));
        if let Err(e) = drawn {
            tracing::debug!("page {}: content not drawn: {e}", page_index + 1);
        }

        let img = match self.rotation(page_id) {
            90 => imageops::rotate90(&img),
            180 => imageops::rotate180(&img),
            270 => imageops::rotate270(&img),
            _ => img,
        };
        encode_png(img)
    }
}

impl LopdfDocument {
    fn info_dictionary(&self) -> Option<&lopdf::Dictionary> {
        let info = self.doc.trailer.get(b"Info").ok()?;
        self.resolve(info)?.as_dict().ok()
    }

    fn info_text(&self, info: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
        info.get(key).ok().and_then(|o| self.resolve(o)).and_then(object_text)
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// `[llx, lly, urx, ury]` in points, following inheritance.
    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        self.inherited(page_id, b"MediaBox")
            .and_then(media_box_rect)
            .unwrap_or(DEFAULT_MEDIA_BOX)
    }

    /// Clockwise page rotation, normalized to 0, 90, 180 or 270.
    fn rotation(&self, page_id: ObjectId) -> i64 {
        self.inherited(page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .map(|r| r.rem_euclid(360) / 90 * 90)
            .unwrap_or(0)
    }

    /// A page attribute from the page or the nearest ancestor that sets it.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        for _ in 0..MAX_INHERIT_DEPTH {
            let dict = self.doc.get_dictionary(current?).ok()?;
            if let Some(value) = dict.get(key).ok().and_then(|o| self.resolve(o)) {
                return Some(value);
            }
            current = dict.get(b"Parent").ok().and_then(|o| o.as_reference().ok());
        }
        None
    }
}

fn media_box_rect(obj: &Object) -> Option<[f32; 4]> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let n: Vec<f32> = arr.iter().filter_map(number).collect();
    if n.len() != 4 {
        return None;
    }
    let rect = [n[0].min(n[2]), n[1].min(n[3]), n[0].max(n[2]), n[1].max(n[3])];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => {
            let text = decode_pdf_text(bytes);
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise
/// treat bytes as Latin-1 (close enough to PDFDocEncoding for metadata).
fn decode_pdf_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Normalize a PDF date (`D:YYYYMMDDHHmmSSOHH'mm'`, every field after the
/// year optional) to RFC 3339.
pub fn parse_pdf_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(v) => v.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[..4].parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4, 1)?, field(6, 1)?)?
        .and_hms_opt(field(8, 0)?, field(10, 0)?, field(12, 0)?)?;
    let offset = FixedOffset::east_opt(parse_offset(&s[digits.len()..])?)?;
    let dt = offset.from_local_datetime(&naive).single()?;
    Some(dt.to_rfc3339())
}

fn parse_offset(rest: &str) -> Option<i32> {
    let mut chars = rest.chars();
    let sign = match chars.next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Some(0),
    };
    let digits: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Output size for a page of `width_pt` × `height_pt` under `spec`.
pub fn thumbnail_size(width_pt: f32, height_pt: f32, spec: &ThumbnailSpec) -> (u32, u32) {
    let mut w = (width_pt * spec.scale).round().max(1.0);
    let mut h = (height_pt * spec.scale).round().max(1.0);
    let max = spec.max_px.max(1) as f32;
    let longest = w.max(h);
    if longest > max {
        let k = max / longest;
        w = (w * k).round().max(1.0);
        h = (h * k).round().max(1.0);
    }
    (w as u32, h as u32)
}

pub(crate) fn encode_png(img: RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("encoding thumbnail")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream, StringFormat};

    fn sample_pdf(pages: u32, info: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..pages {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages as i64),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(842),
                    Object::Integer(595),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if info {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal("Series A"),
                "Author" => Object::String(
                    vec![0xFE, 0xFF, 0x00, 0x41, 0x00, 0x64, 0x00, 0x61],
                    StringFormat::Hexadecimal,
                ),
                "CreationDate" => Object::string_literal("D:20240115093000+01'00'"),
            });
            doc.trailer.set("Info", info_id);
        }
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// One 200 × 200 pt page per content stream, with per-page `/Rotate`.
    fn drawn_pdf(pages: &[(&[u8], i64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = pages
            .iter()
            .map(|(content, rotate)| {
                let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                    "Rotate" => *rotate,
                }))
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => Object::Integer(kids.len() as i64),
                "Kids" => kids,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(200),
                    Object::Integer(200),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn page_images(bytes: &[u8]) -> Vec<image::RgbImage> {
        let result = inspect(&LopdfInspector, bytes, 10, &ThumbnailSpec::default()).unwrap();
        result
            .thumbnails
            .iter()
            .map(|png| image::load_from_memory(png).unwrap().to_rgb8())
            .collect()
    }

    #[test]
    fn thumbnails_follow_page_content() {
        // Same size, same content length, different drawing.
        let bytes = drawn_pdf(&[
            (&b"0 0 1 rg 0 100 100 100 re f"[..], 0),
            (&b"1 0 0 rg 100 0 100 100 re f"[..], 0),
        ]);
        let pages = page_images(&bytes);
        assert_eq!((pages[0].width(), pages[0].height()), (100, 100));
        assert_ne!(pages[0], pages[1]);

        // Top-left quarter blue on page one, bottom-right red on page two.
        assert_eq!(pages[0].get_pixel(25, 25).0, [0, 0, 255]);
        assert_eq!(pages[0].get_pixel(75, 75).0, [255, 255, 255]);
        assert_eq!(pages[1].get_pixel(75, 75).0, [255, 0, 0]);
        assert_eq!(pages[1].get_pixel(25, 25).0, [255, 255, 255]);
    }

    #[test]
    fn rotated_page_is_turned() {
        let bytes = drawn_pdf(&[(&b"0 g 0 100 100 100 re f"[..], 90)]);
        let page = &page_images(&bytes)[0];
        // Top-left quarter ends up top-right after a clockwise quarter turn.
        assert_eq!(page.get_pixel(75, 25).0, [0, 0, 0]);
        assert_eq!(page.get_pixel(25, 25).0, [255, 255, 255]);
    }

    #[test]
    fn undecodable_content_still_gives_a_page() {
        let bytes = drawn_pdf(&[(&b"0 0 10 10 re f ) ) BT (("[..], 0)]);
        let pages = page_images(&bytes);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn inspects_well_formed_pdf() {
        let bytes = sample_pdf(3, true);
        let result = inspect(&LopdfInspector, &bytes, 10, &ThumbnailSpec::default()).unwrap();
        assert_eq!(result.page_count, 3);
        assert_eq!(result.thumbnails.len(), 3);
        assert_eq!(result.metadata.title.as_deref(), Some("Series A"));
        assert_eq!(result.metadata.author.as_deref(), Some("Ada"));
        assert_eq!(result.metadata.created_at.as_deref(), Some("2024-01-15T09:30:00+01:00"));
    }

    #[test]
    fn thumbnails_capped_at_max() {
        let bytes = sample_pdf(14, false);
        let result = inspect(&LopdfInspector, &bytes, 10, &ThumbnailSpec::default()).unwrap();
        assert_eq!(result.page_count, 14);
        assert_eq!(result.thumbnails.len(), 10);
        assert_eq!(result.metadata, PdfMetadata::default());
    }

    #[test]
    fn thumbnail_uses_inherited_media_box() {
        let bytes = sample_pdf(1, false);
        let result = inspect(&LopdfInspector, &bytes, 1, &ThumbnailSpec::default()).unwrap();
        let img = image::load_from_memory(&result.thumbnails[0]).unwrap();
        // 842x595 landscape at 0.5, under the 480px clamp.
        assert_eq!(img.width(), 421);
        assert_eq!(img.height(), 298);
    }

    #[test]
    fn corrupt_bytes_are_an_error() {
        assert!(inspect(&LopdfInspector, b"not a pdf at all", 10, &ThumbnailSpec::default()).is_err());
        assert!(inspect(&LopdfInspector, b"%PDF-1.4\n%%EOF", 10, &ThumbnailSpec::default()).is_err());
    }

    #[test]
    fn pdf_dates() {
        assert_eq!(parse_pdf_date("D:20240115093000Z").as_deref(), Some("2024-01-15T09:30:00+00:00"));
        assert_eq!(
            parse_pdf_date("D:20231231235959-05'00'").as_deref(),
            Some("2023-12-31T23:59:59-05:00")
        );
        assert_eq!(parse_pdf_date("D:2024").as_deref(), Some("2024-01-01T00:00:00+00:00"));
        assert_eq!(parse_pdf_date("20240230"), None);
        assert_eq!(parse_pdf_date("yesterday"), None);
    }

    #[test]
    fn pitch_deck_heuristic() {
        let kw: Vec<String> = ["pitch", "deck", "presentation", "slides"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(is_likely_pitch_deck("Acme_Pitch_2024.pdf", &kw));
        assert!(is_likely_pitch_deck("SLIDES-final.pdf", &kw));
        assert!(is_likely_pitch_deck("investor deck.pdf", &kw));
        assert!(!is_likely_pitch_deck("invoice-2024.pdf", &kw));
        assert!(!is_likely_pitch_deck("anything.pdf", &[]));
    }

    #[test]
    fn thumbnail_sizes() {
        let spec = ThumbnailSpec { scale: 0.5, max_px: 480 };
        assert_eq!(thumbnail_size(612.0, 792.0, &spec), (306, 396));
        assert_eq!(thumbnail_size(2000.0, 1000.0, &spec), (480, 240));
        assert_eq!(thumbnail_size(0.0, 0.0, &spec), (1, 1));
    }
}
