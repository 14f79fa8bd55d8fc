use std::io::Cursor;

use anyhow::{Context, Result};
use serde::Serialize;

/// What an image's bytes tell us without decoding pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFacts {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
}

/// Read natural dimensions plus any EXIF capture facts.
///
/// Dimensions come from the container header when it is one we can read
/// directly (PNG, GIF, WebP, BMP), otherwise from the `image` crate's format
/// sniffing. Fails when neither recognizes the bytes.
pub fn read_facts(bytes: &[u8]) -> Result<ImageFacts> {
    let (width, height) = match header_dimensions(bytes) {
        Some(dims) => dims,
        None => {
            tracing::debug!("no fixed-layout header, falling back to decoder sniffing");
            decoder_dimensions(bytes)?
        }
    };
    let (taken_at, camera) = read_exif(bytes);
    Ok(ImageFacts { width, height, taken_at, camera })
}

/// Dimensions via the `image` crate's format detection (covers JPEG, TIFF, ...).
///
/// Decoders run under [`decode_limits`], so a hostile header cannot make
/// them allocate without bound.
pub fn decoder_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let mut reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("sniffing image format")?;
    reader.limits(decode_limits());
    reader.into_dimensions().context("reading image dimensions")
}

/// Largest edge the decoder fallback will accept.
pub const MAX_DECODE_EDGE: u32 = 65_535;

/// Allocation ceiling for the decoder fallback.
pub const MAX_DECODE_ALLOC: u64 = 64 * 1024 * 1024;

pub fn decode_limits() -> image::Limits {
    let mut limits = image::Limits::default();
    limits.max_image_width = Some(MAX_DECODE_EDGE);
    limits.max_image_height = Some(MAX_DECODE_EDGE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Dimensions straight from the file header for formats with a fixed layout.
pub fn header_dimensions(buf: &[u8]) -> Option<(u32, u32)> {
    let n = buf.len();
    if n < 8 {
        return None;
    }

    // PNG: \x89PNG\r\n\x1a\n, IHDR width/height big-endian at 16..24
    if buf.starts_with(b"\x89PNG\r\n\x1a\n") && n >= 24 {
        let width = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let height = u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]);
        return Some((width, height));
    }

    // GIF: GIF87a or GIF89a, logical screen size little-endian
    if (buf.starts_with(b"GIF87a") || buf.starts_with(b"GIF89a")) && n >= 10 {
        let width = u16::from_le_bytes([buf[6], buf[7]]);
        let height = u16::from_le_bytes([buf[8], buf[9]]);
        return Some((width as u32, height as u32));
    }

    // WebP: RIFF....WEBP + VP8 / VP8L / VP8X
    if buf.starts_with(b"RIFF") && n >= 16 && &buf[8..12] == b"WEBP" {
        return webp_dimensions(buf);
    }

    // BMP: BM; height is negative for top-down bitmaps
    if buf.starts_with(b"BM") && n >= 26 {
        let width = i32::from_le_bytes([buf[18], buf[19], buf[20], buf[21]]).unsigned_abs();
        let height = i32::from_le_bytes([buf[22], buf[23], buf[24], buf[25]]).unsigned_abs();
        return Some((width, height));
    }

    None
}

fn webp_dimensions(buf: &[u8]) -> Option<(u32, u32)> {
    let n = buf.len();
    match &buf[12..16] {
        b"VP8 " if n >= 30 => {
            // Key frame start code 9d 01 2a precedes 14-bit width/height.
            if buf[23] == 0x9D && buf[24] == 0x01 && buf[25] == 0x2A {
                let width = u16::from_le_bytes([buf[26], buf[27]]) & 0x3FFF;
                let height = u16::from_le_bytes([buf[28], buf[29]]) & 0x3FFF;
                Some((width as u32, height as u32))
            } else {
                None
            }
        }
        b"VP8L" if n >= 25 && buf[20] == 0x2F => {
            let packed = u32::from_le_bytes([buf[21], buf[22], buf[23], buf[24]]);
            let width = (packed & 0x3FFF) + 1;
            let height = ((packed >> 14) & 0x3FFF) + 1;
            Some((width, height))
        }
        b"VP8X" if n >= 30 => {
            let width = u32::from_le_bytes([buf[24], buf[25], buf[26], 0]) + 1;
            let height = u32::from_le_bytes([buf[27], buf[28], buf[29], 0]) + 1;
            Some((width, height))
        }
        _ => None,
    }
}

/// `(DateTimeOriginal, Model)` from EXIF, when the container carries it.
/// Most images have none; that is not an error.
pub fn read_exif(bytes: &[u8]) -> (Option<String>, Option<String>) {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return (None, None);
    };
    let field = |tag: exif::Tag| {
        exif.get_field(tag, exif::In::PRIMARY)
            .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string())
            .filter(|v| !v.is_empty())
    };
    (field(exif::Tag::DateTimeOriginal), field(exif::Tag::Model))
}
