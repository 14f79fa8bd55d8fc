use std::fmt;

use serde::{Deserialize, Serialize};

/// Content kind assigned to every file in a batch. Exactly one per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifiedKind {
    Image,
    Pdf,
    Document,
    Presentation,
    Spreadsheet,
    Archive,
    Video,
    Audio,
    Other,
}

impl ClassifiedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::Spreadsheet => "spreadsheet",
            Self::Archive => "archive",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ClassifiedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind enrichment payload. The variant always agrees with the record's kind
/// family: images carry dimensions, PDFs carry document facts, everything else
/// carries the placeholder icon it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KindMetadata {
    #[serde(rename_all = "camelCase")]
    Image {
        width: u32,
        height: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        taken_at: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        camera: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Pdf {
        page_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<String>,
        is_likely_pitch_deck: bool,
    },
    #[serde(rename_all = "camelCase")]
    Generic { icon: String },
}

impl KindMetadata {
    /// Safe defaults for a record whose processing failed. Consumers can read
    /// every field without special-casing the error.
    pub fn degraded(kind: ClassifiedKind) -> Self {
        match kind {
            ClassifiedKind::Image => KindMetadata::Image {
                width: 0,
                height: 0,
                taken_at: None,
                camera: None,
            },
            ClassifiedKind::Pdf => KindMetadata::Pdf {
                page_count: 1,
                title: None,
                author: None,
                created_at: None,
                is_likely_pitch_deck: false,
            },
            other => KindMetadata::Generic { icon: placeholder_icon(other).to_string() },
        }
    }
}

/// Static placeholder icon address for a kind.
pub fn placeholder_icon(kind: ClassifiedKind) -> &'static str {
    match kind {
        ClassifiedKind::Image => "/icons/image.svg",
        ClassifiedKind::Pdf => "/icons/pdf.svg",
        ClassifiedKind::Document => "/icons/document.svg",
        ClassifiedKind::Presentation => "/icons/presentation.svg",
        ClassifiedKind::Spreadsheet => "/icons/spreadsheet.svg",
        ClassifiedKind::Archive => "/icons/archive.svg",
        ClassifiedKind::Video => "/icons/video.svg",
        ClassifiedKind::Audio => "/icons/audio.svg",
        ClassifiedKind::Other => "/icons/other.svg",
    }
}

/// One processed file, in the same position as its input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFileRecord {
    /// Unique within one batch run: `"{run}-{index}-{slug}"`.
    pub id: String,
    pub display_name: String,
    pub original_name: String,
    /// Lower-cased, without the leading dot. Empty when the name has none.
    pub extension: String,
    pub size_bytes: u64,
    pub size_label: String,
    pub kind: ClassifiedKind,
    /// Effective content type after inference.
    pub content_type: String,
    /// Local handle address; valid only while the owning session is alive.
    /// Empty when acquisition failed.
    pub resource_uri: String,
    pub thumbnails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub metadata: KindMetadata,
    /// Identifier in a remote file store, when the file is backed by one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Set when the file could not be fully processed. `thumbnails` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
}

impl ProcessedFileRecord {
    pub fn is_degraded(&self) -> bool {
        self.processing_error.is_some()
    }
}

/// One per-file failure, surfaced alongside otherwise-successful results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub record_id: String,
    pub message: String,
}

/// Progress and error state of the current batch run, for the progress UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRunState {
    pub is_processing: bool,
    /// 0–100, non-decreasing within one run.
    pub progress_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently_processing: Option<String>,
    pub errors: Vec<RecordError>,
    /// Batch-level fatal failure. Distinct from "no files, no errors".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl BatchRunState {
    pub fn started() -> Self {
        Self { is_processing: true, ..Self::default() }
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Display strategy chosen for a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    SingleImage,
    GridGallery,
    MasonryGallery,
    LightboxGallery,
    PdfViewer,
    VideoPlayer,
    ArchiveExplorer,
    DocumentViewer,
    CompositeMixed,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleImage => "single-image",
            Self::GridGallery => "grid-gallery",
            Self::MasonryGallery => "masonry-gallery",
            Self::LightboxGallery => "lightbox-gallery",
            Self::PdfViewer => "pdf-viewer",
            Self::VideoPlayer => "video-player",
            Self::ArchiveExplorer => "archive-explorer",
            Self::DocumentViewer => "document-viewer",
            Self::CompositeMixed => "composite-mixed",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lazy-loading parameters for the large-gallery tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_size: usize,
}

/// The router's decision: a strategy plus the record ids it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub strategy: Strategy,
    pub record_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Present only for `composite-mixed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Composite>,
}

/// The two partitions of a mixed batch. One level deep: neither side is
/// itself composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Box<Presentation>>,
    pub remainder: Vec<Presentation>,
}

/// View/download address pair for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedUrls {
    pub view_url: String,
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_metadata_matches_kind_family() {
        assert!(matches!(
            KindMetadata::degraded(ClassifiedKind::Image),
            KindMetadata::Image { width: 0, height: 0, .. }
        ));
        assert!(matches!(
            KindMetadata::degraded(ClassifiedKind::Pdf),
            KindMetadata::Pdf { page_count: 1, is_likely_pitch_deck: false, .. }
        ));
        assert_eq!(
            KindMetadata::degraded(ClassifiedKind::Archive),
            KindMetadata::Generic { icon: "/icons/archive.svg".into() }
        );
    }

    #[test]
    fn strategy_serializes_kebab_case() {
        let json = serde_json::to_string(&Strategy::LightboxGallery).unwrap();
        assert_eq!(json, "\"lightbox-gallery\"");
        assert_eq!(Strategy::CompositeMixed.to_string(), "composite-mixed");
    }

    #[test]
    fn metadata_is_tagged() {
        let meta = KindMetadata::Pdf {
            page_count: 3,
            title: None,
            author: Some("Ada".into()),
            created_at: None,
            is_likely_pitch_deck: true,
        };
        let v = serde_json::to_value(&meta).unwrap();
        assert_eq!(v["type"], "pdf");
        assert_eq!(v["pageCount"], 3);
        assert_eq!(v["isLikelyPitchDeck"], true);
        assert!(v.get("title").is_none());
    }

    #[test]
    fn started_state_is_processing_from_zero() {
        let s = BatchRunState::started();
        assert!(s.is_processing);
        assert_eq!(s.progress_percent, 0);
        assert!(s.errors.is_empty());
        assert!(!s.has_failed());
    }
}
