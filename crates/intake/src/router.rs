//! Presentation strategy selection.
//!
//! A pure function of the records' kinds and counts. Image galleries are
//! tiered by count; a mixed batch becomes a one-level composite of an image
//! gallery plus one single-item presentation per remaining record.

use intake_common::api::{
    ClassifiedKind, Composite, Pagination, Presentation, ProcessedFileRecord, Strategy,
};
use intake_common::classify::{classify_batch, BatchKind};

/// Largest image count shown as a plain grid.
pub const GRID_MAX: usize = 6;
/// Largest image count shown as a masonry layout; beyond this is a lightbox.
pub const MASONRY_MAX: usize = 20;
pub const LIGHTBOX_PAGE_SIZE: usize = 20;

pub fn select_strategy(records: &[ProcessedFileRecord]) -> Presentation {
    if let [only] = records {
        return single(only);
    }
    match classify_batch(records) {
        BatchKind::Uniform(ClassifiedKind::Image) => image_gallery(ids(records.iter())),
        BatchKind::Uniform(kind) => plain(strategy_for_kind(kind), ids(records.iter())),
        BatchKind::Mixed => composite(records),
    }
}

/// Viewer for one record of `kind`.
pub fn strategy_for_kind(kind: ClassifiedKind) -> Strategy {
    match kind {
        ClassifiedKind::Image => Strategy::SingleImage,
        ClassifiedKind::Pdf => Strategy::PdfViewer,
        ClassifiedKind::Video | ClassifiedKind::Audio => Strategy::VideoPlayer,
        ClassifiedKind::Archive => Strategy::ArchiveExplorer,
        ClassifiedKind::Document
        | ClassifiedKind::Presentation
        | ClassifiedKind::Spreadsheet
        | ClassifiedKind::Other => Strategy::DocumentViewer,
    }
}

/// Gallery tier for `n` images.
pub fn image_tier(n: usize) -> (Strategy, Option<Pagination>) {
    match n {
        0 | 1 => (Strategy::SingleImage, None),
        2..=GRID_MAX => (Strategy::GridGallery, None),
        n if n <= MASONRY_MAX => (Strategy::MasonryGallery, None),
        _ => (
            Strategy::LightboxGallery,
            Some(Pagination { page_size: LIGHTBOX_PAGE_SIZE }),
        ),
    }
}

fn single(record: &ProcessedFileRecord) -> Presentation {
    plain(strategy_for_kind(record.kind), vec![record.id.clone()])
}

fn image_gallery(record_ids: Vec<String>) -> Presentation {
    let (strategy, pagination) = image_tier(record_ids.len());
    Presentation { strategy, record_ids, pagination, composite: None }
}

fn composite(records: &[ProcessedFileRecord]) -> Presentation {
    let (images, rest): (Vec<_>, Vec<_>) =
        records.iter().partition(|r| r.kind == ClassifiedKind::Image);
    let images = (!images.is_empty())
        .then(|| Box::new(image_gallery(ids(images.into_iter()))));
    let remainder = rest.into_iter().map(single).collect();
    Presentation {
        strategy: Strategy::CompositeMixed,
        record_ids: ids(records.iter()),
        pagination: None,
        composite: Some(Composite { images, remainder }),
    }
}

fn plain(strategy: Strategy, record_ids: Vec<String>) -> Presentation {
    Presentation { strategy, record_ids, pagination: None, composite: None }
}

fn ids<'a>(records: impl Iterator<Item = &'a ProcessedFileRecord>) -> Vec<String> {
    records.map(|r| r.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_common::api::KindMetadata;

    fn record(i: usize, kind: ClassifiedKind) -> ProcessedFileRecord {
        ProcessedFileRecord {
            id: format!("1-{i}-f"),
            display_name: "f".into(),
            original_name: "f".into(),
            extension: String::new(),
            size_bytes: 0,
            size_label: "0 B".into(),
            kind,
            content_type: String::new(),
            resource_uri: String::new(),
            thumbnails: Vec::new(),
            cover_image: None,
            metadata: KindMetadata::degraded(kind),
            remote_id: None,
            processing_error: None,
        }
    }

    fn many(n: usize, kind: ClassifiedKind) -> Vec<ProcessedFileRecord> {
        (0..n).map(|i| record(i, kind)).collect()
    }

    #[test]
    fn image_tiers_by_count() {
        assert_eq!(select_strategy(&many(1, ClassifiedKind::Image)).strategy, Strategy::SingleImage);
        assert_eq!(select_strategy(&many(2, ClassifiedKind::Image)).strategy, Strategy::GridGallery);
        assert_eq!(select_strategy(&many(6, ClassifiedKind::Image)).strategy, Strategy::GridGallery);
        assert_eq!(select_strategy(&many(7, ClassifiedKind::Image)).strategy, Strategy::MasonryGallery);
        assert_eq!(select_strategy(&many(20, ClassifiedKind::Image)).strategy, Strategy::MasonryGallery);

        let big = select_strategy(&many(21, ClassifiedKind::Image));
        assert_eq!(big.strategy, Strategy::LightboxGallery);
        assert_eq!(big.pagination, Some(Pagination { page_size: LIGHTBOX_PAGE_SIZE }));
        assert_eq!(big.record_ids.len(), 21);
    }

    #[test]
    fn single_records_use_kind_viewer() {
        for (kind, strategy) in [
            (ClassifiedKind::Pdf, Strategy::PdfViewer),
            (ClassifiedKind::Video, Strategy::VideoPlayer),
            (ClassifiedKind::Audio, Strategy::VideoPlayer),
            (ClassifiedKind::Archive, Strategy::ArchiveExplorer),
            (ClassifiedKind::Spreadsheet, Strategy::DocumentViewer),
            (ClassifiedKind::Other, Strategy::DocumentViewer),
        ] {
            let p = select_strategy(&many(1, kind));
            assert_eq!(p.strategy, strategy, "{kind}");
            assert_eq!(p.record_ids, vec!["1-0-f".to_string()]);
        }
    }

    #[test]
    fn uniform_non_image_batch_keeps_every_id() {
        let p = select_strategy(&many(3, ClassifiedKind::Pdf));
        assert_eq!(p.strategy, Strategy::PdfViewer);
        assert_eq!(p.record_ids.len(), 3);
        assert!(p.composite.is_none());
    }

    #[test]
    fn empty_batch_is_an_empty_document_viewer() {
        let p = select_strategy(&[]);
        assert_eq!(p.strategy, Strategy::DocumentViewer);
        assert!(p.record_ids.is_empty());
    }

    #[test]
    fn mixed_batch_is_one_level_composite() {
        let mut records = many(3, ClassifiedKind::Image);
        records.push(record(3, ClassifiedKind::Pdf));
        records.push(record(4, ClassifiedKind::Archive));

        let p = select_strategy(&records);
        assert_eq!(p.strategy, Strategy::CompositeMixed);
        assert_eq!(p.record_ids.len(), 5);
        let composite = p.composite.unwrap();
        let images = composite.images.unwrap();
        assert_eq!(images.strategy, Strategy::GridGallery);
        assert_eq!(images.record_ids.len(), 3);
        let rest: Vec<_> = composite.remainder.iter().map(|p| p.strategy).collect();
        assert_eq!(rest, vec![Strategy::PdfViewer, Strategy::ArchiveExplorer]);
        assert!(composite.remainder.iter().all(|p| p.composite.is_none()));
    }

    #[test]
    fn mixed_batch_without_images_has_no_gallery() {
        let records = vec![record(0, ClassifiedKind::Pdf), record(1, ClassifiedKind::Video)];
        let composite = select_strategy(&records).composite.unwrap();
        assert!(composite.images.is_none());
        assert_eq!(composite.remainder.len(), 2);
    }
}
