use crate::api::{ClassifiedKind, ProcessedFileRecord};

/// Kind of a whole batch: the shared kind when every record agrees, else `Mixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Uniform(ClassifiedKind),
    Mixed,
}

/// Classify a file from its declared content type and name.
///
/// Checks run in a fixed order and the first match wins:
///   PDF → presentation → document → spreadsheet → image → archive → video → audio
///
/// Office containers (Keynote, Pages, Numbers) are checked before images so an
/// ambiguous extension or a zip-flavoured content type cannot be misread.
/// Generic placeholder content types are ignored and only the extension counts.
pub fn classify(name: &str, declared_content_type: &str) -> ClassifiedKind {
    let ext = extension_of(name);
    let mime = normalize_content_type(declared_content_type);

    if is_pdf(&ext, &mime) {
        return ClassifiedKind::Pdf;
    }
    if is_presentation(&ext, &mime) {
        return ClassifiedKind::Presentation;
    }
    if is_document(&ext, &mime) {
        return ClassifiedKind::Document;
    }
    if is_spreadsheet(&ext, &mime) {
        return ClassifiedKind::Spreadsheet;
    }
    if is_image(&ext, &mime) {
        return ClassifiedKind::Image;
    }
    if is_archive(&ext, &mime) {
        return ClassifiedKind::Archive;
    }
    if is_video(&ext, &mime) {
        return ClassifiedKind::Video;
    }
    if is_audio(&ext, &mime) {
        return ClassifiedKind::Audio;
    }
    ClassifiedKind::Other
}

/// Homogeneity of a set of records. An empty set counts as `document`.
pub fn classify_batch(records: &[ProcessedFileRecord]) -> BatchKind {
    let Some(first) = records.first() else {
        return BatchKind::Uniform(ClassifiedKind::Document);
    };
    if records.iter().all(|r| r.kind == first.kind) {
        BatchKind::Uniform(first.kind)
    } else {
        BatchKind::Mixed
    }
}

/// Lower-cased extension without the dot; empty when there is none.
pub fn extension_of(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// True for the placeholder values browsers and upload forms send when they
/// do not know the real type.
pub fn is_generic_content_type(content_type: &str) -> bool {
    matches!(
        normalize_content_type(content_type).as_str(),
        "" | "application/octet-stream"
            | "binary/octet-stream"
            | "application/unknown"
            | "application/x-unknown"
    )
}

fn normalize_content_type(content_type: &str) -> String {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
    match essence.as_str() {
        "application/octet-stream"
        | "binary/octet-stream"
        | "application/unknown"
        | "application/x-unknown" => String::new(),
        _ => essence,
    }
}

fn is_pdf(ext: &str, mime: &str) -> bool {
    ext == "pdf" || matches!(mime, "application/pdf" | "application/x-pdf")
}

fn is_presentation(ext: &str, mime: &str) -> bool {
    matches!(ext, "ppt" | "pptx" | "pptm" | "pps" | "ppsx" | "key" | "odp")
        || mime.contains("presentation")
        || mime.contains("powerpoint")
        || mime.contains("keynote")
}

fn is_document(ext: &str, mime: &str) -> bool {
    matches!(
        ext,
        "doc" | "docx" | "docm" | "odt" | "rtf" | "txt" | "md" | "pages" | "epub"
    ) || mime.contains("msword")
        || mime.contains("wordprocessingml")
        || mime.contains("opendocument.text")
        || mime.contains("apple.pages")
        || matches!(mime, "text/plain" | "text/markdown" | "application/rtf" | "application/epub+zip")
}

fn is_spreadsheet(ext: &str, mime: &str) -> bool {
    matches!(ext, "xls" | "xlsx" | "xlsm" | "ods" | "csv" | "tsv" | "numbers")
        || mime.contains("spreadsheet")
        || mime.contains("ms-excel")
        || mime.contains("apple.numbers")
        || matches!(mime, "text/csv" | "text/tab-separated-values")
}

fn is_image(ext: &str, mime: &str) -> bool {
    matches!(
        ext,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "ico" | "webp" | "svg" | "avif"
            | "heic" | "heif" | "tiff" | "tif"
    ) || mime.starts_with("image/")
}

fn is_archive(ext: &str, mime: &str) -> bool {
    matches!(
        ext,
        "zip" | "tar" | "gz" | "bz2" | "xz" | "tgz" | "tbz2" | "txz" | "7z" | "rar"
    ) || matches!(
        mime,
        "application/zip"
            | "application/x-zip-compressed"
            | "application/x-tar"
            | "application/gzip"
            | "application/x-gzip"
            | "application/x-bzip2"
            | "application/x-xz"
            | "application/x-7z-compressed"
            | "application/vnd.rar"
            | "application/x-rar-compressed"
    )
}

fn is_video(ext: &str, mime: &str) -> bool {
    matches!(
        ext,
        "mp4" | "m4v" | "mkv" | "webm" | "avi" | "mov" | "wmv" | "flv" | "mpg" | "mpeg" | "3gp"
    ) || mime.starts_with("video/")
}

fn is_audio(ext: &str, mime: &str) -> bool {
    matches!(ext, "mp3" | "flac" | "ogg" | "m4a" | "aac" | "opus" | "wav" | "wma")
        || mime.starts_with("audio/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::KindMetadata;

    fn record(kind: ClassifiedKind) -> ProcessedFileRecord {
        ProcessedFileRecord {
            id: "0-0-x".into(),
            display_name: "x".into(),
            original_name: "x".into(),
            extension: String::new(),
            size_bytes: 0,
            size_label: "0 B".into(),
            kind,
            content_type: String::new(),
            resource_uri: String::new(),
            thumbnails: vec![],
            cover_image: None,
            metadata: KindMetadata::degraded(kind),
            remote_id: None,
            processing_error: None,
        }
    }

    #[test]
    fn classify_by_extension() {
        let cases = [
            ("report.pdf", ClassifiedKind::Pdf),
            ("deck.pptx", ClassifiedKind::Presentation),
            ("talk.key", ClassifiedKind::Presentation),
            ("letter.docx", ClassifiedKind::Document),
            ("notes.pages", ClassifiedKind::Document),
            ("budget.xlsx", ClassifiedKind::Spreadsheet),
            ("rows.csv", ClassifiedKind::Spreadsheet),
            ("photo.JPG", ClassifiedKind::Image),
            ("logo.svg", ClassifiedKind::Image),
            ("bundle.tar.gz", ClassifiedKind::Archive),
            ("clip.mov", ClassifiedKind::Video),
            ("song.flac", ClassifiedKind::Audio),
            ("main.rs", ClassifiedKind::Other),
            ("README", ClassifiedKind::Other),
        ];
        for (name, expected) in cases {
            assert_eq!(classify(name, ""), expected, "name={name}");
        }
    }

    #[test]
    fn classify_by_content_type_when_extension_is_unknown() {
        assert_eq!(classify("scan", "application/pdf"), ClassifiedKind::Pdf);
        assert_eq!(classify("blob", "image/png"), ClassifiedKind::Image);
        assert_eq!(classify("blob", "video/mp4"), ClassifiedKind::Video);
        assert_eq!(classify("blob", "audio/mpeg"), ClassifiedKind::Audio);
        assert_eq!(classify("blob", "application/zip"), ClassifiedKind::Archive);
        assert_eq!(
            classify("blob", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            ClassifiedKind::Spreadsheet
        );
        assert_eq!(classify("blob", "text/plain; charset=utf-8"), ClassifiedKind::Document);
    }

    #[test]
    fn precedence_resolves_ambiguous_inputs() {
        // PDF wins over an image content type.
        assert_eq!(classify("scan.pdf", "image/jpeg"), ClassifiedKind::Pdf);
        // Keynote bundles often arrive as zip.
        assert_eq!(classify("talk.key", "application/zip"), ClassifiedKind::Presentation);
        // Presentation is checked before document.
        assert_eq!(
            classify("slides", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
            ClassifiedKind::Presentation
        );
        // Pages before image, even with an image content type.
        assert_eq!(classify("cover.pages", "image/png"), ClassifiedKind::Document);
    }

    #[test]
    fn generic_content_type_is_ignored() {
        assert_eq!(classify("photo.png", "application/octet-stream"), ClassifiedKind::Image);
        assert_eq!(classify("blob", "application/octet-stream"), ClassifiedKind::Other);
        assert!(is_generic_content_type(""));
        assert!(is_generic_content_type("Application/Octet-Stream"));
        assert!(!is_generic_content_type("image/png"));
    }

    #[test]
    fn classify_is_idempotent() {
        for (name, ct) in [("a.pdf", ""), ("b", "image/gif"), ("c.zip", "application/zip")] {
            assert_eq!(classify(name, ct), classify(name, ct));
        }
    }

    #[test]
    fn extension_handling() {
        assert_eq!(extension_of("Photo.JPEG"), "jpeg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of(".bashrc"), "");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("dir.d/file"), "");
    }

    #[test]
    fn batch_kind() {
        assert_eq!(classify_batch(&[]), BatchKind::Uniform(ClassifiedKind::Document));
        let images = vec![record(ClassifiedKind::Image), record(ClassifiedKind::Image)];
        assert_eq!(classify_batch(&images), BatchKind::Uniform(ClassifiedKind::Image));
        let mixed = vec![record(ClassifiedKind::Image), record(ClassifiedKind::Pdf)];
        assert_eq!(classify_batch(&mixed), BatchKind::Mixed);
    }
}
