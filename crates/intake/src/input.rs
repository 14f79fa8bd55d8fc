use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a raw file's bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// One file handed to the core. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct RawFileInput {
    pub name: String,
    pub declared_size: u64,
    /// May be empty or a generic placeholder.
    pub declared_content_type: String,
    pub source: FileSource,
    /// Identifier in a remote file store, if the file is backed by one.
    pub remote_id: Option<String>,
}

impl RawFileInput {
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            declared_size: bytes.len() as u64,
            declared_content_type: content_type.into(),
            source: FileSource::Memory(bytes),
            remote_id: None,
        }
    }

    /// A file on disk. The size is read now if possible; an unreadable path
    /// is not rejected here; acquisition reports it per file.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let declared_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Self {
            name,
            declared_size,
            declared_content_type: String::new(),
            source: FileSource::Path(path.to_path_buf()),
            remote_id: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.declared_content_type = content_type.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_declares_length() {
        let f = RawFileInput::from_bytes("a.txt", "text/plain", b"hello".to_vec());
        assert_eq!(f.declared_size, 5);
        assert_eq!(f.declared_content_type, "text/plain");
        assert!(matches!(f.source, FileSource::Memory(_)));
    }

    #[test]
    fn from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("report.pdf");
        std::fs::write(&p, b"%PDF").unwrap();
        let f = RawFileInput::from_path(&p).with_remote_id("r-1");
        assert_eq!(f.name, "report.pdf");
        assert_eq!(f.declared_size, 4);
        assert_eq!(f.remote_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn from_missing_path_has_zero_size() {
        let f = RawFileInput::from_path("/nonexistent/ghost.png");
        assert_eq!(f.name, "ghost.png");
        assert_eq!(f.declared_size, 0);
    }
}
