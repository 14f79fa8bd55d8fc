//! Local resource handles.
//!
//! Every handle the core creates is tracked here until it is released, so the
//! owning session can revoke all of them on teardown. Releasing an address
//! that is not live is a no-op.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;

use intake_common::api::ProcessedFileRecord;
use intake_common::classify::{extension_of, is_generic_content_type};

use crate::input::{FileSource, RawFileInput};

pub const URI_PREFIX: &str = "blob:intake/";

/// Bytes inspected when sniffing an unknown content type.
const SNIFF_LEN: usize = 8192;

const OCTET_STREAM: &str = "application/octet-stream";

struct Resource {
    source: FileSource,
    content_type: String,
}

/// A freshly acquired handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredResource {
    pub uri: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Default)]
pub struct ResourceRegistry {
    live: Mutex<HashMap<String, Resource>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle for a raw file. Fails when a path-backed file is
    /// missing or unreadable; memory-backed files always succeed.
    pub async fn acquire(&self, raw: &RawFileInput) -> Result<AcquiredResource> {
        let size = match &raw.source {
            FileSource::Path(path) => {
                let meta = tokio::fs::metadata(path)
                    .await
                    .with_context(|| format!("opening {}", path.display()))?;
                if !meta.is_file() {
                    bail!("{} is not a regular file", path.display());
                }
                meta.len()
            }
            FileSource::Memory(bytes) => bytes.len() as u64,
        };

        let content_type = if is_generic_content_type(&raw.declared_content_type) {
            effective_content_type(raw).await
        } else {
            raw.declared_content_type.trim().to_string()
        };

        let uri = self.insert(raw.source.clone(), content_type.clone());
        tracing::debug!("acquired {uri} for {} ({content_type})", raw.name);
        Ok(AcquiredResource { uri, content_type, size })
    }

    /// Create a handle over bytes produced by the core itself (thumbnails).
    pub fn acquire_bytes(&self, bytes: Vec<u8>, content_type: &str) -> String {
        self.insert(FileSource::Memory(bytes.into()), content_type.to_string())
    }

    fn insert(&self, source: FileSource, content_type: String) -> String {
        let uri = format!("{URI_PREFIX}{}", uuid::Uuid::new_v4());
        self.entries().insert(uri.clone(), Resource { source, content_type });
        self.acquired.fetch_add(1, Ordering::Relaxed);
        uri
    }

    /// Read the full contents behind a live handle.
    pub async fn read(&self, uri: &str) -> Result<Arc<[u8]>> {
        let source = self
            .entries()
            .get(uri)
            .map(|r| r.source.clone())
            .with_context(|| format!("{uri} is not a live resource"))?;
        match source {
            FileSource::Memory(bytes) => Ok(bytes),
            FileSource::Path(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                Ok(bytes.into())
            }
        }
    }

    pub fn content_type(&self, uri: &str) -> Option<String> {
        self.entries().get(uri).map(|r| r.content_type.clone())
    }

    pub fn is_live(&self, uri: &str) -> bool {
        self.entries().contains_key(uri)
    }

    /// Revoke one handle. Returns whether it was live.
    pub fn release(&self, uri: &str) -> bool {
        let removed = self.entries().remove(uri).is_some();
        if removed {
            self.released.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Revoke a record's resource handle and its thumbnails. Returns how many
    /// were live.
    pub fn release_record(&self, record: &ProcessedFileRecord) -> usize {
        std::iter::once(&record.resource_uri)
            .chain(record.thumbnails.iter())
            .filter(|uri| self.release(uri))
            .count()
    }

    /// Revoke every live handle. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let drained = {
            let mut live = self.entries();
            let n = live.len();
            live.clear();
            n
        };
        self.released.fetch_add(drained as u64, Ordering::Relaxed);
        drained
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    pub fn acquired_total(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released_total(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Resource>> {
        // The map stays consistent even if a holder panicked.
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases a handle on drop unless [`HandleGuard::keep`] is called.
pub struct HandleGuard<'a> {
    registry: &'a ResourceRegistry,
    uri: Option<String>,
}

impl<'a> HandleGuard<'a> {
    pub fn new(registry: &'a ResourceRegistry, uri: String) -> Self {
        Self { registry, uri: Some(uri) }
    }

    /// Hand the handle over to whoever holds its address.
    pub fn keep(mut self) {
        self.uri = None;
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        if let Some(uri) = self.uri.take() {
            tracing::debug!("releasing unclaimed handle {uri}");
            self.registry.release(&uri);
        }
    }
}

/// Content type for a file whose declared type is missing or generic.
///
/// Name-based lookup first (a fixed table for the types the classifier cares
/// about, then `mime_guess`), then magic bytes, then a text/binary check.
async fn effective_content_type(raw: &RawFileInput) -> String {
    if let Some(ct) = content_type_from_name(&raw.name) {
        return ct.to_string();
    }
    let head = match &raw.source {
        FileSource::Memory(bytes) => bytes[..bytes.len().min(SNIFF_LEN)].to_vec(),
        FileSource::Path(path) => read_head(path).await.unwrap_or_default(),
    };
    content_type_from_bytes(&head).to_string()
}

async fn read_head(path: &Path) -> Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

pub fn content_type_from_name(name: &str) -> Option<&'static str> {
    let ext = extension_of(name);
    if ext.is_empty() {
        return None;
    }
    known_content_type(&ext).or_else(|| mime_guess::from_ext(&ext).first_raw())
}

pub fn content_type_from_bytes(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return OCTET_STREAM;
    }
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }
    if content_inspector::inspect(head).is_text() {
        return "text/plain";
    }
    OCTET_STREAM
}

fn known_content_type(ext: &str) -> Option<&'static str> {
    let ct = match ext {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "key" => "application/x-iwork-keynote-sffkey",
        "pages" => "application/x-iwork-pages-sffpages",
        "numbers" => "application/x-iwork-numbers-sffnumbers",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => return None,
    };
    Some(ct)
}
