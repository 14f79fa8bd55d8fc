//! View and download addresses.
//!
//! Records backed by a remote store resolve to the store's file endpoint with
//! `mode=preview` or `mode=download`. Records without a remote id (or a
//! session with no remote configured) use their local handle for both.

use intake_common::api::{ProcessedFileRecord, ResolvedUrls};
use intake_common::config::RemoteConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Preview,
    Download,
}

impl FileMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FileMode::Preview => "preview",
            FileMode::Download => "download",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: Option<String>,
    endpoint: String,
    mirror: bool,
}

impl UrlResolver {
    pub fn from_config(cfg: &RemoteConfig) -> Self {
        let base_url = cfg
            .base_url
            .as_deref()
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        let endpoint = match cfg.endpoint.trim() {
            "" => "/".to_string(),
            e if e.starts_with('/') => e.to_string(),
            e => format!("/{e}"),
        };
        Self { base_url, endpoint, mirror: cfg.mirror }
    }

    pub fn resolve(&self, record: &ProcessedFileRecord) -> ResolvedUrls {
        record
            .remote_id
            .as_deref()
            .and_then(|id| self.resolve_id(id))
            .unwrap_or_else(|| ResolvedUrls {
                view_url: record.resource_uri.clone(),
                download_url: record.resource_uri.clone(),
            })
    }

    /// Addresses for a remote file id. `None` when no remote is configured.
    pub fn resolve_id(&self, remote_id: &str) -> Option<ResolvedUrls> {
        let base = self.base_url.as_deref()?;
        let download_url = self.file_url(base, remote_id, FileMode::Download);
        let view_url = if self.mirror {
            download_url.clone()
        } else {
            self.file_url(base, remote_id, FileMode::Preview)
        };
        Some(ResolvedUrls { view_url, download_url })
    }

    fn file_url(&self, base: &str, remote_id: &str, mode: FileMode) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("id", remote_id)
            .append_pair("mode", mode.as_str())
            .finish();
        format!("{base}{}?{query}", self.endpoint)
    }
}
