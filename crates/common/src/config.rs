use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Files processed concurrently within one chunk.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: default_concurrency() }
    }
}

impl BatchConfig {
    /// Chunk size actually used; a configured 0 behaves like 1.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_decode_timeout_ms")]
    pub decode_timeout_ms: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { decode_timeout_ms: default_decode_timeout_ms() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(default = "default_max_thumbnails")]
    pub max_thumbnails: u32,
    /// Rendered size relative to the page's size in points.
    #[serde(default = "default_thumbnail_scale")]
    pub thumbnail_scale: f32,
    /// Upper bound on the longest edge of a rendered thumbnail.
    #[serde(default = "default_max_thumbnail_px")]
    pub max_thumbnail_px: u32,
    #[serde(default = "default_pitch_deck_keywords")]
    pub pitch_deck_keywords: Vec<String>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_thumbnails: default_max_thumbnails(),
            thumbnail_scale: default_thumbnail_scale(),
            max_thumbnail_px: default_max_thumbnail_px(),
            pitch_deck_keywords: default_pitch_deck_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote file store. Remote resolution is off when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Serve the download address for viewing too.
    #[serde(default)]
    pub mirror: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { base_url: None, endpoint: default_endpoint(), mirror: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub follow_symlinks: bool,

    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: default_excludes(),
            follow_symlinks: false,
            include_hidden: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Regexes matched against `"{target}: {message}"`; matching events are dropped.
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_concurrency() -> usize { 3 }
fn default_decode_timeout_ms() -> u64 { 5000 }
fn default_max_thumbnails() -> u32 { 10 }
fn default_thumbnail_scale() -> f32 { 0.5 }
fn default_max_thumbnail_px() -> u32 { 480 }
fn default_endpoint() -> String { "/api/v1/file".into() }

fn default_pitch_deck_keywords() -> Vec<String> {
    ["pitch", "deck", "presentation", "slides"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excludes() -> Vec<String> {
    vec![
        "**/.git/**".into(),
        "**/node_modules/**".into(),
        "**/.DS_Store".into(),
        "**/Thumbs.db".into(),
    ]
}

/// `$INTAKE_CONFIG` if set, else `~/.config/intake/intake.toml`.
pub fn default_config_path() -> String {
    if let Ok(p) = std::env::var("INTAKE_CONFIG") {
        return p;
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    format!("{home}/.config/intake/intake.toml")
}

/// Parse a TOML config. Unknown keys are logged and otherwise ignored so an
/// older binary can read a newer file.
pub fn parse_config(text: &str) -> Result<IntakeConfig> {
    let de = toml::Deserializer::new(text);
    let mut unknown = Vec::new();
    let config: IntakeConfig = serde_ignored::deserialize(de, |path| {
        unknown.push(path.to_string());
    })
    .context("parsing intake config")?;
    for key in unknown {
        tracing::warn!("unknown config key ignored: {key}");
    }
    Ok(config)
}

/// Read and parse the config at `path`. A missing file yields the defaults.
pub fn load_config(path: &str) -> Result<IntakeConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text).with_context(|| format!("in {path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(IntakeConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading config {path}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.batch.concurrency, 3);
        assert_eq!(cfg.pdf.max_thumbnails, 10);
        assert_eq!(cfg.pdf.pitch_deck_keywords, ["pitch", "deck", "presentation", "slides"]);
        assert_eq!(cfg.remote.endpoint, "/api/v1/file");
        assert!(cfg.remote.base_url.is_none());
        assert!(!cfg.remote.mirror);
        assert!(cfg.log.ignore.is_empty());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
            [batch]
            concurrency = 8

            [remote]
            base_url = "https://files.example.com"
            mirror = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.batch.concurrency, 8);
        assert_eq!(cfg.remote.base_url.as_deref(), Some("https://files.example.com"));
        assert!(cfg.remote.mirror);
        assert_eq!(cfg.remote.endpoint, "/api/v1/file");
        assert_eq!(cfg.image.decode_timeout_ms, 5000);
    }

    #[test]
    fn unknown_keys_are_not_fatal() {
        let cfg = parse_config("[batch]\nconcurrency = 2\nturbo = true\n").unwrap();
        assert_eq!(cfg.batch.concurrency, 2);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let cfg = parse_config("[batch]\nconcurrency = 0\n").unwrap();
        assert_eq!(cfg.batch.effective_concurrency(), 1);
    }

    #[test]
    fn invalid_type_is_an_error() {
        assert!(parse_config("[batch]\nconcurrency = \"many\"\n").is_err());
    }

    #[test]
    fn missing_file_means_defaults() {
        let cfg = load_config("/nonexistent/intake.toml").unwrap();
        assert_eq!(cfg.batch.concurrency, 3);
    }
}
