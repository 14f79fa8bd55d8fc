//! Turning command-line paths and manifests into raw file inputs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use tracing::warn;
use walkdir::WalkDir;

use intake_common::config::ScanConfig;

use crate::input::RawFileInput;

/// One entry of a JSON manifest: `[{"path": "...", "remoteId": "..."}]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl ManifestEntry {
    fn into_input(self, base: &Path) -> RawFileInput {
        let path = if self.path.is_absolute() { self.path } else { base.join(self.path) };
        let mut input = RawFileInput::from_path(path);
        if let Some(name) = self.name {
            input = input.with_name(name);
        }
        if let Some(ct) = self.content_type {
            input = input.with_content_type(ct);
        }
        if let Some(id) = self.remote_id {
            input = input.with_remote_id(id);
        }
        input
    }
}

/// Read a manifest. Relative paths resolve against the manifest's directory.
pub fn load_manifest(path: &Path) -> Result<Vec<RawFileInput>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&text)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    let base = path.parent().unwrap_or(Path::new("."));
    Ok(entries.into_iter().map(|e| e.into_input(base)).collect())
}

/// Expand paths into inputs, in argument order. Directories are walked in
/// file-name order; anything that is not a directory is taken as given so a
/// missing file still shows up as a degraded record.
pub fn collect_inputs(paths: &[PathBuf], scan: &ScanConfig) -> Result<Vec<RawFileInput>> {
    let excludes = build_globset(&scan.exclude)?;
    let mut inputs = Vec::new();
    for root in paths {
        if root.is_dir() {
            inputs.extend(walk_dir(root, scan, &excludes).into_iter().map(RawFileInput::from_path));
        } else {
            inputs.push(RawFileInput::from_path(root));
        }
    }
    Ok(inputs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat).with_context(|| format!("bad exclude pattern {pat}"))?);
        // `**/dir/**` should also stop the walk at `dir` itself.
        if let Some(dir_pat) = pat.strip_suffix("/**") {
            builder.add(Glob::new(dir_pat)?);
        }
    }
    Ok(builder.build()?)
}

fn walk_dir(root: &Path, scan: &ScanConfig, excludes: &GlobSet) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(scan.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if !scan.include_hidden
                && e.file_name().to_str().is_some_and(|n| n.starts_with('.'))
            {
                return false;
            }
            match e.path().strip_prefix(root) {
                Ok(rel) => !excludes.is_match(rel),
                Err(_) => true,
            }
        });
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(inputs: &[RawFileInput]) -> Vec<&str> {
        inputs.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn walks_sorted_and_skips_hidden_and_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("b.png"), b"x").unwrap();
        std::fs::write(root.join("a.pdf"), b"x").unwrap();
        std::fs::write(root.join(".secret"), b"x").unwrap();
        std::fs::create_dir(root.join("node_modules")).unwrap();
        std::fs::write(root.join("node_modules").join("dep.js"), b"x").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("sub").join("c.txt"), b"x").unwrap();

        let inputs = collect_inputs(&[root.to_path_buf()], &ScanConfig::default()).unwrap();
        assert_eq!(names(&inputs), vec!["a.pdf", "b.png", "c.txt"]);
    }

    #[test]
    fn include_hidden_keeps_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), b"x").unwrap();
        let scan = ScanConfig { include_hidden: true, ..ScanConfig::default() };
        let inputs = collect_inputs(&[dir.path().to_path_buf()], &scan).unwrap();
        assert_eq!(names(&inputs), vec![".env"]);
    }

    #[test]
    fn explicit_files_keep_argument_order() {
        let inputs = collect_inputs(
            &[PathBuf::from("/nonexistent/z.pdf"), PathBuf::from("/nonexistent/a.png")],
            &ScanConfig::default(),
        )
        .unwrap();
        assert_eq!(names(&inputs), vec!["z.pdf", "a.png"]);
    }

    #[test]
    fn manifest_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deck.pdf"), b"%PDF").unwrap();
        let manifest = dir.path().join("batch.json");
        std::fs::write(
            &manifest,
            r#"[{"path": "deck.pdf", "remoteId": "f-1"}, {"path": "/tmp/x", "name": "Photo.JPG", "contentType": "image/jpeg"}]"#,
        )
        .unwrap();

        let inputs = load_manifest(&manifest).unwrap();
        assert_eq!(inputs[0].declared_size, 4);
        assert_eq!(inputs[0].remote_id.as_deref(), Some("f-1"));
        assert_eq!(inputs[1].name, "Photo.JPG");
        assert_eq!(inputs[1].declared_content_type, "image/jpeg");
    }
}
