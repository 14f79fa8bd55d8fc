use std::path::Path;
use std::process;

use intake_common::config::PdfConfig;
use intake_extract_pdf::{default_inspector, inspect, is_likely_pitch_deck, ThumbnailSpec};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: intake-extract-pdf <file-path> [max-thumbnails] [thumbnail-dir]");
        eprintln!();
        eprintln!("Inspects a PDF and prints page count, metadata and thumbnail sizes as JSON.");
        eprintln!("With a thumbnail-dir, also writes page-<n>.png for each rendered page.");
        process::exit(1);
    }

    let path = Path::new(&args[1]);
    let cfg = PdfConfig::default();
    let max_thumbnails = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.max_thumbnails);
    let spec = ThumbnailSpec { scale: cfg.thumbnail_scale, max_px: cfg.max_thumbnail_px };

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(1);
        }
    };

    match inspect(default_inspector().as_ref(), &bytes, max_thumbnails, &spec) {
        Ok(result) => {
            if let Some(dir) = args.get(3).map(Path::new) {
                for (i, png) in result.thumbnails.iter().enumerate() {
                    let out = dir.join(format!("page-{}.png", i + 1));
                    if let Err(e) = std::fs::write(&out, png) {
                        eprintln!("Error writing {}: {e}", out.display());
                        process::exit(1);
                    }
                }
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let report = serde_json::json!({
                "pageCount": result.page_count,
                "metadata": result.metadata,
                "isLikelyPitchDeck": is_likely_pitch_deck(name, &cfg.pitch_deck_keywords),
                "thumbnailBytes": result.thumbnails.iter().map(Vec::len).collect::<Vec<_>>(),
            });
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing to JSON: {e}");
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error inspecting PDF {}: {e:#}", path.display());
            process::exit(1);
        }
    }
}
