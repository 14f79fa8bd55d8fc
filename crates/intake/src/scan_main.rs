use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use intake::lazy_header::FileHeaderLayer;
use intake::scan::{collect_inputs, load_manifest};
use intake::{select_strategy, IntakeSession, ProgressEvent, SubmitOutcome, UrlResolver};
use intake_common::config::{default_config_path, load_config};
use intake_common::logging::LogIgnoreFilter;

#[derive(Parser)]
#[command(name = "intake-scan", about = "Process a batch of files and print the intake report as JSON")]
struct Args {
    /// Files or directories to process, in order
    paths: Vec<PathBuf>,

    /// JSON manifest of files (path, name, contentType, remoteId) instead of paths
    #[arg(long, conflicts_with = "paths")]
    manifest: Option<PathBuf>,

    /// Path to config file (default: $INTAKE_CONFIG, else ~/.config/intake/intake.toml)
    #[arg(long)]
    config: Option<String>,

    /// Override the configured per-chunk concurrency
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print compact instead of pretty JSON
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    // The ignore filter comes from the config, so config warnings go through
    // a plain stderr subscriber.
    let bootstrap = tracing_subscriber::fmt().with_writer(std::io::stderr).finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || load_config(&config_path))?;
    if let Some(n) = args.concurrency {
        config.batch.concurrency = n;
    }

    let ignore = LogIgnoreFilter::from_patterns(&config.log.ignore)
        .context("invalid [log] ignore pattern")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn,intake=info".into()))
        .with(FileHeaderLayer)
        .with(tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(ignore))
        .init();

    let files = match &args.manifest {
        Some(manifest) => load_manifest(manifest)?,
        None => collect_inputs(&args.paths, &config.scan)?,
    };
    if files.is_empty() {
        tracing::info!("no files to process");
    }

    let session = IntakeSession::new(&config).with_observer(Arc::new(|event: ProgressEvent| {
        if let ProgressEvent::Finished { index, record_id, progress_percent, .. } = event {
            tracing::debug!("[{progress_percent:>3}%] file {index} done as {record_id}");
        }
    }));
    let resolver = UrlResolver::from_config(&config.remote);

    let outcome = session.submit(files).await;
    let records = session.records();
    let presentation = select_strategy(&records);
    let entries: Vec<_> = records
        .iter()
        .map(|r| json!({ "record": r, "urls": resolver.resolve(r) }))
        .collect();
    let report = json!({
        "state": session.state(),
        "presentation": presentation,
        "records": entries,
    });

    let out = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{out}");

    let released = session.teardown();
    tracing::debug!("released {released} handle(s)");

    match outcome {
        SubmitOutcome::Completed(_) => Ok(()),
        SubmitOutcome::Failed { message, .. } => bail!(message),
        SubmitOutcome::Superseded => bail!("batch was superseded"),
    }
}
