//! Chunked, order-preserving batch processing.
//!
//! Files run `concurrency` at a time. A chunk starts only after every file in
//! the previous chunk has finished, so one slow file holds back the next
//! chunk. Output is reassembled by input index, never by completion order.
//!
//! A file that fails or panics anywhere in its processing becomes a degraded
//! record and the batch carries on. Only a panic in the driver itself (for
//! example a progress sink that panics) stops the batch: in-flight work is
//! aborted, handles nobody will see are released, and the records finished
//! so far are returned with the failure.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use intake_common::api::{ClassifiedKind, KindMetadata, ProcessedFileRecord};
use intake_common::classify::{classify, extension_of, is_generic_content_type};
use intake_common::format::{display_name, format_size, slug};

use crate::enrich::{EnrichContext, EnricherSet, Enrichment};
use crate::input::RawFileInput;
use crate::resources::{HandleGuard, ResourceRegistry};

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        index: usize,
        name: String,
    },
    Finished {
        index: usize,
        record_id: String,
        /// Set when the record came out degraded.
        error: Option<String>,
        progress_percent: u8,
    },
}

/// Receives progress as files start and finish, from the batch driver.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: ProgressEvent) {
        self(event)
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed(Vec<ProcessedFileRecord>),
    /// The driver failed. `completed` holds the records that had finished,
    /// in input order.
    Failed {
        completed: Vec<ProcessedFileRecord>,
        message: String,
    },
}

impl BatchOutcome {
    /// Every record the batch produced, whatever the outcome.
    pub fn into_records(self) -> Vec<ProcessedFileRecord> {
        match self {
            BatchOutcome::Completed(records) => records,
            BatchOutcome::Failed { completed, .. } => completed,
        }
    }
}

type Workers = JoinSet<(usize, ProcessedFileRecord)>;

#[derive(Clone)]
pub struct BatchProcessor {
    registry: Arc<ResourceRegistry>,
    enrichers: Arc<EnricherSet>,
    concurrency: usize,
}

impl BatchProcessor {
    pub fn new(registry: Arc<ResourceRegistry>, enrichers: EnricherSet, concurrency: usize) -> Self {
        Self { registry, enrichers: Arc::new(enrichers), concurrency: concurrency.max(1) }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process `files` into records in input order. `run` goes into every
    /// record id so ids stay unique across runs of one session.
    pub async fn process_batch(
        &self,
        run: u64,
        files: Vec<RawFileInput>,
        sink: Arc<dyn ProgressSink>,
    ) -> BatchOutcome {
        let mut slots: Vec<Option<ProcessedFileRecord>> = vec![None; files.len()];
        let mut workers = Workers::new();

        info!("run {run}: processing {} file(s), {} at a time", files.len(), self.concurrency);

        let driven = AssertUnwindSafe(self.drive(run, files, sink.as_ref(), &mut slots, &mut workers))
            .catch_unwind()
            .await;

        let completed = slots.into_iter().flatten().collect();
        match driven {
            Ok(()) => BatchOutcome::Completed(completed),
            Err(panic) => {
                let message = format!("batch processing failed: {}", panic_message(&*panic));
                error!("run {run}: {message}");
                let released = self.abandon(&mut workers).await;
                if released > 0 {
                    info!("run {run}: released {released} handle(s) from abandoned work");
                }
                BatchOutcome::Failed { completed, message }
            }
        }
    }

    async fn drive(
        &self,
        run: u64,
        files: Vec<RawFileInput>,
        sink: &dyn ProgressSink,
        slots: &mut [Option<ProcessedFileRecord>],
        workers: &mut Workers,
    ) {
        let total = files.len();
        let mut finished = 0usize;
        let mut settle = |slots: &mut [Option<ProcessedFileRecord>], index: usize, record: ProcessedFileRecord| {
            finished += 1;
            let event = ProgressEvent::Finished {
                index,
                record_id: record.id.clone(),
                error: record.processing_error.clone(),
                progress_percent: progress_percent(finished, total),
            };
            // Stored before the sink sees it, so a failing sink cannot orphan it.
            slots[index] = Some(record);
            sink.on_event(event);
        };

        let mut pending = files.into_iter().enumerate().peekable();
        while pending.peek().is_some() {
            let mut chunk = Vec::with_capacity(self.concurrency);
            for (index, raw) in pending.by_ref().take(self.concurrency) {
                sink.on_event(ProgressEvent::Started { index, name: raw.name.clone() });
                let fallback = base_record(run, index, &raw);
                let this = self.clone();
                let on_panic = fallback.clone();
                workers.spawn(async move {
                    let record = match AssertUnwindSafe(this.process_file(run, index, raw))
                        .catch_unwind()
                        .await
                    {
                        Ok(record) => record,
                        Err(panic) => {
                            let msg = panic_message(&*panic);
                            warn!("{}: processing panicked: {msg}", on_panic.original_name);
                            failed(on_panic, format!("processing panicked: {msg}"))
                        }
                    };
                    (index, record)
                });
                chunk.push((index, fallback));
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((index, record)) => settle(&mut *slots, index, record),
                    Err(e) => warn!("run {run}: worker task did not finish: {e}"),
                }
            }

            // A worker that never reported back still owes its file a record.
            for (index, fallback) in chunk {
                if slots[index].is_none() {
                    settle(&mut *slots, index, failed(fallback, "processing was interrupted"));
                }
            }
        }
    }

    /// Abort every worker still running and release the handles of any
    /// record that will never be returned.
    async fn abandon(&self, workers: &mut Workers) -> usize {
        workers.abort_all();
        let mut released = 0;
        while let Some(joined) = workers.join_next().await {
            if let Ok((_, record)) = joined {
                released += self.registry.release_record(&record);
            }
        }
        released
    }

    /// Build one record. Never fails: every problem ends up in
    /// `processing_error` with safe defaults elsewhere.
    pub async fn process_file(&self, run: u64, index: usize, raw: RawFileInput) -> ProcessedFileRecord {
        let mut record = base_record(run, index, &raw);

        let acquired = match self.registry.acquire(&raw).await {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!("{}: could not open file: {e:#}", raw.name);
                record.processing_error = Some(format!("could not open file: {e:#}"));
                return record;
            }
        };
        // Released again if this future is dropped before the record is done.
        let handle = HandleGuard::new(&self.registry, acquired.uri.clone());

        // A sniffed type can still place an unrecognized name.
        if record.kind == ClassifiedKind::Other
            && is_generic_content_type(&raw.declared_content_type)
        {
            record.kind = classify(&raw.name, &acquired.content_type);
            record.metadata = KindMetadata::degraded(record.kind);
        }
        record.resource_uri = acquired.uri;
        record.content_type = acquired.content_type;
        record.size_bytes = acquired.size;
        record.size_label = format_size(acquired.size);

        if AssertUnwindSafe(self.enrich(&raw.name, &mut record)).catch_unwind().await.is_err() {
            warn!("{}: enrichment panicked", raw.name);
            record.processing_error = Some("enrichment panicked".to_string());
        }
        handle.keep();
        record
    }

    async fn enrich(&self, name: &str, record: &mut ProcessedFileRecord) {
        let kind = record.kind;
        let Some(enricher) = self.enrichers.for_kind(kind) else {
            record.processing_error = Some(format!("no enricher for {kind} files"));
            return;
        };

        let ctx = EnrichContext {
            name: name.to_string(),
            kind,
            resource_uri: record.resource_uri.clone(),
            content_type: record.content_type.clone(),
            registry: Arc::clone(&self.registry),
        };
        match enricher.enrich(&ctx).await {
            Ok(Enrichment { thumbnails, cover_image, metadata }) => {
                record.thumbnails = thumbnails;
                record.cover_image = cover_image;
                record.metadata = metadata;
            }
            Err(e) => {
                warn!("{name}: enrichment failed: {e:#}");
                record.processing_error = Some(format!("{e:#}"));
            }
        }
    }
}

/// A record carrying only what the raw input says, with safe defaults for
/// everything enrichment would fill in.
pub(crate) fn base_record(run: u64, index: usize, raw: &RawFileInput) -> ProcessedFileRecord {
    let kind = classify(&raw.name, &raw.declared_content_type);
    ProcessedFileRecord {
        id: record_id(run, index, &raw.name),
        display_name: display_name(&raw.name),
        original_name: raw.name.clone(),
        extension: extension_of(&raw.name),
        size_bytes: raw.declared_size,
        size_label: format_size(raw.declared_size),
        kind,
        content_type: raw.declared_content_type.clone(),
        resource_uri: String::new(),
        thumbnails: Vec::new(),
        cover_image: None,
        metadata: KindMetadata::degraded(kind),
        remote_id: raw.remote_id.clone(),
        processing_error: None,
    }
}

fn failed(mut record: ProcessedFileRecord, message: impl Into<String>) -> ProcessedFileRecord {
    record.processing_error = Some(message.into());
    record
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// `"{run}-{index}-{slug}"`.
pub fn record_id(run: u64, index: usize, name: &str) -> String {
    format!("{run}-{index}-{}", slug(name))
}

/// `round(finished * 100 / total)`; an empty batch is complete.
pub fn progress_percent(finished: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (finished.min(total) as f64 * 100.0 / total as f64).round();
    pct as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_common::config::IntakeConfig;

    fn processor() -> BatchProcessor {
        let config = IntakeConfig::default();
        BatchProcessor::new(
            Arc::new(ResourceRegistry::new()),
            EnricherSet::standard(&config),
            config.batch.effective_concurrency(),
        )
    }

    #[test]
    fn percent_rounds() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(0, 0), 100);
    }

    #[test]
    fn ids_carry_run_and_index() {
        assert_eq!(record_id(2, 5, "Q3 Report.pdf"), "2-5-q3-report-pdf");
    }

    #[tokio::test]
    async fn empty_batch_completes_with_nothing() {
        let out = processor().process_batch(1, Vec::new(), Arc::new(NoProgress)).await;
        assert_eq!(out, BatchOutcome::Completed(Vec::new()));
    }

    #[tokio::test]
    async fn unopenable_file_is_degraded() {
        let raw = RawFileInput::from_path("/nonexistent/photo.jpg");
        let record = processor().process_file(1, 0, raw).await;
        assert!(record.is_degraded());
        assert!(record.resource_uri.is_empty());
        assert!(record.thumbnails.is_empty());
        assert_eq!(record.kind, ClassifiedKind::Image);
        assert!(matches!(record.metadata, KindMetadata::Image { width: 0, height: 0, .. }));
    }

    #[tokio::test]
    async fn sniffed_type_reclassifies_unknown_names() {
        let raw = RawFileInput::from_bytes("upload", "", b"%PDF-1.4 not really".to_vec());
        let record = processor().process_file(1, 0, raw).await;
        assert_eq!(record.kind, ClassifiedKind::Pdf);
        assert_eq!(record.content_type, "application/pdf");
        assert!(!record.is_degraded());
        assert!(matches!(record.metadata, KindMetadata::Pdf { page_count: 1, .. }));
    }

    #[tokio::test]
    async fn generic_record_fields() {
        let raw = RawFileInput::from_bytes("Budget 2024.XLSX", "", vec![0u8; 1536]);
        let record = processor().process_file(3, 1, raw).await;
        assert_eq!(record.id, "3-1-budget-2024-xlsx");
        assert_eq!(record.display_name, "Budget 2024");
        assert_eq!(record.extension, "xlsx");
        assert_eq!(record.size_label, "1.5 KB");
        assert_eq!(record.kind, ClassifiedKind::Spreadsheet);
        assert_eq!(record.thumbnails, vec!["/icons/spreadsheet.svg".to_string()]);
    }
}
