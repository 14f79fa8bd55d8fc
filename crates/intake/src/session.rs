//! One intake session: the owner of every handle created for its batches.
//!
//! Each `submit` starts a new run and supersedes any run still in flight.
//! A superseded run finishes in the background; its results are discarded
//! and the handles it created are released as soon as it completes. Tearing
//! the session down (or dropping it) releases everything else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use intake_common::api::{BatchRunState, ProcessedFileRecord, RecordError};
use intake_common::config::IntakeConfig;

use crate::batch::{BatchOutcome, BatchProcessor, ProgressEvent, ProgressSink};
use crate::enrich::EnricherSet;
use crate::input::RawFileInput;
use crate::resources::ResourceRegistry;

pub type StateHandle = Arc<Mutex<BatchRunState>>;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Completed(Vec<ProcessedFileRecord>),
    /// A newer submission replaced this one before it finished.
    Superseded,
    Failed {
        completed: Vec<ProcessedFileRecord>,
        message: String,
    },
}

pub struct IntakeSession {
    registry: Arc<ResourceRegistry>,
    processor: BatchProcessor,
    state: StateHandle,
    records: Mutex<Vec<ProcessedFileRecord>>,
    current_run: Arc<AtomicU64>,
    observer: Option<Arc<dyn ProgressSink>>,
}

impl IntakeSession {
    pub fn new(config: &IntakeConfig) -> Self {
        Self::with_enrichers(config, EnricherSet::standard(config))
    }

    pub fn with_enrichers(config: &IntakeConfig, enrichers: EnricherSet) -> Self {
        let registry = Arc::new(ResourceRegistry::new());
        let processor = BatchProcessor::new(
            Arc::clone(&registry),
            enrichers,
            config.batch.effective_concurrency(),
        );
        Self {
            registry,
            processor,
            state: Arc::new(Mutex::new(BatchRunState::default())),
            records: Mutex::new(Vec::new()),
            current_run: Arc::new(AtomicU64::new(0)),
            observer: None,
        }
    }

    /// Also forward the current run's progress events to `observer`, after
    /// they have been applied to the session state.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressSink>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Process a new batch. The previous run's records are dropped and their
    /// handles released before the new run starts.
    pub async fn submit(&self, files: Vec<RawFileInput>) -> SubmitOutcome {
        let run = {
            let mut state = lock(&self.state);
            let run = self.current_run.fetch_add(1, Ordering::SeqCst) + 1;
            *state = BatchRunState::started();
            run
        };
        let previous = std::mem::take(&mut *lock(&self.records));
        self.release_records(&previous);

        let sink: Arc<dyn ProgressSink> = Arc::new(RunProgress {
            run,
            current_run: Arc::clone(&self.current_run),
            state: Arc::clone(&self.state),
            observer: self.observer.clone(),
        });
        let outcome = self.processor.process_batch(run, files, sink).await;

        let mut state = lock(&self.state);
        if self.current_run.load(Ordering::SeqCst) != run {
            drop(state);
            let stale = outcome.into_records();
            let released = self.release_records(&stale);
            info!("run {run}: superseded, discarded {} record(s), released {released} handle(s)", stale.len());
            return SubmitOutcome::Superseded;
        }

        state.is_processing = false;
        state.currently_processing = None;
        match outcome {
            BatchOutcome::Completed(records) => {
                state.progress_percent = 100;
                *lock(&self.records) = records.clone();
                info!("run {run}: {} record(s), {} error(s)", records.len(), state.errors.len());
                SubmitOutcome::Completed(records)
            }
            BatchOutcome::Failed { completed, message } => {
                warn!("run {run}: {message}");
                state.failure = Some(message.clone());
                *lock(&self.records) = completed.clone();
                SubmitOutcome::Failed { completed, message }
            }
        }
    }

    pub fn state(&self) -> BatchRunState {
        lock(&self.state).clone()
    }

    /// Records of the latest finished run.
    pub fn records(&self) -> Vec<ProcessedFileRecord> {
        lock(&self.records).clone()
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Release every handle the session owns and forget its records.
    /// Safe to call more than once.
    pub fn teardown(&self) -> usize {
        // Any run still in flight becomes stale.
        self.current_run.fetch_add(1, Ordering::SeqCst);
        lock(&self.records).clear();
        *lock(&self.state) = BatchRunState::default();
        let released = self.registry.release_all();
        if released > 0 {
            info!("session teardown released {released} handle(s)");
        }
        released
    }

    fn release_records(&self, records: &[ProcessedFileRecord]) -> usize {
        records.iter().map(|r| self.registry.release_record(r)).sum()
    }
}

impl Drop for IntakeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Applies one run's progress to the shared state, ignoring it once the run
/// is no longer current.
struct RunProgress {
    run: u64,
    current_run: Arc<AtomicU64>,
    state: StateHandle,
    observer: Option<Arc<dyn ProgressSink>>,
}

impl ProgressSink for RunProgress {
    fn on_event(&self, event: ProgressEvent) {
        {
            let mut state = lock(&self.state);
            if self.current_run.load(Ordering::SeqCst) != self.run {
                return;
            }
            match &event {
                ProgressEvent::Started { name, .. } => {
                    state.currently_processing = Some(name.clone());
                }
                ProgressEvent::Finished { record_id, error, progress_percent, .. } => {
                    state.progress_percent = state.progress_percent.max(*progress_percent);
                    if let Some(message) = error {
                        state.errors.push(RecordError {
                            record_id: record_id.clone(),
                            message: message.clone(),
                        });
                    }
                }
            }
        }
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str) -> RawFileInput {
        RawFileInput::from_bytes(name, "text/plain", b"hello".to_vec())
    }

    #[tokio::test]
    async fn completed_run_updates_state_and_records() {
        let session = IntakeSession::new(&IntakeConfig::default());
        let outcome = session
            .submit(vec![text("a.txt"), RawFileInput::from_path("/nonexistent/b.txt")])
            .await;
        let SubmitOutcome::Completed(records) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(records.len(), 2);

        let state = session.state();
        assert!(!state.is_processing);
        assert_eq!(state.progress_percent, 100);
        assert!(state.currently_processing.is_none());
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].record_id, records[1].id);
        assert!(!state.has_failed());
        assert_eq!(session.records(), records);
    }

    #[tokio::test]
    async fn empty_submission_is_not_a_failure() {
        let session = IntakeSession::new(&IntakeConfig::default());
        assert_eq!(session.submit(Vec::new()).await, SubmitOutcome::Completed(Vec::new()));
        let state = session.state();
        assert!(state.errors.is_empty());
        assert!(!state.has_failed());
    }

    #[tokio::test]
    async fn teardown_releases_everything() {
        let session = IntakeSession::new(&IntakeConfig::default());
        session.submit(vec![text("a.txt"), text("b.txt")]).await;
        let registry = Arc::clone(session.registry());
        assert_eq!(registry.live_count(), 2);

        assert_eq!(session.teardown(), 2);
        assert_eq!(session.teardown(), 0);
        assert!(session.records().is_empty());
        drop(session);
        assert_eq!(registry.acquired_total(), registry.released_total());
    }

    #[tokio::test]
    async fn resubmission_keeps_ids_unique() {
        let session = IntakeSession::new(&IntakeConfig::default());
        let first = session.submit(vec![text("a.txt")]).await;
        let second = session.submit(vec![text("a.txt")]).await;
        assert_eq!(session.registry().live_count(), 1);
        let (SubmitOutcome::Completed(a), SubmitOutcome::Completed(b)) = (first, second) else {
            panic!("expected completions");
        };
        assert_ne!(a[0].id, b[0].id);
    }
}
