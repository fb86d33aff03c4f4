//! In-process stand-in for the external trigger mechanism
//!
//! [`LocalDriver`] owns a [`QueueInvoker`]. Workers enqueue downstream
//! invocations on it; the driver drains the queue batch by batch, runs each
//! batch in step order and retries invocations that fail transiently, until
//! nothing is left to run. Barrier payloads of one batch that would write the
//! same output are collapsed, so each bin is combined by one invocation.

use crate::app::ApplicationRegistry;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::keys::{ObjectKey, RunToken};
use crate::payload::TriggerPayload;
use crate::phases::{self, Outcome};
use crate::worker::{Worker, WorkerReport};
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use ripple_formats::FormatTag;
use ripple_store::{BlobStore, Invoker, Metadata, ObjectMeta, QueueInvoker};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of invocations of one step run at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default attempts per invocation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Totals for one drained run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriverReport {
    pub invocations: usize,
    pub retries: usize,
    pub skipped: usize,
    pub waiting: usize,
    /// Barrier payloads dropped because another payload of the same batch
    /// targets the same output
    pub deduplicated: usize,
    pub written: usize,
    /// Objects of the final stage, sorted by key
    #[serde(skip)]
    pub outputs: Vec<ObjectMeta>,
}

impl DriverReport {
    fn record(&mut self, report: &WorkerReport, retries: usize) {
        self.invocations += 1;
        self.retries += retries;
        self.written += report.written.len();
        match report.outcome {
            Outcome::Skipped => self.skipped += 1,
            Outcome::Waiting => self.waiting += 1,
            Outcome::Completed => {}
        }
    }

    pub fn output_keys(&self) -> Vec<&str> {
        self.outputs.iter().map(|meta| meta.key.as_str()).collect()
    }
}

pub struct LocalDriver {
    store: Arc<dyn BlobStore>,
    queue: Arc<QueueInvoker>,
    worker: Worker,
    concurrency: usize,
    max_attempts: u32,
}

impl LocalDriver {
    pub fn new(store: Arc<dyn BlobStore>, config: PipelineConfig) -> Self {
        let queue = Arc::new(QueueInvoker::new());
        let invoker: Arc<dyn Invoker> = queue.clone();
        Self {
            worker: Worker::new(Arc::clone(&store), invoker, Arc::new(config)),
            store,
            queue,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_applications(mut self, applications: ApplicationRegistry) -> Self {
        self.worker = self.worker.with_applications(applications);
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        self.worker.config()
    }

    pub fn queue(&self) -> &Arc<QueueInvoker> {
        &self.queue
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Store `content` as the stage-0 input of a new run.
    pub async fn upload(&self, name: &str, format: FormatTag, content: Bytes) -> PipelineResult<ObjectKey> {
        let key = ObjectKey::input(RunToken::now(), name, format.extension())?;
        self.store
            .put(&key.to_string(), content, Metadata::new())
            .await?;
        info!("Uploaded input {}", key);
        Ok(key)
    }

    /// Queue the first step on `input`.
    pub async fn start(&self, input: &ObjectKey) -> PipelineResult<()> {
        let config = self.config();
        let payload = TriggerPayload::new(&config.table, &input.to_string(), 0);
        self.queue
            .invoke(&config.function_name(0), payload.to_json()?)
            .await?;
        Ok(())
    }

    /// Run the pipeline on `input` to completion.
    pub async fn run(&self, input: &ObjectKey) -> PipelineResult<DriverReport> {
        self.start(input).await?;
        let mut report = self.drain().await?;
        let prefix = ObjectKey::run_prefix(self.config().final_stage(), input.run);
        report.outputs = self.store.list(&prefix).await?;
        info!(
            "Run {} finished: {} invocations, {} outputs",
            input.run,
            report.invocations,
            report.outputs.len()
        );
        Ok(report)
    }

    /// Execute queued invocations until the queue stays empty.
    pub async fn drain(&self) -> PipelineResult<DriverReport> {
        let mut report = DriverReport::default();
        loop {
            let batch = self.queue.drain();
            if batch.is_empty() {
                return Ok(report);
            }
            let mut payloads = batch
                .into_iter()
                .map(|invocation| {
                    debug!("Dispatching {}", invocation.function);
                    TriggerPayload::from_json(invocation.payload)
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            payloads.sort_by_key(TriggerPayload::step);
            report.deduplicated += self.dedupe_barriers(&mut payloads);

            for group in payloads.chunk_by(|a, b| a.step() == b.step()) {
                let results: Vec<(WorkerReport, usize)> = stream::iter(group)
                    .map(|payload| self.dispatch(payload))
                    .buffer_unordered(self.concurrency)
                    .try_collect()
                    .await?;
                for (worker_report, retries) in &results {
                    report.record(worker_report, *retries);
                }
            }
        }
    }

    /// Keep the first payload of each barrier output; returns how many were
    /// dropped. Payloads that fail to resolve are kept so the worker reports
    /// the error.
    fn dedupe_barriers(&self, payloads: &mut Vec<TriggerPayload>) -> usize {
        let config = self.config();
        let before = payloads.len();
        let mut seen = HashSet::new();
        payloads.retain(|payload| {
            let Ok(step) = config.step(payload.step()) else {
                return true;
            };
            let Ok(source) = payload.source() else {
                return true;
            };
            match phases::barrier_key(step, payload.step(), &source) {
                Some(out) if !seen.insert(out.clone()) => {
                    debug!("Dropping duplicate barrier for {} from {}", out, source);
                    false
                }
                _ => true,
            }
        });
        before - payloads.len()
    }

    async fn dispatch(&self, payload: &TriggerPayload) -> PipelineResult<(WorkerReport, usize)> {
        let mut attempt = 1;
        loop {
            match self.worker.execute(payload).await {
                Ok(report) => return Ok((report, attempt as usize - 1)),
                Err(e) if e.should_retry() && attempt < self.max_attempts => {
                    warn!(
                        "Step {} on {} failed (attempt {}/{}): {}",
                        payload.step(),
                        payload.source_key,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
