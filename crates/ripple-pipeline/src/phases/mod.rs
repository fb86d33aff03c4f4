//! Phase handlers
//!
//! Each handler runs one step for one trigger payload. Handlers never talk to
//! each other directly: they write objects and invoke the next step on them.

pub(crate) mod combine;
pub(crate) mod map;
pub(crate) mod matching;
pub(crate) mod partition;
pub(crate) mod pivot;
pub(crate) mod run;
pub(crate) mod split;
pub(crate) mod top;

use crate::app::ApplicationRegistry;
use crate::config::{PhaseConfig, PipelineConfig};
use crate::deadline::Deadline;
use crate::error::PipelineResult;
use crate::keys::{Coord, ObjectKey};
use crate::payload::{ExtraParams, TriggerPayload};
use futures::future::try_join_all;
use ripple_formats::{ChunkedIterator, Encoded, FormatTag, RecordCodec};
use ripple_store::{BlobStore, Entry, Invoker};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// Output already present, nothing written
    Skipped,
    /// A combine or match whose sibling partials have not all landed yet
    Waiting,
}

/// Output key the barrier step `config` (step `step`) writes for `source`;
/// `None` for steps that are not barriers.
pub(crate) fn barrier_key(config: &PhaseConfig, step: usize, source: &ObjectKey) -> Option<String> {
    let ext = match config {
        PhaseConfig::Combine { format, .. } => format.extension(),
        PhaseConfig::Match { .. } => matching::MATCH_EXTENSION,
        _ => return None,
    };
    Some(combine::barrier_output(source, PipelineConfig::output_stage(step), ext).to_string())
}

/// Everything one handler needs, plus what it has done so far.
pub(crate) struct PhaseContext<'a> {
    pub store: &'a Arc<dyn BlobStore>,
    invoker: &'a Arc<dyn Invoker>,
    pub config: &'a PipelineConfig,
    pub applications: &'a ApplicationRegistry,
    pub payload: &'a TriggerPayload,
    pub deadline: Deadline,
    pub outcome: Outcome,
    pub written: Vec<String>,
    pub invoked: usize,
}

impl<'a> PhaseContext<'a> {
    pub fn new(
        store: &'a Arc<dyn BlobStore>,
        invoker: &'a Arc<dyn Invoker>,
        config: &'a PipelineConfig,
        applications: &'a ApplicationRegistry,
        payload: &'a TriggerPayload,
    ) -> Self {
        Self {
            store,
            invoker,
            config,
            applications,
            payload,
            deadline: Deadline::new(config.timeout()),
            outcome: Outcome::Completed,
            written: Vec::new(),
            invoked: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.payload.step()
    }

    /// Stage of every object this invocation writes.
    pub fn output_stage(&self) -> u32 {
        PipelineConfig::output_stage(self.step())
    }

    pub fn params(&self) -> &ExtraParams {
        &self.payload.extra_params
    }

    /// Shard coordinate of this invocation, defaulting to that of the source.
    pub fn shard(&self, source: &ObjectKey) -> Coord {
        self.params().shard.unwrap_or(source.shard)
    }

    pub async fn open(&self, key: &str) -> PipelineResult<Entry> {
        Ok(Entry::open(Arc::clone(self.store), key).await?)
    }

    /// Iterator over the records of the source owned by this invocation.
    pub async fn source_iterator(
        &self,
        format: FormatTag,
    ) -> PipelineResult<ChunkedIterator<'static, dyn RecordCodec>> {
        let entry = self.open(&self.payload.source_key).await?;
        Ok(ChunkedIterator::new(entry, format.codec(), self.params().offsets, self.config.iterator).await?)
    }

    /// Write one output and trigger the next step on it.
    pub async fn write(&mut self, key: &ObjectKey, encoded: Encoded) -> PipelineResult<()> {
        self.deadline.check()?;
        let key = key.to_string();
        let length = encoded.content.len();
        self.store.put(&key, encoded.content, encoded.metadata).await?;
        info!("Wrote {} ({} bytes)", key, length);
        self.written.push(key.clone());
        self.invoke_all(vec![(key, ExtraParams::for_step(self.step() + 1))])
            .await
    }

    /// Invoke the step named in each params on its key. Submissions run
    /// concurrently and are awaited for acknowledgment only. Invocations past
    /// the last step are dropped.
    pub async fn invoke_all(&mut self, invocations: Vec<(String, ExtraParams)>) -> PipelineResult<()> {
        let steps = self.config.steps.len();
        let payloads = invocations
            .into_iter()
            .filter(|(_, params)| params.step < steps)
            .map(|(key, params)| {
                let function = self.config.function_name(params.step);
                self.payload
                    .child(&key, params)
                    .to_json()
                    .map(|json| (function, json))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        if payloads.is_empty() {
            return Ok(());
        }

        let invoker = self.invoker;
        try_join_all(
            payloads
                .iter()
                .map(|(function, json)| invoker.invoke(function, json.clone())),
        )
        .await?;
        debug!("Invoked {} downstream workers", payloads.len());
        self.invoked += payloads.len();
        Ok(())
    }
}
