//! Executes one trigger payload

use crate::app::ApplicationRegistry;
use crate::config::{Phase, PhaseConfig, PipelineConfig};
use crate::error::PipelineResult;
use crate::payload::TriggerPayload;
use crate::phases::{self, Outcome, PhaseContext};
use ripple_store::{BlobStore, Invoker};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub step: usize,
    pub phase: Phase,
    pub source_key: String,
    pub outcome: Outcome,
    pub written: Vec<String>,
    pub invoked: usize,
}

/// A stateless worker: everything it knows arrives in the payload or lives
/// in the store.
#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn BlobStore>,
    invoker: Arc<dyn Invoker>,
    config: Arc<PipelineConfig>,
    applications: Arc<ApplicationRegistry>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn BlobStore>,
        invoker: Arc<dyn Invoker>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            invoker,
            config,
            applications: Arc::new(ApplicationRegistry::with_builtins()),
        }
    }

    #[must_use]
    pub fn with_applications(mut self, applications: ApplicationRegistry) -> Self {
        self.applications = Arc::new(applications);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn handle_json(&self, payload: serde_json::Value) -> PipelineResult<WorkerReport> {
        self.execute(&TriggerPayload::from_json(payload)?).await
    }

    pub async fn execute(&self, payload: &TriggerPayload) -> PipelineResult<WorkerReport> {
        self.config.validate()?;
        let step = self.config.step(payload.step())?;
        info!(
            "Step {} ({}) on {}",
            payload.step(),
            step.phase(),
            payload.source_key
        );

        let mut ctx = PhaseContext::new(
            &self.store,
            &self.invoker,
            &self.config,
            &self.applications,
            payload,
        );
        match step {
            PhaseConfig::Split {
                split_size, ranges, ..
            } => phases::split::run(&mut ctx, *split_size, *ranges).await?,
            PhaseConfig::Pivot {
                format,
                identifier,
                num_bins,
            } => phases::pivot::run(&mut ctx, *format, *identifier, *num_bins).await?,
            PhaseConfig::Partition { format, identifier } => {
                phases::partition::run(&mut ctx, *format, *identifier).await?;
            }
            PhaseConfig::Combine { format, .. } => {
                let options = step
                    .combine_options(self.config.iterator)
                    .unwrap_or_default();
                phases::combine::run(&mut ctx, *format, options).await?;
            }
            PhaseConfig::Top {
                format,
                identifier,
                number,
            } => phases::top::run(&mut ctx, *format, *identifier, *number).await?,
            PhaseConfig::Run {
                format,
                application,
                params,
            } => phases::run::run(&mut ctx, *format, application, params).await?,
            PhaseConfig::Match {
                format,
                identifier,
                find,
            } => phases::matching::run(&mut ctx, *format, *identifier, *find).await?,
            PhaseConfig::Map { prefix, source, .. } => {
                phases::map::run(&mut ctx, prefix, *source).await?;
            }
        }

        Ok(WorkerReport {
            step: payload.step(),
            phase: step.phase(),
            source_key: payload.source_key.clone(),
            outcome: ctx.outcome,
            written: ctx.written,
            invoked: ctx.invoked,
        })
    }
}
