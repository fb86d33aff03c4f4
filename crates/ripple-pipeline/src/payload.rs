//! Typed trigger payloads
//!
//! Every invocation carries the object it was triggered by, the phase
//! parameters of the step it runs, and the chain of objects that led to it.
//! Unknown fields are rejected so a payload written for a different pipeline
//! version fails loudly instead of being half understood.

use crate::error::{PipelineError, PipelineResult};
use crate::keys::{Coord, ObjectKey};
use ripple_formats::OffsetBounds;
use serde::{Deserialize, Serialize};

/// One hop of provenance: step `stage` consumed `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AncestryLink {
    pub stage: usize,
    pub key: String,
}

/// Phase parameters of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraParams {
    /// Zero-based index of the pipeline step to execute
    pub step: usize,
    /// Byte range of the source owned by this worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<OffsetBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<Coord>,
    /// Global bin boundaries for partitioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivots: Option<Vec<f64>>,
    /// Key a map step paired this invocation's source with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ExtraParams {
    pub fn for_step(step: usize) -> Self {
        Self {
            step,
            offsets: None,
            shard: None,
            bin: None,
            pivots: None,
            target: None,
        }
    }

    pub fn with_offsets(mut self, offsets: OffsetBounds) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn with_shard(mut self, shard: Coord) -> Self {
        self.shard = Some(shard);
        self
    }

    pub fn with_bin(mut self, bin: Coord) -> Self {
        self.bin = Some(bin);
        self
    }

    pub fn with_pivots(mut self, pivots: Vec<f64>) -> Self {
        self.pivots = Some(pivots);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerPayload {
    pub source_table: String,
    pub source_key: String,
    pub extra_params: ExtraParams,
    #[serde(default)]
    pub ancestry: Vec<AncestryLink>,
}

impl TriggerPayload {
    /// Payload starting a pipeline at `step` on an uploaded object.
    pub fn new(table: &str, key: &str, step: usize) -> Self {
        Self {
            source_table: table.to_string(),
            source_key: key.to_string(),
            extra_params: ExtraParams::for_step(step),
            ancestry: Vec::new(),
        }
    }

    /// Payload for a downstream invocation on `key`, extending the ancestry
    /// with this payload's own source.
    pub fn child(&self, key: &str, params: ExtraParams) -> Self {
        let mut ancestry = self.ancestry.clone();
        ancestry.push(AncestryLink {
            stage: self.extra_params.step,
            key: self.source_key.clone(),
        });
        Self {
            source_table: self.source_table.clone(),
            source_key: key.to_string(),
            extra_params: params,
            ancestry,
        }
    }

    pub fn step(&self) -> usize {
        self.extra_params.step
    }

    /// The source key, parsed.
    pub fn source(&self) -> PipelineResult<ObjectKey> {
        self.source_key.parse()
    }

    pub fn from_json(value: serde_json::Value) -> PipelineResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> PipelineResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub(crate) fn require<T: Clone>(
        &self,
        field: &'static str,
        value: Option<&T>,
    ) -> PipelineResult<T> {
        value.cloned().ok_or(PipelineError::MissingParam {
            step: self.step(),
            field,
        })
    }
}
