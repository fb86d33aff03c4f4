//! Stateless pipeline workers for ripple
//!
//! A pipeline is a [`PipelineConfig`]: an ordered list of phase steps over a
//! table of immutable objects. A [`Worker`] executes one [`TriggerPayload`]
//! for one step, writes its outputs under deterministic [`ObjectKey`]s and
//! invokes the next step on each output. Workers share nothing but the
//! [`BlobStore`](ripple_store::BlobStore) and the
//! [`Invoker`](ripple_store::Invoker).
//!
//! The distributed sort built by [`PipelineConfig::sort`] runs:
//!
//! 1. split the input into byte-range shards
//! 2. sample candidate pivots per shard
//! 3. reduce all samples to global bin boundaries
//! 4. split again, handing every shard the boundaries
//! 5. partition each shard into sorted per-bin partials
//! 6. sort-merge every bin once all of its partials have landed
//!
//! Besides sorting, pipelines can keep the top records of each shard, hand
//! shards to registered applications, pick the best-scoring partial of each
//! bin (`match`) and fan a step out over every object under a prefix (`map`).
//!
//! [`LocalDriver`] runs a whole pipeline in process over any store.

pub mod app;
pub mod config;
pub mod deadline;
pub mod driver;
pub mod error;
pub mod keys;
pub mod payload;
mod phases;
pub mod worker;

pub use app::{Application, ApplicationInput, ApplicationOutput, ApplicationRegistry, Passthrough};
pub use config::{MapSource, MatchCriterion, Phase, PhaseConfig, PipelineConfig};
pub use deadline::Deadline;
pub use driver::{DriverReport, LocalDriver};
pub use error::{PipelineError, PipelineResult};
pub use keys::{Coord, ObjectKey, RunToken};
pub use payload::{AncestryLink, ExtraParams, TriggerPayload};
pub use phases::Outcome;
pub use worker::{Worker, WorkerReport};
