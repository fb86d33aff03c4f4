//! Opaque external compute run by the `run` phase

use crate::error::{PipelineError, PipelineResult};
use crate::keys::ObjectKey;
use async_trait::async_trait;
use bytes::Bytes;
use ripple_formats::{CodecContext, FormatTag};
use ripple_store::Metadata;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// The aligned records of one shard.
#[derive(Debug)]
pub struct ApplicationInput<'a> {
    pub source: &'a ObjectKey,
    pub format: FormatTag,
    pub records: Vec<Bytes>,
    /// Serialization context of the source, e.g. its header
    pub context: CodecContext,
    pub params: &'a BTreeMap<String, String>,
    /// Key a map step paired this shard with
    pub target: Option<&'a str>,
}

/// One object produced by an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationOutput {
    /// Extension of the output key
    pub ext: String,
    pub content: Bytes,
    pub metadata: Metadata,
}

#[async_trait]
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, input: ApplicationInput<'_>) -> PipelineResult<Vec<ApplicationOutput>>;
}

/// Re-serializes its input unchanged.
#[derive(Debug, Default)]
pub struct Passthrough;

#[async_trait]
impl Application for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn run(&self, input: ApplicationInput<'_>) -> PipelineResult<Vec<ApplicationOutput>> {
        let encoded = input.format.codec().from_array(&input.records, &input.context)?;
        Ok(vec![ApplicationOutput {
            ext: input.format.extension().to_string(),
            content: encoded.content,
            metadata: encoded.metadata,
        }])
    }
}

/// Applications available to `run` steps, by name.
#[derive(Clone, Default)]
pub struct ApplicationRegistry {
    applications: HashMap<String, Arc<dyn Application>>,
}

impl ApplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in [`Passthrough`] application.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Passthrough));
        registry
    }

    /// Add `application`, replacing any with the same name.
    pub fn register(&mut self, application: Arc<dyn Application>) {
        self.applications
            .insert(application.name().to_string(), application);
    }

    pub fn get(&self, name: &str) -> PipelineResult<&Arc<dyn Application>> {
        self.applications
            .get(name)
            .ok_or_else(|| PipelineError::UnknownApplication(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.applications.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ApplicationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationRegistry")
            .field("applications", &self.names())
            .finish()
    }
}
