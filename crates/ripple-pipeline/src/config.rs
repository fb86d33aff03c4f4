//! Pipeline configuration
//!
//! A pipeline is an ordered list of steps. Step `i` reads objects of stage
//! `i` and writes objects of stage `i + 1`; uploaded inputs are stage 0.

use crate::error::{PipelineError, PipelineResult};
use ripple_formats::{CombineOptions, DEFAULT_NUM_BINS, FormatTag, Identifier, IteratorOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default target bytes per shard.
pub const DEFAULT_SPLIT_SIZE: u64 = 100 * 1000 * 1000;

/// Default worker time budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 900;

fn default_split_size() -> u64 {
    DEFAULT_SPLIT_SIZE
}

fn default_num_bins() -> usize {
    DEFAULT_NUM_BINS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Split,
    Pivot,
    Partition,
    Combine,
    Top,
    Run,
    Match,
    Map,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::Pivot => "pivot",
            Self::Partition => "partition",
            Self::Combine => "combine",
            Self::Top => "top",
            Self::Run => "run",
            Self::Match => "match",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a match step scores each candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCriterion {
    /// Sum of the identifier over every record
    #[default]
    MaxSum,
}

/// Which key a map step hands to the next step as its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSource {
    /// The triggering object stays the source; the listed key is the target
    #[default]
    Input,
    /// The listed key becomes the source; the triggering object is the target
    Target,
}

/// One pipeline step and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case", deny_unknown_fields)]
pub enum PhaseConfig {
    /// Fan out byte-range shards of the source. With `ranges`, the source is
    /// a reduced pivot file and every shard carries its boundaries.
    Split {
        format: FormatTag,
        #[serde(default = "default_split_size")]
        split_size: u64,
        #[serde(default)]
        ranges: bool,
    },
    /// Sample candidate pivots from one shard.
    Pivot {
        format: FormatTag,
        identifier: Identifier,
        #[serde(default = "default_num_bins")]
        num_bins: usize,
    },
    /// Assign one shard's records to pivot bins, sorted within each bin.
    Partition {
        format: FormatTag,
        identifier: Identifier,
    },
    /// Merge every shard's partial output for one bin.
    Combine {
        format: FormatTag,
        #[serde(default)]
        sort: bool,
        #[serde(default)]
        identifier: Option<Identifier>,
        #[serde(default)]
        k: Option<usize>,
        #[serde(default = "default_num_bins")]
        num_bins: usize,
    },
    /// Keep the `number` records with the highest identifier values.
    Top {
        format: FormatTag,
        identifier: Identifier,
        number: usize,
    },
    /// Hand one shard's records to a registered application.
    Run {
        format: FormatTag,
        application: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },
    /// Once every shard of a bin has landed, record the key of the
    /// best-scoring partial.
    Match {
        format: FormatTag,
        identifier: Identifier,
        #[serde(default)]
        find: MatchCriterion,
    },
    /// Invoke the next step once for every object listed under `prefix`.
    Map {
        format: FormatTag,
        prefix: String,
        #[serde(default)]
        source: MapSource,
    },
}

impl PhaseConfig {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Split { .. } => Phase::Split,
            Self::Pivot { .. } => Phase::Pivot,
            Self::Partition { .. } => Phase::Partition,
            Self::Combine { .. } => Phase::Combine,
            Self::Top { .. } => Phase::Top,
            Self::Run { .. } => Phase::Run,
            Self::Match { .. } => Phase::Match,
            Self::Map { .. } => Phase::Map,
        }
    }

    pub fn format(&self) -> FormatTag {
        match self {
            Self::Split { format, .. }
            | Self::Pivot { format, .. }
            | Self::Partition { format, .. }
            | Self::Combine { format, .. }
            | Self::Top { format, .. }
            | Self::Run { format, .. }
            | Self::Match { format, .. }
            | Self::Map { format, .. } => *format,
        }
    }

    /// Options for a combine step; `None` for every other phase.
    pub fn combine_options(&self, iterator: IteratorOptions) -> Option<CombineOptions> {
        match self {
            Self::Combine {
                sort,
                identifier,
                k,
                num_bins,
                ..
            } => Some(CombineOptions {
                sort: *sort,
                identifier: *identifier,
                k: *k,
                num_bins: *num_bins,
                iterator,
            }),
            _ => None,
        }
    }

    /// Whether this step waits for every shard of a bin before acting.
    pub fn is_barrier(&self) -> bool {
        matches!(self, Self::Combine { .. } | Self::Match { .. })
    }

    fn is_pivot_combine(&self) -> bool {
        matches!(self, Self::Combine { format: FormatTag::Pivot, .. })
    }

    fn is_range_split(&self) -> bool {
        matches!(self, Self::Split { ranges: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: String,
    /// Table (bucket) all objects of this pipeline live in
    pub table: String,
    pub steps: Vec<PhaseConfig>,
    #[serde(default)]
    pub iterator: IteratorOptions,
    /// Worker time budget
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PipelineConfig {
    /// The six-step distributed sort: split, sample pivots, reduce pivots,
    /// split along the pivots, partition and sort-merge each bin.
    pub fn sort(
        name: &str,
        table: &str,
        format: FormatTag,
        identifier: Identifier,
        split_size: u64,
        num_bins: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            steps: vec![
                PhaseConfig::Split {
                    format,
                    split_size,
                    ranges: false,
                },
                PhaseConfig::Pivot {
                    format,
                    identifier,
                    num_bins,
                },
                PhaseConfig::Combine {
                    format: FormatTag::Pivot,
                    sort: false,
                    identifier: None,
                    k: None,
                    num_bins,
                },
                PhaseConfig::Split {
                    format,
                    split_size,
                    ranges: true,
                },
                PhaseConfig::Partition { format, identifier },
                PhaseConfig::Combine {
                    format,
                    sort: true,
                    identifier: Some(identifier),
                    k: None,
                    num_bins,
                },
            ],
            iterator: IteratorOptions::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn step(&self, step: usize) -> PipelineResult<&PhaseConfig> {
        self.steps.get(step).ok_or(PipelineError::UnknownStep {
            step,
            steps: self.steps.len(),
        })
    }

    /// Stage number of the objects written by `step`.
    pub fn output_stage(step: usize) -> u32 {
        step as u32 + 1
    }

    /// Stage number of the pipeline's final outputs.
    pub fn final_stage(&self) -> u32 {
        Self::output_stage(self.steps.len().saturating_sub(1))
    }

    /// Name under which `step` is invoked.
    pub fn function_name(&self, step: usize) -> String {
        match self.steps.get(step) {
            Some(config) => format!("{}-{}-{}", self.name, step, config.phase()),
            None => format!("{}-{}", self.name, step),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check every step and the links between consecutive steps.
    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.name.is_empty() || self.name.contains('/') {
            return invalid(format!("bad pipeline name {:?}", self.name));
        }
        if self.table.is_empty() {
            return invalid("table must not be empty".to_string());
        }
        if self.steps.is_empty() {
            return invalid("pipeline has no steps".to_string());
        }
        if self.timeout_secs == 0 {
            return invalid("timeout must be positive".to_string());
        }
        if self.iterator.chunk_size == 0 || self.iterator.adjust_window == 0 {
            return invalid("iterator chunk size and window must be positive".to_string());
        }

        for (i, step) in self.steps.iter().enumerate() {
            let previous = i.checked_sub(1).and_then(|p| self.steps.get(p));
            let next = self.steps.get(i + 1);
            let at = |msg: &str| PipelineError::InvalidConfig(format!("step {i} ({}): {msg}", step.phase()));
            let supports = |format: FormatTag, identifier: Identifier| {
                if format.codec().supports(identifier) {
                    Ok(())
                } else {
                    Err(at(&format!("{format} has no identifier {identifier}")))
                }
            };

            match step {
                PhaseConfig::Split {
                    split_size, ranges, ..
                } => {
                    if *split_size == 0 {
                        return Err(at("split size must be positive"));
                    }
                    if *ranges && !previous.is_some_and(PhaseConfig::is_pivot_combine) {
                        return Err(at("range split must follow a pivot combine"));
                    }
                    if next.is_none() {
                        return Err(at("split must be followed by another step"));
                    }
                }
                PhaseConfig::Pivot {
                    format,
                    identifier,
                    num_bins,
                } => {
                    supports(*format, *identifier)?;
                    if *num_bins == 0 {
                        return Err(at("num_bins must be positive"));
                    }
                    if !next.is_some_and(PhaseConfig::is_pivot_combine) {
                        return Err(at("pivot must be followed by a pivot combine"));
                    }
                }
                PhaseConfig::Partition { format, identifier } => {
                    supports(*format, *identifier)?;
                    if !previous.is_some_and(PhaseConfig::is_range_split) {
                        return Err(at("partition must follow a range split"));
                    }
                }
                PhaseConfig::Combine {
                    format,
                    sort,
                    identifier,
                    k,
                    num_bins,
                } => {
                    if *format == FormatTag::Pivot {
                        if *num_bins == 0 {
                            return Err(at("num_bins must be positive"));
                        }
                    } else if *sort {
                        let identifier = identifier.ok_or_else(|| at("sorted combine needs an identifier"))?;
                        supports(*format, identifier)?;
                        if *format == FormatTag::Knn && !k.is_some_and(|k| k > 0) {
                            return Err(at("knn combine needs k > 0"));
                        }
                    }
                }
                PhaseConfig::Top {
                    format,
                    identifier,
                    number,
                } => {
                    supports(*format, *identifier)?;
                    if *number == 0 {
                        return Err(at("number must be positive"));
                    }
                }
                PhaseConfig::Run { application, .. } => {
                    if application.is_empty() {
                        return Err(at("application name must not be empty"));
                    }
                }
                PhaseConfig::Match {
                    format, identifier, ..
                } => supports(*format, *identifier)?,
                PhaseConfig::Map { .. } => {
                    if next.is_none() {
                        return Err(at("map must be followed by another step"));
                    }
                }
            }
        }
        Ok(())
    }
}
