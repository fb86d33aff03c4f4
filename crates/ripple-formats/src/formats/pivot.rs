//! Pivot files and key-range bins for distributed sort
//!
//! A pivot file names the table and key of the input being sorted, followed by
//! a tab-separated list of sampled keys:
//!
//! ```text
//! table
//! 0/1700000000.500000-42/1-1/1-1-1-input.txt
//! 1.5	8	13.25	40
//! ```
//!
//! Shards write their local samples in this format; the pivot combine
//! reduces all samples to `num_bins + 1` global boundaries.

use crate::codec::{Encoded, RecordCodec};
use crate::combine::CombineOptions;
use crate::delimiter::{Delimiter, DelimiterPosition};
use crate::error::{FormatError, FormatResult};
use crate::tag::FormatTag;
use async_trait::async_trait;
use bytes::Bytes;
use ripple_store::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const PIVOT_DELIMITER: Delimiter = Delimiter::new(b"\n\n", DelimiterPosition::Inbetween);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotFile {
    pub table: String,
    pub key: String,
    pub pivots: Vec<f64>,
}

impl PivotFile {
    pub fn parse(content: &[u8]) -> FormatResult<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|e| FormatError::InvalidPivots(format!("invalid UTF-8: {e}")))?;
        let mut lines = text.splitn(3, '\n');
        let table = lines.next().unwrap_or_default().trim();
        let key = lines.next().unwrap_or_default().trim();
        if table.is_empty() || key.is_empty() {
            return Err(FormatError::InvalidPivots(
                "expected table and key lines".to_string(),
            ));
        }
        let pivots = lines
            .next()
            .unwrap_or_default()
            .trim()
            .split('\t')
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<f64>()
                    .ok()
                    .filter(|v| !v.is_nan())
                    .ok_or_else(|| FormatError::InvalidPivots(format!("bad pivot {p:?}")))
            })
            .collect::<FormatResult<Vec<_>>>()?;
        Ok(Self {
            table: table.to_string(),
            key: key.to_string(),
            pivots,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = format!("{}\n{}\n", self.table, self.key);
        for (i, p) in self.pivots.iter().enumerate() {
            if i > 0 {
                out.push('\t');
            }
            out.push_str(&p.to_string());
        }
        Bytes::from(out)
    }
}

/// Sorted, deduplicated keys with NaN removed.
fn sorted_unique(mut keys: Vec<f64>) -> Vec<f64> {
    keys.retain(|k| !k.is_nan());
    keys.sort_by(f64::total_cmp);
    keys.dedup();
    keys
}

/// Smallest value strictly greater than `max`.
fn above(max: f64) -> f64 {
    if max + 1.0 > max {
        max + 1.0
    } else {
        max.next_up()
    }
}

/// One shard's candidate pivots: an evenly spaced subsequence of its distinct
/// keys, about `num_bins` long, always ending with the local maximum.
pub fn sample_pivots(keys: Vec<f64>, num_bins: usize) -> Vec<f64> {
    let unique = sorted_unique(keys);
    let num_bins = num_bins.max(1);
    if unique.len() <= num_bins {
        return unique;
    }
    let step = unique.len().div_ceil(num_bins);
    let mut sample: Vec<f64> = unique.iter().copied().step_by(step).collect();
    if let Some(&max) = unique.last()
        && sample.last() != Some(&max)
    {
        sample.push(max);
    }
    sample
}

/// Reduce every shard's candidates to exactly `num_bins + 1` boundaries.
///
/// The first boundary is the smallest candidate and the last lies just above
/// the largest, so bins cover `[min, max + 1)`. With fewer distinct candidates
/// than bins the trailing bins collapse to empty ranges.
pub fn reduce_pivots(candidates: Vec<f64>, num_bins: usize) -> Vec<f64> {
    let unique = sorted_unique(candidates);
    let num_bins = num_bins.max(1);
    let Some(&max) = unique.last() else {
        return vec![0.0; num_bins + 1];
    };

    let n = unique.len();
    let mut boundaries: Vec<f64> = (0..num_bins).map(|i| unique[i * n / num_bins]).collect();
    boundaries.dedup();
    let upper = above(max);
    boundaries.resize(num_bins + 1, upper);
    boundaries
}

/// Half-open key range `[lo, hi)` assigned to one bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotRange {
    pub lo: f64,
    pub hi: f64,
    /// One-based bin id
    pub bin: u32,
}

impl PivotRange {
    pub fn contains(&self, key: f64) -> bool {
        self.lo <= key && key < self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }
}

/// Contiguous bins produced by one pivot reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSet {
    ranges: Vec<PivotRange>,
}

impl PivotSet {
    /// Build bins from non-decreasing boundaries `b0 <= b1 <= ... <= bn`.
    pub fn from_boundaries(boundaries: &[f64]) -> FormatResult<Self> {
        if boundaries.len() < 2 {
            return Err(FormatError::InvalidPivots(format!(
                "need at least two boundaries, got {}",
                boundaries.len()
            )));
        }
        if boundaries.iter().any(|b| b.is_nan()) || boundaries.windows(2).any(|w| w[0] > w[1]) {
            return Err(FormatError::InvalidPivots(
                "boundaries must be sorted".to_string(),
            ));
        }
        let ranges = boundaries
            .windows(2)
            .enumerate()
            .map(|(i, w)| PivotRange {
                lo: w[0],
                hi: w[1],
                bin: i as u32 + 1,
            })
            .collect();
        Ok(Self { ranges })
    }

    pub fn from_file(file: &PivotFile) -> FormatResult<Self> {
        Self::from_boundaries(&file.pivots)
    }

    pub fn ranges(&self) -> &[PivotRange] {
        &self.ranges
    }

    pub fn num_bins(&self) -> usize {
        self.ranges.len()
    }

    /// Zero-based index of the bin whose range contains `key`.
    ///
    /// Keys outside `[min, max + 1)` cannot come from the sampled input; they
    /// are clamped to the nearest non-empty edge bin.
    pub fn bin_index(&self, key: f64) -> usize {
        let first = self.ranges.first().map_or(0.0, |r| r.lo);
        let idx = self.ranges.partition_point(|r| r.hi <= key);
        if idx < self.ranges.len() && key >= first {
            return idx;
        }
        warn!("Key {} outside pivot range, clamping", key);
        if key < first {
            0
        } else {
            self.ranges.iter().rposition(|r| !r.is_empty()).unwrap_or(0)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PivotCodec;

#[async_trait]
impl RecordCodec for PivotCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Pivot
    }

    fn delimiter(&self) -> &Delimiter {
        &PIVOT_DELIMITER
    }

    /// Global pivot reduction over every shard's sample.
    async fn combine(&self, entries: &[Entry], options: &CombineOptions) -> FormatResult<Encoded> {
        let mut target: Option<(String, String)> = None;
        let mut candidates = Vec::new();
        for entry in entries {
            if entry.is_empty() {
                continue;
            }
            let file = PivotFile::parse(&entry.get_content().await?)?;
            candidates.extend(file.pivots);
            target.get_or_insert((file.table, file.key));
        }
        let (table, key) = target.ok_or_else(|| {
            FormatError::InvalidPivots("no pivot files to combine".to_string())
        })?;

        let pivots = reduce_pivots(candidates, options.num_bins);
        debug!("Reduced pivots to {} bins for {}", pivots.len() - 1, key);
        Ok(Encoded::new(PivotFile { table, key, pivots }.to_bytes()))
    }
}
