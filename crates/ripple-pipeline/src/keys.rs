//! Object key naming
//!
//! Every object a pipeline writes is named
//! `{stage}/{timestamp}-{nonce}/{shard_id}-{shard_count}/{bin_id}-{bin_count}-{file_id}-{suffix}.{ext}`:
//!
//! - `stage`: the pipeline step that wrote it (0 for uploaded inputs)
//! - `timestamp-nonce`: the [`RunToken`] of one end-to-end run
//! - shard and bin [`Coord`]s, both one-based
//! - `file_id`: distinguishes several outputs of one worker
//! - `suffix` and `ext`: the input's name and the format extension
//!
//! Keys are deterministic in these fields, so a retried worker overwrites its
//! own earlier output instead of adding to it.

use crate::error::{PipelineError, PipelineResult};
use rand::RngExt;
use rand::rng;
use ripple_formats::FormatTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies one end-to-end pipeline run.
///
/// The timestamp is kept in whole microseconds and printed with six
/// fractional digits so that formatting and parsing are exact inverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunToken {
    pub micros: u64,
    pub nonce: u32,
}

impl RunToken {
    pub fn new(micros: u64, nonce: u32) -> Self {
        Self { micros, nonce }
    }

    /// Token for a run starting now, with a random nonce.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_micros() as u64);
        Self {
            micros,
            nonce: rng().random_range(0..1_000_000),
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.micros as f64 / 1e6
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}-{}",
            self.micros / 1_000_000,
            self.micros % 1_000_000,
            self.nonce
        )
    }
}

impl FromStr for RunToken {
    type Err = PipelineError;

    fn from_str(s: &str) -> PipelineResult<Self> {
        let bad = |reason: &str| PipelineError::invalid_key(s, reason);
        let (timestamp, nonce) = s.split_once('-').ok_or_else(|| bad("run token has no nonce"))?;
        let (secs, frac) = timestamp
            .split_once('.')
            .ok_or_else(|| bad("timestamp has no fraction"))?;
        if frac.len() != 6 || !is_digits(secs) || !is_digits(frac) || !is_digits(nonce) {
            return Err(bad("malformed run token"));
        }
        let secs: u64 = secs.parse().map_err(|_| bad("timestamp out of range"))?;
        let frac: u64 = frac.parse().map_err(|_| bad("timestamp out of range"))?;
        let micros = secs
            .checked_mul(1_000_000)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(|| bad("timestamp out of range"))?;
        Ok(Self {
            micros,
            nonce: nonce.parse().map_err(|_| bad("nonce out of range"))?,
        })
    }
}

/// One-based position within a fixed-size set, printed `id-count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "CoordRepr", into = "CoordRepr")]
pub struct Coord {
    id: u32,
    count: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CoordRepr {
    id: u32,
    count: u32,
}

impl TryFrom<CoordRepr> for Coord {
    type Error = PipelineError;

    fn try_from(repr: CoordRepr) -> PipelineResult<Self> {
        Self::new(repr.id, repr.count)
    }
}

impl From<Coord> for CoordRepr {
    fn from(coord: Coord) -> Self {
        Self {
            id: coord.id,
            count: coord.count,
        }
    }
}

impl Coord {
    pub fn new(id: u32, count: u32) -> PipelineResult<Self> {
        if id == 0 || id > count {
            return Err(PipelineError::invalid_key(
                &format!("{id}-{count}"),
                "coordinate must satisfy 1 <= id <= count",
            ));
        }
        Ok(Self { id, count })
    }

    /// The only member of a set of one.
    pub const fn single() -> Self {
        Self { id: 1, count: 1 }
    }

    /// Coordinate of zero-based `index` in a set of `count`.
    pub fn from_index(index: usize, count: usize) -> PipelineResult<Self> {
        let too_large = || PipelineError::invalid_key(&format!("{index}/{count}"), "too many shards");
        Self::new(
            u32::try_from(index + 1).map_err(|_| too_large())?,
            u32::try_from(count).map_err(|_| too_large())?,
        )
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn index(&self) -> usize {
        self.id as usize - 1
    }

    pub fn is_last(&self) -> bool {
        self.id == self.count
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.id, self.count)
    }
}

impl FromStr for Coord {
    type Err = PipelineError;

    fn from_str(s: &str) -> PipelineResult<Self> {
        let (id, count) = s
            .split_once('-')
            .ok_or_else(|| PipelineError::invalid_key(s, "expected id-count"))?;
        Self::new(parse_number(s, id)?, parse_number(s, count)?)
    }
}

/// A parsed object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey {
    pub stage: u32,
    pub run: RunToken,
    pub shard: Coord,
    pub bin: Coord,
    pub file_id: u32,
    pub suffix: String,
    pub ext: String,
}

impl ObjectKey {
    /// Key of an uploaded pipeline input.
    pub fn input(run: RunToken, name: &str, ext: &str) -> PipelineResult<Self> {
        let key = Self {
            stage: 0,
            run,
            shard: Coord::single(),
            bin: Coord::single(),
            file_id: 1,
            suffix: name.to_string(),
            ext: ext.to_string(),
        };
        key.validate()?;
        Ok(key)
    }

    /// Format of the object, from its extension.
    pub fn format(&self) -> Option<FormatTag> {
        FormatTag::from_extension(&self.ext)
    }

    /// Prefix shared by every object of `stage` in `run`.
    pub fn run_prefix(stage: u32, run: RunToken) -> String {
        format!("{stage}/{run}/")
    }

    /// Same run, suffix and extension at a new stage and coordinates.
    pub fn derive(&self, stage: u32, shard: Coord, bin: Coord, ext: &str) -> Self {
        Self {
            stage,
            run: self.run,
            shard,
            bin,
            file_id: 1,
            suffix: self.suffix.clone(),
            ext: ext.to_string(),
        }
    }

    pub fn with_file_id(mut self, file_id: u32) -> Self {
        self.file_id = file_id;
        self
    }

    fn validate(&self) -> PipelineResult<()> {
        let bad = |reason: &str| PipelineError::invalid_key(&self.to_string(), reason);
        if self.file_id == 0 {
            return Err(bad("file id must be positive"));
        }
        if self.suffix.is_empty() || self.suffix.contains('/') {
            return Err(bad("suffix must be non-empty and contain no '/'"));
        }
        if self.ext.is_empty() || self.ext.contains(['/', '.']) {
            return Err(bad("extension must be non-empty and contain no '/' or '.'"));
        }
        Ok(())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}-{}-{}.{}",
            self.stage, self.run, self.shard, self.bin, self.file_id, self.suffix, self.ext
        )
    }
}

impl FromStr for ObjectKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> PipelineResult<Self> {
        let bad = |reason: &str| PipelineError::invalid_key(s, reason);
        let mut parts = s.splitn(4, '/');
        let (Some(stage), Some(run), Some(shard), Some(name)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(bad("expected stage/run/shard/name"));
        };

        let mut fields = name.splitn(4, '-');
        let (Some(bin_id), Some(bin_count), Some(file_id), Some(rest)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(bad("expected bin_id-bin_count-file_id-suffix.ext"));
        };
        let (suffix, ext) = rest
            .rsplit_once('.')
            .ok_or_else(|| bad("missing extension"))?;

        let key = Self {
            stage: parse_number(s, stage)?,
            run: run.parse().map_err(|_| bad("malformed run token"))?,
            shard: shard.parse()?,
            bin: Coord::new(parse_number(s, bin_id)?, parse_number(s, bin_count)?)?,
            file_id: parse_number(s, file_id)?,
            suffix: suffix.to_string(),
            ext: ext.to_string(),
        };
        key.validate()?;
        Ok(key)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = PipelineError;

    fn try_from(value: String) -> PipelineResult<Self> {
        value.parse()
    }
}

impl From<ObjectKey> for String {
    fn from(value: ObjectKey) -> Self {
        value.to_string()
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_number(key: &str, field: &str) -> PipelineResult<u32> {
    if !is_digits(field) {
        return Err(PipelineError::invalid_key(key, format!("{field:?} is not a number")));
    }
    field
        .parse()
        .map_err(|_| PipelineError::invalid_key(key, format!("{field} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const KEY: &str = "3/1700000000.250000-42/2-4/7-64-1-tide-results.mzML";

    #[test]
    fn test_parse_fields() {
        let key: ObjectKey = KEY.parse().unwrap();
        assert_eq!(key.stage, 3);
        assert_eq!(key.run, RunToken::new(1_700_000_000_250_000, 42));
        assert_eq!(key.shard, Coord::new(2, 4).unwrap());
        assert_eq!(key.bin, Coord::new(7, 64).unwrap());
        assert_eq!(key.file_id, 1);
        assert_eq!(key.suffix, "tide-results");
        assert_eq!(key.ext, "mzML");
        assert_eq!(key.format(), Some(FormatTag::Mzml));
        assert_eq!(key.to_string(), KEY);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        for key in [
            "",
            "3/1700000000.25-42/2-4/7-64-1-a.txt",
            "3/1700000000.250000/2-4/7-64-1-a.txt",
            "3/1700000000.250000-42/0-4/7-64-1-a.txt",
            "3/1700000000.250000-42/5-4/7-64-1-a.txt",
            "3/1700000000.250000-42/2-4/7-64-0-a.txt",
            "3/1700000000.250000-42/2-4/7-64-1-a",
            "3/1700000000.250000-42/2-4/7-64-1-.txt",
            "x/1700000000.250000-42/2-4/7-64-1-a.txt",
            "3/1700000000.250000-42/2-4/7-64-1-a/b.txt",
        ] {
            assert!(key.parse::<ObjectKey>().is_err(), "{key}");
        }
    }

    #[test]
    fn test_run_prefix_and_derive() {
        let input = ObjectKey::input(RunToken::new(5_000_001, 9), "reads", "fasta").unwrap();
        assert_eq!(input.to_string(), "0/5.000001-9/1-1/1-1-1-reads.fasta");

        let out = input.derive(2, Coord::new(3, 8).unwrap(), Coord::single(), "pivot");
        assert_eq!(out.to_string(), "2/5.000001-9/3-8/1-1-1-reads.pivot");
        assert!(out.to_string().starts_with(&ObjectKey::run_prefix(2, input.run)));
        assert!(ObjectKey::input(input.run, "a/b", "txt").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let key: ObjectKey = KEY.parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{KEY}\""));
        assert_eq!(serde_json::from_str::<ObjectKey>(&json).unwrap(), key);

        let coord: Coord = serde_json::from_str(r#"{"id":2,"count":3}"#).unwrap();
        assert_eq!(coord, Coord::new(2, 3).unwrap());
        assert!(serde_json::from_str::<Coord>(r#"{"id":4,"count":3}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_format_parse_round_trip(
            stage in 0u32..100,
            micros in 0u64..4_000_000_000_000_000,
            nonce in any::<u32>(),
            (shard_id, shard_count) in (1u32..500).prop_flat_map(|c| (1..=c, Just(c))),
            (bin_id, bin_count) in (1u32..500).prop_flat_map(|c| (1..=c, Just(c))),
            file_id in 1u32..10,
            suffix in "[a-zA-Z0-9_.-]{0,12}[a-zA-Z0-9_]",
            ext in "[a-zA-Z]{1,6}",
        ) {
            let key = ObjectKey {
                stage,
                run: RunToken::new(micros, nonce),
                shard: Coord::new(shard_id, shard_count).unwrap(),
                bin: Coord::new(bin_id, bin_count).unwrap(),
                file_id,
                suffix,
                ext,
            };
            prop_assert_eq!(key.to_string().parse::<ObjectKey>().unwrap(), key);
        }
    }
}
