//! Ripple command-line library
//!
//! Argument types and command handlers behind the `ripple` binary. Every
//! command runs against a directory-backed store, so a pipeline started with
//! `ripple sort` can be inspected or resumed one payload at a time with
//! `ripple worker`.

pub mod commands;
pub mod output;

pub use crate::commands::{
    key::handle as handle_key, run::handle as handle_run, sort::handle as handle_sort,
    worker::handle as handle_worker,
};

use clap::Args;
use ripple_formats::{FormatTag, Identifier};
use ripple_pipeline::config::DEFAULT_SPLIT_SIZE;
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Root directory of the local object store
    #[arg(short, long, env = "RIPPLE_STORE_ROOT", default_value = ".ripple")]
    pub store: PathBuf,
}

#[derive(Debug, Args)]
pub struct SortArgs {
    /// File to sort
    #[arg(short, long)]
    pub input: PathBuf,

    /// Record format of the input (e.g. tsv, fasta, mzml)
    #[arg(short, long)]
    pub format: FormatTag,

    /// Sort key (e.g. column:1, mass, score)
    #[arg(short = 'k', long)]
    pub identifier: Identifier,

    /// Bytes per shard
    #[arg(long, default_value_t = DEFAULT_SPLIT_SIZE)]
    pub split_size: u64,

    /// Number of output bins
    #[arg(short, long, default_value_t = 4)]
    pub bins: usize,

    /// Table the pipeline's objects belong to
    #[arg(long, default_value = "ripple")]
    pub table: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Pipeline configuration (JSON)
    #[arg(short, long, env = "RIPPLE_CONFIG")]
    pub config: PathBuf,

    /// Input file for the first step
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Pipeline configuration (JSON)
    #[arg(short, long, env = "RIPPLE_CONFIG")]
    pub config: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct KeyArgs {
    /// Object key to parse
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        sort: SortArgs,
    }

    #[test]
    fn test_sort_args_parse_typed_values() {
        let args = Harness::try_parse_from([
            "ripple",
            "--input",
            "peptides.tsv",
            "--format",
            "tsv",
            "-k",
            "column:2",
            "--bins",
            "8",
            "--store",
            "/tmp/objects",
        ])
        .unwrap()
        .sort;
        assert_eq!(args.format, FormatTag::Tsv);
        assert_eq!(args.identifier, Identifier::Column(2));
        assert_eq!(args.bins, 8);
        assert_eq!(args.split_size, DEFAULT_SPLIT_SIZE);
        assert_eq!(args.store.store, PathBuf::from("/tmp/objects"));
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        let result = Harness::try_parse_from([
            "ripple", "--input", "a.tsv", "--format", "tsv", "-k", "height",
        ]);
        assert!(result.is_err());
    }
}
