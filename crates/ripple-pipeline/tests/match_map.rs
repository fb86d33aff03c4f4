//! Pipelines that pick the best partial of a bin and fan a step out over a
//! set of stored objects

use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use ripple_formats::{FormatTag, Identifier, IteratorOptions};
use ripple_pipeline::{
    Application, ApplicationInput, ApplicationOutput, ApplicationRegistry, Coord, LocalDriver,
    MapSource, MatchCriterion, ObjectKey, Outcome, PhaseConfig, PipelineConfig, PipelineResult,
    RunToken, TriggerPayload,
};
use ripple_store::{BlobStore, MemoryStore, Metadata};
use std::collections::BTreeMap;
use std::sync::Arc;

const TABLE: &str = "spectra";

fn pipeline(name: &str, steps: Vec<PhaseConfig>) -> PipelineConfig {
    PipelineConfig {
        name: name.to_string(),
        table: TABLE.to_string(),
        steps,
        iterator: IteratorOptions::default(),
        timeout_secs: 60,
    }
}

fn passthrough(format: FormatTag) -> PhaseConfig {
    PhaseConfig::Run {
        format,
        application: "passthrough".to_string(),
        params: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_match_picks_highest_sum() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
    let config = pipeline(
        "match",
        vec![
            PhaseConfig::Split {
                format: FormatTag::Tsv,
                split_size: 64,
                ranges: false,
            },
            passthrough(FormatTag::Tsv),
            PhaseConfig::Match {
                format: FormatTag::Tsv,
                identifier: Identifier::Column(1),
                find: MatchCriterion::MaxSum,
            },
        ],
    );
    let driver = LocalDriver::new(Arc::clone(&store), config);

    let mut content = String::from("id\tscore\n");
    for i in 0..40 {
        let score = if i == 23 { 100_000 } else { i % 5 };
        content.push_str(&format!("r{i}\t{score}\n"));
    }
    let input = driver
        .upload("hits", FormatTag::Tsv, Bytes::from(content))
        .await
        .unwrap();

    let report = driver.run(&input).await.unwrap();
    let keys = report.output_keys();
    assert_eq!(keys.len(), 1);
    let out: ObjectKey = keys[0].parse().unwrap();
    assert_eq!(out.stage, 3);
    assert_eq!(out.ext, "match");

    let best = store.get_content(keys[0]).await.unwrap();
    let best = std::str::from_utf8(&best).unwrap();
    let partial = store.get_content(best).await.unwrap();
    assert!(
        std::str::from_utf8(&partial)
            .unwrap()
            .lines()
            .any(|line| line == "r23\t100000")
    );

    // Every shard's partial was scored, one invocation wrote the match
    let partials = store
        .list(&ObjectKey::run_prefix(2, input.run))
        .await
        .unwrap();
    assert!(partials.len() > 1);
    assert_eq!(report.skipped + report.waiting + report.deduplicated + 1, partials.len());
    let score: f64 = report.outputs[0].metadata["score"].parse().unwrap();
    assert!(score >= 100_000.0);
}

#[tokio::test]
async fn test_match_waits_for_every_shard() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
    let config = pipeline(
        "match",
        vec![
            passthrough(FormatTag::Tsv),
            PhaseConfig::Match {
                format: FormatTag::Tsv,
                identifier: Identifier::Column(1),
                find: MatchCriterion::MaxSum,
            },
        ],
    );
    let run = RunToken::new(1_000_000, 3);
    let first = ObjectKey::input(run, "hits", "tsv").unwrap().derive(
        1,
        Coord::new(1, 2).unwrap(),
        Coord::single(),
        "tsv",
    );
    store
        .put(&first.to_string(), Bytes::from_static(b"id\tscore\na\t1\nb\t2"), Metadata::new())
        .await
        .unwrap();

    let driver = LocalDriver::new(Arc::clone(&store), config);
    let payload = TriggerPayload::new(TABLE, &first.to_string(), 1);
    let report = driver.worker().execute(&payload).await.unwrap();
    assert_eq!(report.outcome, Outcome::Waiting);
    assert!(report.written.is_empty());

    let second = first.derive(1, Coord::new(2, 2).unwrap(), Coord::single(), "tsv");
    store
        .put(&second.to_string(), Bytes::from_static(b"id\tscore\nc\t7"), Metadata::new())
        .await
        .unwrap();
    let report = driver.worker().execute(&payload).await.unwrap();
    assert_eq!(report.written.len(), 1);
    let best = store.get_content(&report.written[0]).await.unwrap();
    assert_eq!(best, Bytes::from(second.to_string()));
}

/// Records which object it was paired with.
struct Pair;

#[async_trait]
impl Application for Pair {
    fn name(&self) -> &str {
        "pair"
    }

    async fn run(&self, input: ApplicationInput<'_>) -> PipelineResult<Vec<ApplicationOutput>> {
        Ok(vec![ApplicationOutput {
            ext: "pair".to_string(),
            content: Bytes::from(format!(
                "{}|{}|{}",
                input.source,
                input.target.unwrap_or("-"),
                input.records.len()
            )),
            metadata: Metadata::new(),
        }])
    }
}

async fn put_references(store: &Arc<dyn BlobStore>, run: RunToken) -> Vec<String> {
    let mut keys = Vec::new();
    for (name, body) in [("alpha", "a\n"), ("beta", "b\nb\n"), ("gamma", "c\nc\nc\n")] {
        let key = ObjectKey::input(run, name, "txt").unwrap().to_string();
        store
            .put(&key, Bytes::from_static(body.as_bytes()), Metadata::new())
            .await
            .unwrap();
        keys.push(key);
    }
    keys.sort();
    keys
}

fn map_pipeline(prefix: String, source: MapSource) -> PipelineConfig {
    pipeline(
        "pairs",
        vec![
            PhaseConfig::Map {
                format: FormatTag::NewLine,
                prefix,
                source,
            },
            PhaseConfig::Run {
                format: FormatTag::NewLine,
                application: "pair".to_string(),
                params: BTreeMap::new(),
            },
        ],
    )
}

fn pair_registry() -> ApplicationRegistry {
    let mut applications = ApplicationRegistry::with_builtins();
    applications.register(Arc::new(Pair));
    applications
}

#[tokio::test]
async fn test_map_fans_out_over_prefix() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
    let references = RunToken::new(1_000_000, 9);
    let targets = put_references(&store, references).await;

    let config = map_pipeline(ObjectKey::run_prefix(0, references), MapSource::Input);
    let driver = LocalDriver::new(Arc::clone(&store), config).with_applications(pair_registry());
    let input = driver
        .upload("query", FormatTag::NewLine, Bytes::from_static(b"q1\nq2\n"))
        .await
        .unwrap();

    let report = driver.run(&input).await.unwrap();
    let keys = report.output_keys();
    assert_eq!(keys.len(), 3);

    let mut paired = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let out: ObjectKey = key.parse().unwrap();
        assert_eq!(out.shard, Coord::new(i as u32 + 1, 3).unwrap());
        let content = store.get_content(key).await.unwrap();
        let text = String::from_utf8(content.to_vec()).unwrap();
        let fields: Vec<&str> = text.split('|').collect();
        assert_eq!(fields[0], input.to_string());
        assert_eq!(fields[2], "2");
        paired.push(fields[1].to_string());
    }
    assert_eq!(paired, targets);
}

#[tokio::test]
async fn test_map_target_becomes_source() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
    let references = RunToken::new(1_000_000, 9);
    let targets = put_references(&store, references).await;

    let config = map_pipeline(ObjectKey::run_prefix(0, references), MapSource::Target);
    let driver = LocalDriver::new(Arc::clone(&store), config).with_applications(pair_registry());
    let input = driver
        .upload("query", FormatTag::NewLine, Bytes::from_static(b"q1\nq2\n"))
        .await
        .unwrap();
    let report = driver.run(&input).await.unwrap();
    assert_eq!(report.invocations, 4);
    assert_eq!(report.written, 3);

    // Outputs follow each reference object's run
    let outputs = store
        .list(&ObjectKey::run_prefix(2, references))
        .await
        .unwrap();
    assert_eq!(outputs.len(), 3);
    for (meta, (target, count)) in outputs.iter().zip(targets.iter().zip(["1", "2", "3"])) {
        let text = String::from_utf8(store.get_content(&meta.key).await.unwrap().to_vec()).unwrap();
        assert_eq!(text, format!("{target}|{input}|{count}"));
    }
}

#[tokio::test]
async fn test_map_over_empty_prefix_invokes_nothing() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
    let config = map_pipeline("9/".to_string(), MapSource::Input);
    let driver = LocalDriver::new(Arc::clone(&store), config).with_applications(pair_registry());
    let input = driver
        .upload("query", FormatTag::NewLine, Bytes::from_static(b"q1\n"))
        .await
        .unwrap();
    let report = driver.run(&input).await.unwrap();
    assert_eq!(report.invocations, 1);
    assert!(report.outputs.is_empty());
}
