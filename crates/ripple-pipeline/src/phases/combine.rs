use super::{Outcome, PhaseContext};
use crate::error::PipelineResult;
use crate::keys::{Coord, ObjectKey};
use ripple_formats::{CombineOptions, FormatTag};
use ripple_store::Entry;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of a barrier step on `source`: one object per bin, keyed by the bin.
pub(crate) fn barrier_output(source: &ObjectKey, stage: u32, ext: &str) -> ObjectKey {
    source.derive(stage, source.bin, Coord::single(), ext)
}

/// Every shard's partial for the source's bin, ordered by shard and file id.
///
/// Returns `None` with the outcome set when `out_key` already exists or some
/// shard has not landed yet. Any sibling's invocation may be the one that
/// finds the set complete.
pub(crate) async fn gather(
    ctx: &mut PhaseContext<'_>,
    source: &ObjectKey,
    out_key: &str,
) -> PipelineResult<Option<Vec<(ObjectKey, Entry)>>> {
    if ctx.store.contains(out_key).await? {
        debug!("{} already written", out_key);
        ctx.outcome = Outcome::Skipped;
        return Ok(None);
    }

    let prefix = ObjectKey::run_prefix(source.stage, source.run);
    let mut siblings = Vec::new();
    for meta in ctx.store.list(&prefix).await? {
        let Ok(key) = meta.key.parse::<ObjectKey>() else {
            continue;
        };
        if key.bin == source.bin && key.shard.count() == source.shard.count() {
            siblings.push((key, meta));
        }
    }

    let landed: BTreeSet<u32> = siblings.iter().map(|(key, _)| key.shard.id()).collect();
    if landed.len() < source.shard.count() as usize {
        debug!(
            "Bin {} has {}/{} partials, waiting",
            source.bin,
            landed.len(),
            source.shard.count()
        );
        ctx.outcome = Outcome::Waiting;
        return Ok(None);
    }

    // Deterministic merge order
    siblings.sort_by(|(a, _), (b, _)| (a.shard, a.file_id).cmp(&(b.shard, b.file_id)));
    Ok(Some(
        siblings
            .into_iter()
            .map(|(key, meta)| (key, Entry::new(Arc::clone(ctx.store), meta)))
            .collect(),
    ))
}

/// Merge every shard's partial for the source's bin once all of them exist.
pub(crate) async fn run(
    ctx: &mut PhaseContext<'_>,
    format: FormatTag,
    options: CombineOptions,
) -> PipelineResult<()> {
    let source = ctx.payload.source()?;
    let out = barrier_output(&source, ctx.output_stage(), format.extension());
    let out_key = out.to_string();
    let Some(siblings) = gather(ctx, &source, &out_key).await? else {
        return Ok(());
    };
    let entries: Vec<Entry> = siblings.into_iter().map(|(_, entry)| entry).collect();

    ctx.deadline.check()?;
    let encoded = format.codec().combine(&entries, &options).await?;
    if ctx.store.contains(&out_key).await? {
        ctx.outcome = Outcome::Skipped;
        return Ok(());
    }
    info!("Combining {} partials into {}", entries.len(), out_key);
    ctx.write(&out, encoded).await
}
