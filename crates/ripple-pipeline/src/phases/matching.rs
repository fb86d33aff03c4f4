use super::PhaseContext;
use super::combine::{barrier_output, gather};
use crate::config::MatchCriterion;
use crate::error::PipelineResult;
use ripple_formats::{ChunkedIterator, Encoded, FormatTag, Identifier};
use ripple_store::Entry;
use tracing::{debug, info};

/// Extension of the object naming the best match of a bin.
pub(crate) const MATCH_EXTENSION: &str = "match";

/// Metadata key holding the winning score.
pub(crate) const SCORE_METADATA: &str = "score";

async fn score(
    ctx: &PhaseContext<'_>,
    entry: Entry,
    format: FormatTag,
    identifier: Identifier,
    find: MatchCriterion,
) -> PipelineResult<f64> {
    if entry.is_empty() {
        return Ok(0.0);
    }
    let codec = format.codec();
    let mut it = ChunkedIterator::new(entry, codec, None, ctx.config.iterator).await?;
    let mut total = 0.0;
    loop {
        ctx.deadline.check()?;
        let chunk = it.next().await?;
        for record in &chunk.records {
            let value = codec.identifier_value(record, identifier)?;
            total += match find {
                MatchCriterion::MaxSum => value,
            };
        }
        if !chunk.more {
            return Ok(total);
        }
    }
}

/// Score every shard's partial for the source's bin and write the key of
/// the best one. Ties go to the partial that sorts first.
pub(crate) async fn run(
    ctx: &mut PhaseContext<'_>,
    format: FormatTag,
    identifier: Identifier,
    find: MatchCriterion,
) -> PipelineResult<()> {
    let source = ctx.payload.source()?;
    let out = barrier_output(&source, ctx.output_stage(), MATCH_EXTENSION);
    let out_key = out.to_string();
    let Some(siblings) = gather(ctx, &source, &out_key).await? else {
        return Ok(());
    };

    let mut best: Option<(String, f64)> = None;
    for (key, entry) in siblings {
        let total = score(ctx, entry, format, identifier, find).await?;
        debug!("{} scores {}", key, total);
        if best.as_ref().is_none_or(|(_, top)| total > *top) {
            best = Some((key.to_string(), total));
        }
    }
    let Some((best_key, best_score)) = best else {
        return Ok(());
    };

    info!("Best match for bin {} is {} ({})", source.bin, best_key, best_score);
    let mut encoded = Encoded::new(best_key);
    encoded
        .metadata
        .insert(SCORE_METADATA.to_string(), best_score.to_string());
    ctx.write(&out, encoded).await
}
