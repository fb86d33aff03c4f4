use super::PhaseContext;
use crate::error::{PipelineError, PipelineResult};
use crate::keys::Coord;
use crate::payload::ExtraParams;
use ripple_formats::{OffsetBounds, PivotFile, PivotSet};
use tracing::info;

/// Fan out one invocation of the next step per `split_size` bytes.
///
/// A range split reads a reduced pivot file instead: the shards cover the
/// input it names and each carries the pivot boundaries.
pub(crate) async fn run(ctx: &mut PhaseContext<'_>, split_size: u64, ranges: bool) -> PipelineResult<()> {
    let (input_key, pivots) = if ranges {
        let content = ctx.store.get_content(&ctx.payload.source_key).await?;
        let file = PivotFile::parse(&content)?;
        // Reject unusable boundaries before fanning out
        PivotSet::from_file(&file)?;
        (file.key, Some(file.pivots))
    } else {
        (ctx.payload.source_key.clone(), None)
    };

    let entry = ctx.open(&input_key).await?;
    if entry.is_empty() {
        return Err(PipelineError::EmptyInput(input_key));
    }

    let shards = OffsetBounds::split(entry.content_length(), split_size);
    let count = shards.len();
    let next = ctx.step() + 1;
    let invocations = shards
        .into_iter()
        .enumerate()
        .map(|(i, bounds)| {
            let mut params = ExtraParams::for_step(next)
                .with_offsets(bounds)
                .with_shard(Coord::from_index(i, count)?);
            if let Some(pivots) = &pivots {
                params = params.with_pivots(pivots.clone());
            }
            Ok((input_key.clone(), params))
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    info!(
        "Splitting {} ({} bytes) into {} shards",
        input_key,
        entry.content_length(),
        count
    );
    ctx.invoke_all(invocations).await
}
