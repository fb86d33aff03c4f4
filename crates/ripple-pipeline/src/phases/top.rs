use super::PhaseContext;
use crate::error::PipelineResult;
use bytes::Bytes;
use ripple_formats::{BoundedHeap, FormatTag, Identifier, Ranking};
use tracing::debug;

/// Keep the `number` records with the highest identifier values, written in
/// ascending order.
pub(crate) async fn run(
    ctx: &mut PhaseContext<'_>,
    format: FormatTag,
    identifier: Identifier,
    number: usize,
) -> PipelineResult<()> {
    let source = ctx.payload.source()?;
    let mut it = ctx.source_iterator(format).await?;
    let codec = it.codec();
    let mut heap = BoundedHeap::new(number, Ranking::Highest);
    let mut seen = 0usize;

    loop {
        ctx.deadline.check()?;
        let chunk = it.next().await?;
        seen += chunk.records.len();
        for record in chunk.records {
            let score = codec.identifier_value(&record, identifier)?;
            heap.push(score, record);
        }
        if !chunk.more {
            break;
        }
    }

    let top: Vec<Bytes> = heap
        .into_sorted_vec()
        .into_iter()
        .map(|(_, record)| record)
        .collect();
    debug!("Kept {} of {} records from {}", top.len(), seen, source);

    let encoded = codec.from_array(&top, it.context())?;
    let out = source.derive(
        ctx.output_stage(),
        ctx.shard(&source),
        ctx.params().bin.unwrap_or(source.bin),
        format.extension(),
    );
    ctx.write(&out, encoded).await
}
