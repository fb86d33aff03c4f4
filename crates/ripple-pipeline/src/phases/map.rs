use super::PhaseContext;
use crate::config::MapSource;
use crate::error::PipelineResult;
use crate::keys::{Coord, ObjectKey};
use crate::payload::ExtraParams;
use tracing::{info, warn};

/// Invoke the next step once per object listed under `prefix`, pairing each
/// listed key with the triggering object.
pub(crate) async fn run(ctx: &mut PhaseContext<'_>, prefix: &str, source: MapSource) -> PipelineResult<()> {
    let input = ctx.payload.source_key.clone();
    let mut targets = Vec::new();
    for meta in ctx.store.list(prefix).await? {
        if meta.key.parse::<ObjectKey>().is_ok() {
            targets.push(meta.key);
        } else {
            warn!("Skipping unparseable key {} under {}", meta.key, prefix);
        }
    }
    targets.dedup();
    if targets.is_empty() {
        warn!("Nothing to map under {:?}", prefix);
        return Ok(());
    }

    let next = ctx.step() + 1;
    let count = targets.len();
    let invocations = targets
        .into_iter()
        .enumerate()
        .map(|(i, target)| {
            let params = ExtraParams::for_step(next).with_shard(Coord::from_index(i, count)?);
            Ok(match source {
                MapSource::Input => (input.clone(), params.with_target(target)),
                MapSource::Target => (target, params.with_target(input.clone())),
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    info!("Mapping {} over {} keys under {:?}", input, count, prefix);
    ctx.deadline.check()?;
    ctx.invoke_all(invocations).await
}
