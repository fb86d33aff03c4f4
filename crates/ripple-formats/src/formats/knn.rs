//! k-nearest-neighbor lists
//!
//! One line per point: `point,d1 c1,d2 c2,...` where `d` is a distance and
//! `c` a classification. Partial lists computed against different shards of
//! the training data are merged per point with a bounded heap.

use crate::codec::{Encoded, RecordCodec};
use crate::combine::{CombineOptions, collect_records, default_combine};
use crate::delimiter::Delimiter;
use crate::error::{FormatError, FormatResult};
use crate::formats::new_line::NEW_LINE_DELIMITER;
use crate::tag::FormatTag;
use crate::topk::{BoundedHeap, Ranking};
use async_trait::async_trait;
use bytes::Bytes;
use ripple_store::Entry;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub classification: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborList {
    pub point: String,
    pub neighbors: Vec<Neighbor>,
}

impl NeighborList {
    pub fn parse(record: &[u8]) -> FormatResult<Self> {
        let text = std::str::from_utf8(record)
            .map_err(|e| FormatError::malformed(FormatTag::Knn, format!("invalid UTF-8: {e}")))?;
        let mut parts = text.trim_end_matches(['\r', '\n']).split(',');
        let point = parts.next().unwrap_or_default();
        if point.trim().is_empty() {
            return Err(FormatError::malformed(FormatTag::Knn, "empty point"));
        }
        let neighbors = parts
            .map(|part| {
                let mut fields = part.split(' ');
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(d), Some(c), None) => Ok(Neighbor {
                        distance: d.parse().map_err(|_| {
                            FormatError::malformed(FormatTag::Knn, format!("bad distance {d:?}"))
                        })?,
                        classification: c.parse().map_err(|_| {
                            FormatError::malformed(
                                FormatTag::Knn,
                                format!("bad classification {c:?}"),
                            )
                        })?,
                    }),
                    _ => Err(FormatError::malformed(
                        FormatTag::Knn,
                        format!("expected \"distance class\", got {part:?}"),
                    )),
                }
            })
            .collect::<FormatResult<Vec<_>>>()?;
        Ok(Self {
            point: point.to_string(),
            neighbors,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut line = self.point.clone();
        for n in &self.neighbors {
            line.push_str(&format!(",{:.6} {}", n.distance, n.classification));
        }
        Bytes::from(line)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KnnCodec;

#[async_trait]
impl RecordCodec for KnnCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Knn
    }

    fn delimiter(&self) -> &Delimiter {
        &NEW_LINE_DELIMITER
    }

    /// With `sort`, merge every point's neighbor lists down to the `k` closest.
    async fn combine(&self, entries: &[Entry], options: &CombineOptions) -> FormatResult<Encoded> {
        if !options.sort {
            return default_combine(self, entries, options).await;
        }
        let k = options.k.ok_or_else(|| {
            FormatError::InvalidOptions("knn merge requires k".to_string())
        })?;

        let (records, context) = collect_records(self, entries, options.iterator).await?;
        let merged = merge_neighbors(&records, k)?;
        debug!("Merged neighbors of {} points (k={})", merged.len(), k);
        let lines: Vec<Bytes> = merged.iter().map(NeighborList::to_bytes).collect();
        self.from_array(&lines, &context)
    }
}

/// Per point, keep the `k` lowest-distance neighbors across all lists.
///
/// Points keep their first-seen order; neighbors come out ascending by distance.
pub fn merge_neighbors(records: &[Bytes], k: usize) -> FormatResult<Vec<NeighborList>> {
    let mut order: Vec<String> = Vec::new();
    let mut heaps: HashMap<String, BoundedHeap<i64>> = HashMap::new();

    for record in records {
        let list = NeighborList::parse(record)?;
        let heap = heaps.entry(list.point.clone()).or_insert_with(|| {
            order.push(list.point.clone());
            BoundedHeap::new(k, Ranking::Lowest)
        });
        for n in list.neighbors {
            heap.push(n.distance, n.classification);
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|point| {
            let heap = heaps.remove(&point)?;
            let neighbors = heap
                .into_sorted_vec()
                .into_iter()
                .map(|(distance, classification)| Neighbor {
                    distance,
                    classification,
                })
                .collect();
            Some(NeighborList { point, neighbors })
        })
        .collect())
}
