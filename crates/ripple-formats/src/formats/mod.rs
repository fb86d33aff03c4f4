//! Codec implementations, one per [`FormatTag`](crate::FormatTag)

mod bed;
mod blast;
mod fasta;
mod knn;
pub mod mzml;
mod new_line;
pub mod pivot;
mod tsv;

pub use bed::BedCodec;
pub use blast::BlastCodec;
pub use fasta::FastaCodec;
pub use knn::{KnnCodec, Neighbor, NeighborList, merge_neighbors};
pub use mzml::MzmlCodec;
pub use new_line::NewLineCodec;
pub use pivot::{PivotCodec, PivotFile, PivotRange, PivotSet, reduce_pivots, sample_pivots};
pub use tsv::TsvCodec;
