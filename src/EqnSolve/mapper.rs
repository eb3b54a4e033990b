//! Maps multi-dimensional indices of the unknown to global rows of the linear system.
//! Every worker owns one block; blocks are numbered in rank order and indices inside a
//! block are numbered row-major.

use crate::Mesh::range::{MDIndex, Range, common_range, in_range};
use crate::Parallel::comm::{CommError, Communicator};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapperError {
    #[error("rank {rank} has no block among {blocks}")]
    RankOutOfRange { rank: usize, blocks: usize },
    #[error("blocks {first} and {second} overlap")]
    Overlap { first: usize, second: usize },
    #[error("gathered {found} range bounds, expected a multiple of {per_block}")]
    BadGather { found: usize, per_block: usize },
    #[error(transparent)]
    Comm(#[from] CommError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockedMDRangeMapper<const D: usize> {
    blocks: Vec<Range<D>>,
    offsets: Vec<usize>,
    rank: usize,
}

impl<const D: usize> BlockedMDRangeMapper<D> {
    /// single block covering `range`
    pub fn new(range: Range<D>) -> Self {
        Self {
            blocks: vec![range],
            offsets: vec![0],
            rank: 0,
        }
    }

    /// `blocks[r]` is the block of rank `r`; blocks must be pairwise disjoint
    pub fn distributed(blocks: Vec<Range<D>>, rank: usize) -> Result<Self, MapperError> {
        if rank >= blocks.len() {
            return Err(MapperError::RankOutOfRange {
                rank,
                blocks: blocks.len(),
            });
        }
        for (i, a) in blocks.iter().enumerate() {
            for (j, b) in blocks.iter().enumerate().skip(i + 1) {
                if !a.is_empty() && !b.is_empty() && !common_range(a, b).is_empty() {
                    return Err(MapperError::Overlap {
                        first: i,
                        second: j,
                    });
                }
            }
        }
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut total = 0;
        for b in &blocks {
            offsets.push(total);
            total += b.count();
        }
        Ok(Self {
            blocks,
            offsets,
            rank,
        })
    }

    /// collective: every worker contributes its own block
    pub fn gathered(comm: &dyn Communicator, local: Range<D>) -> Result<Self, MapperError> {
        let mut bounds = Vec::with_capacity(2 * D);
        bounds.extend(local.start.iter().map(|v| *v as f64));
        bounds.extend(local.end.iter().map(|v| *v as f64));
        let all = comm.all_gather(&bounds)?;
        if D == 0 || all.len() % (2 * D) != 0 {
            return Err(MapperError::BadGather {
                found: all.len(),
                per_block: 2 * D,
            });
        }
        let blocks = all
            .chunks(2 * D)
            .map(|chunk| {
                let mut start = [0i64; D];
                let mut end = [0i64; D];
                for d in 0..D {
                    start[d] = chunk[d] as i64;
                    end[d] = chunk[D + d] as i64;
                }
                Range::new(start, end)
            })
            .collect();
        let mapper = Self::distributed(blocks, comm.rank())?;
        debug!(
            "rank {}: rows [{}, {}) of {}",
            comm.rank(),
            mapper.local_offset(),
            mapper.local_offset() + mapper.local_count(),
            mapper.global_count()
        );
        Ok(mapper)
    }

    /// global row of `index`, `None` if no block contains it
    pub fn map(&self, index: &MDIndex<D>) -> Option<usize> {
        self.blocks
            .iter()
            .zip(&self.offsets)
            .find(|(b, _)| in_range(b, index))
            .and_then(|(b, offset)| b.linear_offset(index).map(|o| offset + o))
    }

    pub fn local_range(&self) -> &Range<D> {
        &self.blocks[self.rank]
    }

    pub fn local_offset(&self) -> usize {
        self.offsets[self.rank]
    }

    pub fn local_count(&self) -> usize {
        self.blocks[self.rank].count()
    }

    pub fn global_count(&self) -> usize {
        self.blocks.iter().map(|b| b.count()).sum()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}
