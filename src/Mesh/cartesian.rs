//! Uniform Cartesian meshes and their even partitioning across workers.

use super::range::Range;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    #[error("dimension {dim} has {nodes} nodes, at least 2 are required")]
    TooFewNodes { dim: usize, nodes: usize },
    #[error("dimension {dim} has an empty span [{lo}, {hi}]")]
    EmptySpan { dim: usize, lo: f64, hi: f64 },
    #[error("cannot split a range of extent {extent} into {parts} parts")]
    BadSplit { extent: usize, parts: usize },
    #[error("rank {rank} has no slab among {parts} parts")]
    RankOutOfRange { rank: usize, parts: usize },
}

/// Uniform Cartesian mesh described by its node count and physical span per dimension
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianMesh<const D: usize> {
    pub nodes: [usize; D],
    pub lower: [f64; D],
    pub upper: [f64; D],
}

impl<const D: usize> CartesianMesh<D> {
    /// distance between neighbouring nodes in `dim`
    pub fn spacing(&self, dim: usize) -> f64 {
        (self.upper[dim] - self.lower[dim]) / (self.nodes[dim] - 1) as f64
    }

    /// range of node indices
    pub fn node_range(&self) -> Range<D> {
        let mut end = [0i64; D];
        for d in 0..D {
            end[d] = self.nodes[d] as i64;
        }
        Range::new([0; D], end)
    }
}

/// Builder in the style of `newMesh(n, n).setMeshOfDim(0, 0., 1.)`
#[derive(Debug, Clone)]
pub struct MeshBuilder<const D: usize> {
    nodes: [usize; D],
    lower: [f64; D],
    upper: [f64; D],
}

impl<const D: usize> MeshBuilder<D> {
    pub fn new_mesh(nodes: [usize; D]) -> Self {
        Self {
            nodes,
            lower: [0.0; D],
            upper: [1.0; D],
        }
    }

    pub fn set_mesh_of_dim(mut self, dim: usize, lo: f64, hi: f64) -> Self {
        self.lower[dim] = lo;
        self.upper[dim] = hi;
        self
    }

    pub fn build(self) -> Result<CartesianMesh<D>, MeshError> {
        for d in 0..D {
            if self.nodes[d] < 2 {
                return Err(MeshError::TooFewNodes {
                    dim: d,
                    nodes: self.nodes[d],
                });
            }
            if !(self.upper[d] > self.lower[d]) {
                return Err(MeshError::EmptySpan {
                    dim: d,
                    lo: self.lower[d],
                    hi: self.upper[d],
                });
            }
        }
        Ok(CartesianMesh {
            nodes: self.nodes,
            lower: self.lower,
            upper: self.upper,
        })
    }
}

/// Splits a range into contiguous slabs along its longest dimension.
/// Remainder indices go to the lowest ranks, so slab sizes differ by at most one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvenSplitStrategy;

impl EvenSplitStrategy {
    pub fn split<const D: usize>(
        &self,
        global: &Range<D>,
        parts: usize,
    ) -> Result<Vec<Range<D>>, MeshError> {
        let dim = (0..D).max_by_key(|&d| global.extent(d)).unwrap_or(0);
        let extent = global.extent(dim);
        if parts == 0 || parts > extent {
            return Err(MeshError::BadSplit { extent, parts });
        }
        let base = extent / parts;
        let rem = extent % parts;
        let mut cursor = global.start[dim];
        let mut out = Vec::with_capacity(parts);
        for rank in 0..parts {
            let len = (base + usize::from(rank < rem)) as i64;
            let mut slab = *global;
            slab.start[dim] = cursor;
            slab.end[dim] = cursor + len;
            cursor += len;
            out.push(slab);
        }
        Ok(out)
    }
}
