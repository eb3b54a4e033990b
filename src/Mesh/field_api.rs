//! Contract between structured fields and the code that reads them
//! (boundary conditions, operator expressions, the assembler).

use super::cartesian::MeshError;
use super::elem::FieldElem;
use super::range::{MDIndex, Range};
use crate::Boundary::bc_api::BCError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// where the field values sit inside a mesh cell, per dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocOnMesh {
    Center,
    Corner,
}

/// side of a dimension a boundary sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DimPos {
    Start,
    End,
}

impl DimPos {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimPos::Start => "start",
            DimPos::End => "end",
        }
    }
}

impl fmt::Display for DimPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-unique identity of a field. Boundary conditions hold one of these instead of a
/// pointer to the field they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

impl FieldId {
    pub fn fresh() -> Self {
        FieldId(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("no boundary condition on dim {dim} {side} for index {index:?} of field {field}")]
    NoBoundaryCondition {
        field: String,
        dim: usize,
        side: DimPos,
        index: Vec<i64>,
    },
    #[error("index {index:?} of field {field} is accessible but owned by another worker")]
    NotLocal { field: String, index: Vec<i64> },
    #[error("value vector of length {found} does not match local range size {expected}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("local range {local} is not contained in accessible range {accessible}")]
    BadLocalRange { local: String, accessible: String },
    #[error(transparent)]
    Boundary(#[from] BCError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Read access every structured field offers.
pub trait StructuredField<const D: usize> {
    type Elem: FieldElem;

    fn field_id(&self) -> FieldId;
    fn name(&self) -> &str;
    fn loc(&self) -> [LocOnMesh; D];
    /// largest range for which values (ghosts included) are defined
    fn accessible_range(&self) -> &Range<D>;
    /// range owned by the current worker
    fn local_range(&self) -> &Range<D>;
    fn spacing(&self, dim: usize) -> f64;
    /// value at any index, dispatching to the boundary conditions outside the accessible range
    fn eval_at(&self, index: &MDIndex<D>) -> Result<Self::Elem, FieldError>;
    /// value at an index inside `common_range(accessible, local)`; `None` anywhere else
    fn interior_at(&self, index: &MDIndex<D>) -> Option<Self::Elem>;
}
