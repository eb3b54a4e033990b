use super::logical_bc::{ASymmBC, SymmBC};
use super::value_bc::{DircBC, NeumBC};
use crate::Mesh::field_api::{DimPos, FieldId, StructuredField};
use crate::Mesh::range::MDIndex;
use enum_dispatch::enum_dispatch;
use std::fmt;
use thiserror::Error;

/// error types for boundary condition evaluation and assignment
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BCError {
    #[error("Reflected index {reflected:?} (from {index:?}) out of range {range}")]
    ReflectedOutOfRange {
        index: Vec<i64>,
        reflected: Vec<i64>,
        range: String,
    },
    #[error("ASymmetric BC specified on a boundary which is evaluated to {value} != 0 at {index:?}")]
    NonZeroOnBoundary { index: Vec<i64>, value: String },
    #[error("Trying to assign a {found} typed BC to {target}")]
    KindMismatch {
        target: &'static str,
        found: &'static str,
    },
    #[error("boundary condition evaluated before being bound to a field")]
    Unbound,
    #[error("boundary condition bound to field {bound} evaluated on field {given}")]
    FieldMismatch { bound: FieldId, given: FieldId },
    #[error("boundary dimension {dim} is invalid for a {dims}-dimensional field")]
    InvalidDim { dim: usize, dims: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BCType {
    Dirc,
    Neum,
    Symm,
    ASymm,
}

impl fmt::Display for BCType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BCType::Dirc => "Dirichlet",
            BCType::Neum => "Neumann",
            BCType::Symm => "Symmetric",
            BCType::ASymm => "ASymmetric",
        };
        f.write_str(s)
    }
}

/// What a caller asks for when installing a boundary condition on a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BCSpec {
    Dirichlet(f64),
    Neumann(f64),
    Symmetric,
    AntiSymmetric,
}

#[enum_dispatch]
pub trait BoundaryCondition {
    /// ghost value of `field` at an `index` lying past this boundary
    fn evaluate<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, BCError>;
    fn bc_type(&self) -> BCType;
    fn type_name(&self) -> &'static str;
    /// multi-line description, every line indented by `level` tabs
    fn describe(&self, level: usize) -> String;
    fn copy(&self) -> BCEnum;
    /// take over the state of `other`, which must be of the same kind
    fn assign_from(&mut self, other: &BCEnum) -> Result<(), BCError>;
    fn rebind_field(&mut self, field: FieldId);
    fn bound_field(&self) -> Option<FieldId>;
    fn dim(&self) -> usize;
    fn side(&self) -> DimPos;
}

#[derive(Debug, Clone, PartialEq)]
#[enum_dispatch(BoundaryCondition)]
pub enum BCEnum {
    Dirichlet(DircBC),
    Neumann(NeumBC),
    Symmetric(SymmBC),
    AntiSymmetric(ASymmBC),
}

/// creates a boundary condition bound to `field` on the `dim`/`side` boundary
pub fn create_bc(spec: BCSpec, field: FieldId, dim: usize, side: DimPos) -> BCEnum {
    match spec {
        BCSpec::Dirichlet(value) => BCEnum::Dirichlet(DircBC::new(field, dim, side, value)),
        BCSpec::Neumann(gradient) => BCEnum::Neumann(NeumBC::new(field, dim, side, gradient)),
        BCSpec::Symmetric => BCEnum::Symmetric(SymmBC::new(field, dim, side)),
        BCSpec::AntiSymmetric => BCEnum::AntiSymmetric(ASymmBC::new(field, dim, side)),
    }
}

pub(crate) fn indent(level: usize) -> String {
    "\t".repeat(level)
}
