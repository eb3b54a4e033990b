//! # Logical (reflection) boundary conditions
//!
//! Symmetric and antisymmetric boundary conditions synthesize a ghost value by mirroring
//! the ghost index back into the field across the boundary plane:
//!
//! | side  | location | reflected index in `dim`          |
//! |-------|----------|-----------------------------------|
//! | start | Corner   | `2*start - i`                     |
//! | start | Center   | `2*start - 1 - i`                 |
//! | end   | Corner   | `2*(end - 1) - i`                 |
//! | end   | Center   | `2*end - 1 - i`                   |
//!
//! For a Corner field the boundary plane goes through the first or last node, so that node
//! is its own mirror image. For a Center field the plane lies on the cell face between the
//! outermost cell and the first ghost.
//!
//! The symmetric BC returns the field value at the reflected index, the antisymmetric one
//! returns its negation. Both require the reflected index to lie inside the part of the
//! field that is accessible and owned by the current worker; an antisymmetric BC on its own
//! boundary plane additionally requires the field to vanish there.

use super::bc_api::{BCEnum, BCError, BCType, BoundaryCondition, indent};
use crate::Mesh::elem::FieldElem;
use crate::Mesh::field_api::{DimPos, FieldId, LocOnMesh, StructuredField};
use crate::Mesh::range::{MDIndex, common_range, in_range};

/// State shared by every BC kind: the field handle and the boundary it sits on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BCBinding {
    pub field: Option<FieldId>,
    pub dim: usize,
    pub pos: DimPos,
}

impl Default for BCBinding {
    fn default() -> Self {
        Self {
            field: None,
            dim: 0,
            pos: DimPos::Start,
        }
    }
}

impl BCBinding {
    pub fn new(field: FieldId, dim: usize, pos: DimPos) -> Self {
        Self {
            field: Some(field),
            dim,
            pos,
        }
    }

    /// fails unless the binding points at `field` and its dimension exists there
    pub fn check<const D: usize, F: StructuredField<D>>(&self, field: &F) -> Result<(), BCError> {
        let bound = self.field.ok_or(BCError::Unbound)?;
        if bound != field.field_id() {
            return Err(BCError::FieldMismatch {
                bound,
                given: field.field_id(),
            });
        }
        if self.dim >= D {
            return Err(BCError::InvalidDim {
                dim: self.dim,
                dims: D,
            });
        }
        Ok(())
    }

    /// mirror image of `index` across the boundary plane, other dimensions untouched
    pub fn reflect_index<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> MDIndex<D> {
        let dim = self.dim;
        let acc = field.accessible_range();
        let mut ret = *index;
        ret[dim] = match (self.pos, field.loc()[dim]) {
            (DimPos::Start, LocOnMesh::Corner) => 2 * acc.start[dim] - index[dim],
            (DimPos::Start, LocOnMesh::Center) => 2 * acc.start[dim] - 1 - index[dim],
            (DimPos::End, LocOnMesh::Corner) => 2 * (acc.end[dim] - 1) - index[dim],
            (DimPos::End, LocOnMesh::Center) => 2 * acc.end[dim] - 1 - index[dim],
        };
        ret
    }

    /// binding check + reflection + range check
    pub fn checked_reflect<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> Result<MDIndex<D>, BCError> {
        self.check(field)?;
        let reflected = self.reflect_index(field, index);
        let valid = common_range(field.accessible_range(), field.local_range());
        if !in_range(&valid, &reflected) {
            return Err(BCError::ReflectedOutOfRange {
                index: index.to_vec(),
                reflected: reflected.to_vec(),
                range: valid.to_string(),
            });
        }
        Ok(reflected)
    }

    /// field value at an index already known to be inside the valid range
    pub fn read<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        reflected: &MDIndex<D>,
    ) -> Result<F::Elem, BCError> {
        field
            .interior_at(reflected)
            .ok_or_else(|| BCError::ReflectedOutOfRange {
                index: reflected.to_vec(),
                reflected: reflected.to_vec(),
                range: common_range(field.accessible_range(), field.local_range()).to_string(),
            })
    }

    pub(crate) fn describe_lines(&self, level: usize) -> String {
        let prefix = indent(level);
        let field = match self.field {
            Some(id) => id.to_string(),
            None => "unbound".to_string(),
        };
        format!(
            "{prefix}Dim: {}\n{prefix}Side: {}\n{prefix}Field: {}",
            self.dim, self.pos, field
        )
    }
}

/// Symmetric (even) reflection BC
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymmBC {
    binding: BCBinding,
}

impl SymmBC {
    pub fn new(field: FieldId, dim: usize, pos: DimPos) -> Self {
        Self {
            binding: BCBinding::new(field, dim, pos),
        }
    }
}

impl BoundaryCondition for SymmBC {
    fn evaluate<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, BCError> {
        let reflected = self.binding.checked_reflect(field, index)?;
        self.binding.read(field, &reflected)
    }

    fn bc_type(&self) -> BCType {
        BCType::Symm
    }

    fn type_name(&self) -> &'static str {
        "SymmetricBC"
    }

    fn describe(&self, level: usize) -> String {
        format!(
            "{}Type: Symmetric\n{}",
            indent(level),
            self.binding.describe_lines(level)
        )
    }

    fn copy(&self) -> BCEnum {
        BCEnum::Symmetric(self.clone())
    }

    fn assign_from(&mut self, other: &BCEnum) -> Result<(), BCError> {
        match other {
            BCEnum::Symmetric(o) => {
                self.binding = o.binding;
                Ok(())
            }
            _ => Err(BCError::KindMismatch {
                target: self.type_name(),
                found: other.type_name(),
            }),
        }
    }

    fn rebind_field(&mut self, field: FieldId) {
        self.binding.field = Some(field);
    }

    fn bound_field(&self) -> Option<FieldId> {
        self.binding.field
    }

    fn dim(&self) -> usize {
        self.binding.dim
    }

    fn side(&self) -> DimPos {
        self.binding.pos
    }
}

/// Antisymmetric (odd) reflection BC
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ASymmBC {
    binding: BCBinding,
}

impl ASymmBC {
    pub fn new(field: FieldId, dim: usize, pos: DimPos) -> Self {
        Self {
            binding: BCBinding::new(field, dim, pos),
        }
    }
}

impl BoundaryCondition for ASymmBC {
    fn evaluate<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, BCError> {
        let reflected = self.binding.checked_reflect(field, index)?;
        let value = self.binding.read(field, &reflected)?;
        if reflected == *index && !value.is_zero() {
            return Err(BCError::NonZeroOnBoundary {
                index: index.to_vec(),
                value: value.describe(),
            });
        }
        Ok(-value)
    }

    fn bc_type(&self) -> BCType {
        BCType::ASymm
    }

    fn type_name(&self) -> &'static str {
        "ASymmetricBC"
    }

    fn describe(&self, level: usize) -> String {
        format!(
            "{}Type: ASymmetric\n{}",
            indent(level),
            self.binding.describe_lines(level)
        )
    }

    fn copy(&self) -> BCEnum {
        BCEnum::AntiSymmetric(self.clone())
    }

    fn assign_from(&mut self, other: &BCEnum) -> Result<(), BCError> {
        match other {
            BCEnum::AntiSymmetric(o) => {
                self.binding = o.binding;
                Ok(())
            }
            _ => Err(BCError::KindMismatch {
                target: self.type_name(),
                found: other.type_name(),
            }),
        }
    }

    fn rebind_field(&mut self, field: FieldId) {
        self.binding.field = Some(field);
    }

    fn bound_field(&self) -> Option<FieldId> {
        self.binding.field
    }

    fn dim(&self) -> usize {
        self.binding.dim
    }

    fn side(&self) -> DimPos {
        self.binding.pos
    }
}
