//! Dirichlet and Neumann boundary conditions expressed through the same reflection as the
//! logical BCs: the ghost value is extrapolated from the mirror value so that the prescribed
//! boundary value (Dirichlet) or outward normal derivative (Neumann) holds on the boundary
//! plane.

use super::bc_api::{BCEnum, BCError, BCType, BoundaryCondition, indent};
use super::logical_bc::BCBinding;
use crate::Mesh::elem::FieldElem;
use crate::Mesh::field_api::{DimPos, FieldId, StructuredField};
use crate::Mesh::range::MDIndex;

/// `ghost = 2*value - mirror`, or `value` on the boundary plane itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DircBC {
    binding: BCBinding,
    pub value: f64,
}

impl DircBC {
    pub fn new(field: FieldId, dim: usize, pos: DimPos, value: f64) -> Self {
        Self {
            binding: BCBinding::new(field, dim, pos),
            value,
        }
    }
}

impl BoundaryCondition for DircBC {
    fn evaluate<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, BCError> {
        let reflected = self.binding.checked_reflect(field, index)?;
        if reflected == *index {
            return Ok(F::Elem::constant(self.value));
        }
        let mirror = self.binding.read(field, &reflected)?;
        Ok(F::Elem::constant(2.0 * self.value) - mirror)
    }

    fn bc_type(&self) -> BCType {
        BCType::Dirc
    }

    fn type_name(&self) -> &'static str {
        "DirichletBC"
    }

    fn describe(&self, level: usize) -> String {
        let prefix = indent(level);
        format!(
            "{prefix}Type: Dirichlet\n{prefix}Value: {}\n{}",
            self.value,
            self.binding.describe_lines(level)
        )
    }

    fn copy(&self) -> BCEnum {
        BCEnum::Dirichlet(self.clone())
    }

    fn assign_from(&mut self, other: &BCEnum) -> Result<(), BCError> {
        match other {
            BCEnum::Dirichlet(o) => {
                *self = o.clone();
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

/// `ghost = mirror + gradient * distance`, gradient being the outward normal derivative
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeumBC {
    binding: BCBinding,
    pub gradient: f64,
}

impl NeumBC {
    pub fn new(field: FieldId, dim: usize, pos: DimPos, gradient: f64) -> Self {
        Self {
            binding: BCBinding::new(field, dim, pos),
            gradient,
        }
    }
}

impl BoundaryCondition for NeumBC {
    fn evaluate<const D: usize, F: StructuredField<D>>(
        &self,
        field: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, BCError> {
        let reflected = self.binding.checked_reflect(field, index)?;
        let mirror = self.binding.read(field, &reflected)?;
        let dim = self.binding.dim;
        let distance = (index[dim] - reflected[dim]).abs() as f64 * field.spacing(dim);
        Ok(mirror + F::Elem::constant(self.gradient * distance))
    }

    fn bc_type(&self) -> BCType {
        BCType::Neum
    }

    fn type_name(&self) -> &'static str {
        "NeumannBC"
    }

    fn describe(&self, level: usize) -> String {
        let prefix = indent(level);
        format!(
            "{prefix}Type: Neumann\n{prefix}Gradient: {}\n{}",
            self.gradient,
            self.binding.describe_lines(level)
        )
    }

    fn copy(&self) -> BCEnum {
        BCEnum::Neumann(self.clone())
    }

    fn assign_from(&mut self, other: &BCEnum) -> Result<(), BCError> {
        match other {
            BCEnum::Neumann(o) => {
                *self = o.clone();
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
