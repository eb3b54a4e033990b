//! # Cartesian fields
//!
//! `CartesianField` stores the values a worker owns (its local range) together with one
//! boundary condition per (dimension, side). Any index past the accessible range is answered
//! by the boundary condition of the boundary it lies behind.
//!
//! `StencilField` is a read-only view of the same field in which every in-range value is
//! replaced by the unknown at that index. Evaluating an operator on it yields the matrix row
//! of that operator; boundary conditions fold ghost values back onto in-range unknowns.

use super::cartesian::{CartesianMesh, EvenSplitStrategy, MeshError};
use super::elem::{FieldElem, StencilPad};
use super::field_api::{DimPos, FieldError, FieldId, LocOnMesh, StructuredField};
use super::range::{MDIndex, Range, common_range, in_range};
use crate::Boundary::bc_api::{BCEnum, BCSpec, BCType, BoundaryCondition, create_bc};
use log::debug;
use prettytable::{Table, row};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct CartesianField<const D: usize> {
    id: FieldId,
    name: String,
    mesh: CartesianMesh<D>,
    loc: [LocOnMesh; D],
    accessible_range: Range<D>,
    local_range: Range<D>,
    /// values over `local_range`, row-major
    values: Vec<f64>,
    bcs: BTreeMap<(usize, DimPos), BCEnum>,
}

impl<const D: usize> Clone for CartesianField<D> {
    /// the copy is a new field: it gets its own id and its boundary conditions are rebound to it
    fn clone(&self) -> Self {
        let id = FieldId::fresh();
        let bcs = self
            .bcs
            .iter()
            .map(|(key, bc)| {
                let mut bc = bc.copy();
                bc.rebind_field(id);
                (*key, bc)
            })
            .collect();
        Self {
            id,
            name: self.name.clone(),
            mesh: self.mesh.clone(),
            loc: self.loc,
            accessible_range: self.accessible_range,
            local_range: self.local_range,
            values: self.values.clone(),
            bcs,
        }
    }
}

impl<const D: usize> CartesianField<D> {
    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn mesh(&self) -> &CartesianMesh<D> {
        &self.mesh
    }

    /// values over the local range in row-major order
    pub fn local_values(&self) -> &[f64] {
        &self.values
    }

    pub fn set_local_values(&mut self, values: &[f64]) -> Result<(), FieldError> {
        if values.len() != self.values.len() {
            return Err(FieldError::SizeMismatch {
                expected: self.values.len(),
                found: values.len(),
            });
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    /// stored value at a locally owned index
    pub fn value(&self, index: &MDIndex<D>) -> Option<f64> {
        self.local_range
            .linear_offset(index)
            .map(|offset| self.values[offset])
    }

    pub fn set_value(&mut self, index: &MDIndex<D>, value: f64) -> Result<(), FieldError> {
        let offset = self
            .local_range
            .linear_offset(index)
            .ok_or_else(|| FieldError::NotLocal {
                field: self.name.clone(),
                index: index.to_vec(),
            })?;
        self.values[offset] = value;
        Ok(())
    }

    /// whole-field assignment `u = value`
    pub fn assign_scalar(&mut self, value: f64) {
        self.values.fill(value);
    }

    /// assigns `f(x)` at every local index, `x` being the physical coordinate of the value
    pub fn assign_with<Fun: Fn([f64; D]) -> f64>(&mut self, f: Fun) {
        for (offset, index) in self.local_range.iter().enumerate() {
            self.values[offset] = f(self.coordinate(&index));
        }
    }

    /// physical position of the value stored at `index`
    pub fn coordinate(&self, index: &MDIndex<D>) -> [f64; D] {
        let mut x = [0.0; D];
        for d in 0..D {
            let h = self.mesh.spacing(d);
            let shift = match self.loc[d] {
                LocOnMesh::Corner => 0.0,
                LocOnMesh::Center => 0.5,
            };
            x[d] = self.mesh.lower[d] + (index[d] as f64 + shift) * h;
        }
        x
    }

    /// installs a new boundary condition bound to this field, replacing any previous one
    pub fn set_bc(&mut self, dim: usize, side: DimPos, spec: BCSpec) {
        let bc = create_bc(spec, self.id, dim, side);
        debug!(
            "field {}: {} on dim {} {}",
            self.name,
            bc.type_name(),
            dim,
            side
        );
        self.bcs.insert((dim, side), bc);
    }

    /// installs a copy of an existing boundary condition, rebinding it to this field
    pub fn adopt_bc(&mut self, bc: &BCEnum) {
        let mut bc = bc.copy();
        bc.rebind_field(self.id);
        self.bcs.insert((bc.dim(), bc.side()), bc);
    }

    pub fn bc(&self, dim: usize, side: DimPos) -> Option<&BCEnum> {
        self.bcs.get(&(dim, side))
    }

    /// boundary an index lies behind, i.e. the first dimension where it leaves the accessible range
    pub fn find_boundary(&self, index: &MDIndex<D>) -> Option<(usize, DimPos)> {
        let acc = &self.accessible_range;
        (0..D).find_map(|d| {
            if index[d] < acc.start[d] {
                Some((d, DimPos::Start))
            } else if index[d] >= acc.end[d] {
                Some((d, DimPos::End))
            } else {
                None
            }
        })
    }

    /// Dirichlet BC whose boundary plane passes through `index` (Corner dimensions only)
    fn plane_dirichlet(&self, index: &MDIndex<D>) -> Option<&BCEnum> {
        let acc = &self.accessible_range;
        (0..D)
            .filter(|&d| self.loc[d] == LocOnMesh::Corner)
            .find_map(|d| {
                let side = if index[d] == acc.start[d] {
                    DimPos::Start
                } else if index[d] == acc.end[d] - 1 {
                    DimPos::End
                } else {
                    return None;
                };
                self.bc(d, side).filter(|bc| bc.bc_type() == BCType::Dirc)
            })
    }

    /// Local range minus the Corner nodes carrying a Dirichlet value: the indices whose values
    /// are unknowns of an equation on this field.
    pub fn local_writable_range(&self) -> Range<D> {
        let mut ret = self.local_range;
        let acc = &self.accessible_range;
        for d in 0..D {
            if self.loc[d] != LocOnMesh::Corner {
                continue;
            }
            let dirc = |side| {
                self.bc(d, side)
                    .is_some_and(|bc| bc.bc_type() == BCType::Dirc)
            };
            if dirc(DimPos::Start) && ret.start[d] == acc.start[d] {
                ret.start[d] += 1;
            }
            if dirc(DimPos::End) && ret.end[d] == acc.end[d] {
                ret.end[d] -= 1;
            }
        }
        ret
    }

    /// writes the Dirichlet values onto the Corner boundary nodes owned by this worker
    pub fn update_boundary_planes(&mut self) {
        let local = self.local_range;
        let mut updates = Vec::new();
        for index in local.iter() {
            if let Some(BCEnum::Dirichlet(bc)) = self.plane_dirichlet(&index) {
                updates.push((index, bc.value));
            }
        }
        for (index, value) in updates {
            if let Some(offset) = local.linear_offset(&index) {
                self.values[offset] = value;
            }
        }
    }

    /// view of this field in which values are the unknowns themselves
    pub fn stencil_view(&self) -> StencilField<'_, D> {
        StencilField { field: self }
    }

    fn dispatch_ghost<F: StructuredField<D>>(
        &self,
        view: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, FieldError> {
        let (dim, side) = self
            .find_boundary(index)
            .ok_or_else(|| FieldError::NotLocal {
                field: self.name.clone(),
                index: index.to_vec(),
            })?;
        let bc = self
            .bc(dim, side)
            .ok_or_else(|| FieldError::NoBoundaryCondition {
                field: self.name.clone(),
                dim,
                side,
                index: index.to_vec(),
            })?;
        Ok(bc.evaluate(view, index)?)
    }

    /// prints the boundary condition set as a table
    pub fn pretty_print_bcs(&self) {
        let mut table = Table::new();
        table.add_row(row!["Dim", "Side", "Type", "Description"]);
        for ((dim, side), bc) in &self.bcs {
            table.add_row(row![dim, side, bc.type_name(), bc.describe(0)]);
        }
        println!("\nBoundary conditions of field {} ({}):", self.name, self.id);
        table.printstd();
    }

    /// multi-line summary of the field and its boundary conditions
    pub fn describe(&self, level: usize) -> String {
        let prefix = "\t".repeat(level);
        let mut ret = format!(
            "{prefix}Field: {} {}\n{prefix}Accessible range: {}\n{prefix}Local range: {}",
            self.name, self.id, self.accessible_range, self.local_range
        );
        for ((dim, side), bc) in &self.bcs {
            ret += &format!("\n{prefix}BC at dim {} {}:\n{}", dim, side, bc.describe(level + 1));
        }
        ret
    }
}

impl<const D: usize> StructuredField<D> for CartesianField<D> {
    type Elem = f64;

    fn field_id(&self) -> FieldId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn loc(&self) -> [LocOnMesh; D] {
        self.loc
    }

    fn accessible_range(&self) -> &Range<D> {
        &self.accessible_range
    }

    fn local_range(&self) -> &Range<D> {
        &self.local_range
    }

    fn spacing(&self, dim: usize) -> f64 {
        self.mesh.spacing(dim)
    }

    fn eval_at(&self, index: &MDIndex<D>) -> Result<f64, FieldError> {
        if let Some(v) = self.value(index) {
            return Ok(v);
        }
        if in_range(&self.accessible_range, index) {
            return Err(FieldError::NotLocal {
                field: self.name.clone(),
                index: index.to_vec(),
            });
        }
        self.dispatch_ghost(self, index)
    }

    fn interior_at(&self, index: &MDIndex<D>) -> Option<f64> {
        if in_range(&self.accessible_range, index) {
            self.value(index)
        } else {
            None
        }
    }
}

/// Read-only view of a [`CartesianField`] evaluating to [`StencilPad`]s
#[derive(Debug, Clone, Copy)]
pub struct StencilField<'a, const D: usize> {
    field: &'a CartesianField<D>,
}

impl<'a, const D: usize> StencilField<'a, D> {
    pub fn field(&self) -> &'a CartesianField<D> {
        self.field
    }
}

impl<'a, const D: usize> StructuredField<D> for StencilField<'a, D> {
    type Elem = StencilPad<D>;

    fn field_id(&self) -> FieldId {
        self.field.id
    }

    fn name(&self) -> &str {
        &self.field.name
    }

    fn loc(&self) -> [LocOnMesh; D] {
        self.field.loc
    }

    fn accessible_range(&self) -> &Range<D> {
        &self.field.accessible_range
    }

    fn local_range(&self) -> &Range<D> {
        &self.field.local_range
    }

    fn spacing(&self, dim: usize) -> f64 {
        self.field.spacing(dim)
    }

    fn eval_at(&self, index: &MDIndex<D>) -> Result<StencilPad<D>, FieldError> {
        if in_range(&self.field.accessible_range, index) {
            // a Dirichlet plane node is a known value even when another worker owns it
            if let Some(BCEnum::Dirichlet(bc)) = self.field.plane_dirichlet(index) {
                return Ok(StencilPad::constant(bc.value));
            }
            return Ok(StencilPad::unit(*index));
        }
        self.field.dispatch_ghost(self, index)
    }

    fn interior_at(&self, index: &MDIndex<D>) -> Option<StencilPad<D>> {
        let valid = common_range(&self.field.accessible_range, &self.field.local_range);
        in_range(&valid, index).then(|| StencilPad::unit(*index))
    }
}

/// Builder in the style of `ExprBuilder<Field>().setMesh(m).setLoc(..).setBC(..).build()`
#[derive(Debug, Clone)]
pub struct FieldBuilder<const D: usize> {
    name: String,
    mesh: Option<CartesianMesh<D>>,
    loc: [LocOnMesh; D],
    bcs: Vec<(usize, DimPos, BCSpec)>,
    partition: (usize, usize),
    local_range: Option<Range<D>>,
    initial: f64,
}

impl<const D: usize> FieldBuilder<D> {
    pub fn new() -> Self {
        Self {
            name: "u".to_string(),
            mesh: None,
            loc: [LocOnMesh::Center; D],
            bcs: Vec::new(),
            partition: (1, 0),
            local_range: None,
            initial: 0.0,
        }
    }

    pub fn set_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn set_mesh(mut self, mesh: CartesianMesh<D>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn set_loc(mut self, loc: [LocOnMesh; D]) -> Self {
        self.loc = loc;
        self
    }

    pub fn set_bc(mut self, dim: usize, side: DimPos, spec: BCSpec) -> Self {
        self.bcs.push((dim, side, spec));
        self
    }

    /// same boundary condition on both sides of every dimension
    pub fn set_all_bcs(mut self, spec: BCSpec) -> Self {
        for d in 0..D {
            self.bcs.push((d, DimPos::Start, spec));
            self.bcs.push((d, DimPos::End, spec));
        }
        self
    }

    /// evenly split the accessible range into `workers` parts and keep part `rank`
    pub fn set_partition(mut self, workers: usize, rank: usize) -> Self {
        self.partition = (workers, rank);
        self
    }

    /// explicit local range, overriding `set_partition`
    pub fn set_local_range(mut self, range: Range<D>) -> Self {
        self.local_range = Some(range);
        self
    }

    pub fn set_initial(mut self, value: f64) -> Self {
        self.initial = value;
        self
    }

    pub fn build(self) -> Result<CartesianField<D>, FieldError> {
        let mesh = match self.mesh {
            Some(m) => m,
            None => super::cartesian::MeshBuilder::new_mesh([2; D]).build()?,
        };
        let mut accessible_range = mesh.node_range();
        for d in 0..D {
            if self.loc[d] == LocOnMesh::Center {
                accessible_range.end[d] -= 1;
            }
        }
        let local_range = match self.local_range {
            Some(r) => r,
            None => {
                let (workers, rank) = self.partition;
                let parts = EvenSplitStrategy.split(&accessible_range, workers)?;
                *parts.get(rank).ok_or(MeshError::RankOutOfRange {
                    rank,
                    parts: parts.len(),
                })?
            }
        };
        if common_range(&accessible_range, &local_range) != local_range {
            return Err(FieldError::BadLocalRange {
                local: local_range.to_string(),
                accessible: accessible_range.to_string(),
            });
        }
        let mut field = CartesianField {
            id: FieldId::fresh(),
            name: self.name,
            mesh,
            loc: self.loc,
            accessible_range,
            local_range,
            values: vec![self.initial; local_range.count()],
            bcs: BTreeMap::new(),
        };
        for (dim, side, spec) in self.bcs {
            field.set_bc(dim, side, spec);
        }
        debug!(
            "built field {} {} local {} of accessible {}",
            field.name,
            field.id,
            field.local_range,
            field.accessible_range
        );
        Ok(field)
    }
}

impl<const D: usize> Default for FieldBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}
