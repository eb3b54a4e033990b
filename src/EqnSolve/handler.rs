//! # Equation solve handler
//!
//! Turns `operator(u) == rhs` on a field `u` with boundary conditions into a distributed
//! linear system `A x = b` and solves it.
//!
//! Assembly evaluates the residual `lhs - rhs` of the equation on the stencil view of `u`
//! at every index of the local writable range. Each evaluation is a linear combination of
//! unknowns plus a constant; the coefficients become a row of `A` (columns given by the
//! row mapper) and the negated constant the matching entry of `b`. Ghost indices touched
//! by the operator are folded onto in-range unknowns by the boundary conditions.
//!
//! With `static_mat` the matrix is assembled once and only `b` is refreshed afterwards;
//! otherwise both are rebuilt on every call. The solver is set up again after every matrix
//! build.
//!
//! The handler borrows the `ParallelEnvironment` it communicates through and holds a
//! `CommContext` from it, released by `finalize` or on drop, so the context is gone before
//! the environment can be.

use super::expr::{Equation, Expr};
use super::krylov::{DistMatrix, KrylovSolver, LinearSolver, SolveReport};
use super::mapper::{BlockedMDRangeMapper, MapperError};
use super::params::{ParamsError, SolverParams};
use crate::Mesh::elem::StencilPad;
use crate::Mesh::field::CartesianField;
use crate::Mesh::field_api::{FieldError, StructuredField};
use crate::Mesh::range::{MDIndex, index_to_string};
use crate::Parallel::comm::CommError;
use crate::Parallel::environment::{CommContext, ParallelEnvironment};
use crate::master_info;
use log::{debug, error, warn};
use nalgebra::DVector;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Mapper(#[from] MapperError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("row mapper covers {mapper} but the writable range of the field is {field}")]
    MapperMismatch { mapper: String, field: String },
    #[error("stencil of row {row} reaches index {index} which no worker owns")]
    Unmapped { row: String, index: String },
    #[error("communication context already released")]
    Released,
    #[error("linear system used before assembly")]
    NotAssembled,
}

/// Which parts of the linear system exist and how later assemblies treat them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStatus {
    Unbuilt,
    /// matrix kept, only the right-hand side is refreshed
    BuiltStatic,
    /// matrix and right-hand side rebuilt on every assembly
    BuiltDynamic,
}

pub struct EqnSolveHandler<'a, const D: usize, S: LinearSolver = KrylovSolver> {
    equation: Equation<D>,
    target: &'a mut CartesianField<D>,
    mapper: BlockedMDRangeMapper<D>,
    params: SolverParams,
    matrix: Option<DistMatrix>,
    rhs: DVector<f64>,
    solver: S,
    status: AssemblyStatus,
    ctx: Option<CommContext<'a>>,
}

impl<'a, const D: usize> EqnSolveHandler<'a, D, KrylovSolver> {
    /// handler solving `eqn_fn(u)` for `u = field` with the built-in Krylov solver
    pub fn new<Fun>(
        env: &'a ParallelEnvironment,
        eqn_fn: Fun,
        field: &'a mut CartesianField<D>,
        mapper: BlockedMDRangeMapper<D>,
        params: SolverParams,
    ) -> Result<Self, SolveError>
    where
        Fun: FnOnce(Expr<D>) -> Equation<D>,
    {
        let solver = KrylovSolver::new(&params);
        Self::with_solver(env, eqn_fn, field, mapper, params, solver)
    }
}

impl<'a, const D: usize, S: LinearSolver> EqnSolveHandler<'a, D, S> {
    pub fn with_solver<Fun>(
        env: &'a ParallelEnvironment,
        eqn_fn: Fun,
        field: &'a mut CartesianField<D>,
        mapper: BlockedMDRangeMapper<D>,
        params: SolverParams,
        solver: S,
    ) -> Result<Self, SolveError>
    where
        Fun: FnOnce(Expr<D>) -> Equation<D>,
    {
        params.validate()?;
        let writable = field.local_writable_range();
        if *mapper.local_range() != writable {
            return Err(SolveError::MapperMismatch {
                mapper: mapper.local_range().to_string(),
                field: writable.to_string(),
            });
        }
        let equation = eqn_fn(Expr::Unknown);
        let ctx = env.context();
        master_info!(
            ctx,
            "{} for {} on field {}: {} unknowns, static matrix: {}",
            solver.name(),
            equation,
            field.name(),
            mapper.global_count(),
            params.static_mat
        );
        Ok(Self {
            equation,
            target: field,
            rhs: DVector::zeros(mapper.local_count()),
            mapper,
            params,
            matrix: None,
            solver,
            status: AssemblyStatus::Unbuilt,
            ctx: Some(ctx),
        })
    }

    /// stencil pads of the local writable indices, in mapper order
    fn assemble_rows(&self) -> Result<Vec<(MDIndex<D>, StencilPad<D>)>, SolveError> {
        let view = self.target.stencil_view();
        let equation = &self.equation;
        let indices: Vec<MDIndex<D>> = self.mapper.local_range().iter().collect();
        let rows = indices
            .par_iter()
            .map(|idx| equation.eval(&view, idx).map(|pad| (*idx, pad)))
            .collect::<Result<Vec<_>, FieldError>>()?;
        Ok(rows)
    }

    fn build_matrix(&self, rows: &[(MDIndex<D>, StencilPad<D>)]) -> Result<DistMatrix, SolveError> {
        let mut triplets = Vec::with_capacity(rows.len() * (2 * D + 1));
        for (r, (row_idx, pad)) in rows.iter().enumerate() {
            for (idx, c) in &pad.coeffs {
                if *c == 0.0 {
                    continue;
                }
                let col = self.mapper.map(idx).ok_or_else(|| SolveError::Unmapped {
                    row: index_to_string(row_idx),
                    index: index_to_string(idx),
                })?;
                triplets.push((r, col, *c));
            }
        }
        Ok(DistMatrix::from_triplets(
            self.mapper.local_count(),
            self.mapper.global_count(),
            self.mapper.local_offset(),
            &triplets,
        ))
    }

    /// Assembles `A` (unless it is static and already built) and `b`. On error the previous
    /// system is left untouched.
    pub fn generate_ab(&mut self) -> Result<(), SolveError> {
        let rows = self.assemble_rows()?;
        let rhs = DVector::from_iterator(rows.len(), rows.iter().map(|(_, pad)| -pad.bias));
        if self.status == AssemblyStatus::BuiltStatic {
            self.rhs = rhs;
            return Ok(());
        }
        let matrix = self.build_matrix(&rows)?;
        debug!(
            "rank {}: assembled {} rows with {} nonzeros",
            self.mapper.rank(),
            matrix.rows(),
            matrix.nnz()
        );
        self.solver.setup(&matrix);
        self.matrix = Some(matrix);
        self.rhs = rhs;
        self.status = if self.params.static_mat {
            AssemblyStatus::BuiltStatic
        } else {
            AssemblyStatus::BuiltDynamic
        };
        Ok(())
    }

    /// Collective: assembles, solves with the current field values as initial guess and
    /// writes the solution back into the field.
    pub fn solve(&mut self) -> Result<SolveReport, SolveError> {
        self.generate_ab()?;
        let writable = *self.mapper.local_range();
        let mut x = DVector::from_iterator(
            writable.count(),
            writable.iter().map(|idx| self.target.value(&idx).unwrap_or(0.0)),
        );
        let ctx = self.ctx.as_ref().ok_or(SolveError::Released)?;
        let matrix = self.matrix.as_ref().ok_or(SolveError::NotAssembled)?;
        let report = self.solver.solve(ctx, matrix, &self.rhs, &mut x)?;
        for (idx, v) in writable.iter().zip(x.iter()) {
            self.target.set_value(&idx, *v)?;
        }
        self.target.update_boundary_planes();
        if !report.converged && ctx.rank() == 0 {
            warn!(
                "{} stopped after {} iterations: relative error {:.3e} above tolerance {:.1e}",
                self.solver.name(),
                report.iterations,
                report.rel_err,
                self.params.tol
            );
        }
        Ok(report)
    }

    /// releases the communication context; the handler is unusable afterwards
    pub fn finalize(mut self) -> Result<(), SolveError> {
        if let Some(mut ctx) = self.ctx.take() {
            ctx.release()?;
        }
        Ok(())
    }

    pub fn target(&self) -> &CartesianField<D> {
        &*self.target
    }

    pub fn target_mut(&mut self) -> &mut CartesianField<D> {
        &mut *self.target
    }

    pub fn status(&self) -> AssemblyStatus {
        self.status
    }

    pub fn matrix(&self) -> Option<&DistMatrix> {
        self.matrix.as_ref()
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    pub fn equation(&self) -> &Equation<D> {
        &self.equation
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn mapper(&self) -> &BlockedMDRangeMapper<D> {
        &self.mapper
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }
}

impl<const D: usize, S: LinearSolver> Drop for EqnSolveHandler<'_, D, S> {
    fn drop(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.release() {
                error!("dropping solve handler: {}", e);
            }
        }
    }
}
