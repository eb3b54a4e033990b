//! # Distributed Krylov solvers
//!
//! Every worker holds the rows of the system it owns as a `sprs` CSR block of shape
//! `local_rows x global_rows`, and the matching slices of the right-hand side and solution
//! as `nalgebra` vectors. A matrix-vector product gathers the full vector from all workers;
//! dot products are reduced across workers, so every branch taken by the iteration is the
//! same on all of them.
//!
//! Two methods are provided:
//! - BiCGStab with right preconditioning, for general systems
//! - conjugate gradients, for symmetric definite systems
//!
//! and two preconditioners: Jacobi (inverse diagonal) and identity.

use super::params::{KrylovMethod, Preconditioner, SolverParams};
use crate::Parallel::comm::{CommError, Communicator};
use crate::Parallel::environment::CommContext;
use log::trace;
use nalgebra::DVector;
use prettytable::{Table, row};
use sprs::{CsMat, TriMat};

/// Rows `row_offset..row_offset + rows()` of a distributed sparse matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DistMatrix {
    local: CsMat<f64>,
    row_offset: usize,
}

impl DistMatrix {
    /// `(local row, global column, value)` triplets; duplicates are summed
    pub fn from_triplets(
        local_rows: usize,
        global_cols: usize,
        row_offset: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Self {
        let mut tri = TriMat::new((local_rows, global_cols));
        for &(r, c, v) in triplets {
            tri.add_triplet(r, c, v);
        }
        Self {
            local: tri.to_csr(),
            row_offset,
        }
    }

    pub fn local(&self) -> &CsMat<f64> {
        &self.local
    }

    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    pub fn rows(&self) -> usize {
        self.local.rows()
    }

    pub fn global_cols(&self) -> usize {
        self.local.cols()
    }

    pub fn nnz(&self) -> usize {
        self.local.nnz()
    }

    /// entry at local row `row`, global column `col`
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.local.get(row, col).copied().unwrap_or(0.0)
    }

    /// diagonal entries of the owned rows
    pub fn diagonal(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.rows(),
            (0..self.rows()).map(|i| self.get(i, self.row_offset + i)),
        )
    }

    /// collective: owned rows of `A x`, `x_local` being the owned slice of `x`
    pub fn spmv(
        &self,
        comm: &dyn Communicator,
        x_local: &DVector<f64>,
    ) -> Result<DVector<f64>, CommError> {
        let x = comm.all_gather(x_local.as_slice())?;
        Ok(DVector::from_iterator(
            self.rows(),
            self.local
                .outer_iterator()
                .map(|row| row.iter().map(|(col, v)| v * x[col]).sum::<f64>()),
        ))
    }
}

/// Outcome of one linear solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// `||b - Ax|| / ||b||`
    pub rel_err: f64,
    /// `||b - Ax||`
    pub abs_err: f64,
    pub converged: bool,
}

impl SolveReport {
    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(row!["Iterations", "Relative error", "Absolute error", "Converged"]);
        table.add_row(row![
            self.iterations,
            format!("{:.3e}", self.rel_err),
            format!("{:.3e}", self.abs_err),
            self.converged
        ]);
        table.printstd();
    }
}

/// Backend the equation solve handler dispatches to
pub trait LinearSolver {
    /// called every time the matrix is (re)assembled
    fn setup(&mut self, matrix: &DistMatrix);
    /// collective; `x` holds the initial guess on entry and the solution on exit
    fn solve(
        &mut self,
        ctx: &CommContext<'_>,
        matrix: &DistMatrix,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> Result<SolveReport, CommError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct KrylovSolver {
    params: SolverParams,
    inv_diag: Option<DVector<f64>>,
}

fn dot(comm: &dyn Communicator, a: &DVector<f64>, b: &DVector<f64>) -> Result<f64, CommError> {
    comm.all_reduce_sum(a.dot(b))
}

fn norm(comm: &dyn Communicator, a: &DVector<f64>) -> Result<f64, CommError> {
    Ok(dot(comm, a, a)?.sqrt())
}

/// several sums reduced in one collective
fn reduce_sums<const N: usize>(
    comm: &dyn Communicator,
    local: [f64; N],
) -> Result<[f64; N], CommError> {
    let gathered = comm.all_gather(&local)?;
    let mut total = [0.0; N];
    for chunk in gathered.chunks(N) {
        for (t, v) in total.iter_mut().zip(chunk) {
            *t += v;
        }
    }
    Ok(total)
}

/// an inner product negligible against the norms of its factors ends the iteration
fn breakdown(product: f64, norm_a: f64, norm_b: f64) -> bool {
    product.abs() <= f64::EPSILON * norm_a * norm_b
}

impl KrylovSolver {
    pub fn new(params: &SolverParams) -> Self {
        Self {
            params: params.clone(),
            inv_diag: None,
        }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    fn precondition(&self, v: &DVector<f64>) -> DVector<f64> {
        match (&self.inv_diag, self.params.preconditioner) {
            (Some(d), Preconditioner::Jacobi) if d.len() == v.len() => v.component_mul(d),
            _ => v.clone(),
        }
    }

    fn trace_residual(&self, comm: &dyn Communicator, iter: usize, rel: f64) {
        if self.params.verbose && comm.rank() == 0 {
            trace!("{} iter {}: relative residual = {:.6e}", self.name(), iter, rel);
        }
    }

    fn bicgstab(
        &self,
        comm: &dyn Communicator,
        a: &DistMatrix,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
        b_norm: f64,
    ) -> Result<usize, CommError> {
        let tol = self.params.tol;
        let mut r = b - a.spmv(comm, x)?;
        let mut r_norm = norm(comm, &r)?;
        if r_norm / b_norm < tol {
            return Ok(0);
        }
        let r0 = r.clone();
        let r0_norm = r_norm;
        let n = r.len();
        let mut p = DVector::zeros(n);
        let mut v = DVector::zeros(n);
        let (mut rho, mut alpha, mut omega) = (1.0, 1.0, 1.0);

        for iter in 1..=self.params.maxiter {
            let rho_new = dot(comm, &r0, &r)?;
            if breakdown(rho_new, r0_norm, r_norm) {
                return Ok(iter);
            }
            if iter == 1 {
                p.copy_from(&r);
            } else {
                let beta = (rho_new / rho) * (alpha / omega);
                p = &r + (&p - &v * omega) * beta;
            }
            let p_hat = self.precondition(&p);
            v = a.spmv(comm, &p_hat)?;
            let [r0v, vv] = reduce_sums(comm, [r0.dot(&v), v.dot(&v)])?;
            if breakdown(r0v, r0_norm, vv.sqrt()) {
                return Ok(iter);
            }
            alpha = rho_new / r0v;
            let s = &r - &v * alpha;
            let s_rel = norm(comm, &s)? / b_norm;
            if s_rel < tol {
                x.axpy(alpha, &p_hat, 1.0);
                self.trace_residual(comm, iter, s_rel);
                return Ok(iter);
            }
            let s_hat = self.precondition(&s);
            let t = a.spmv(comm, &s_hat)?;
            let [tt, ts] = reduce_sums(comm, [t.dot(&t), t.dot(&s)])?;
            omega = if tt > 0.0 { ts / tt } else { 0.0 };
            x.axpy(alpha, &p_hat, 1.0);
            x.axpy(omega, &s_hat, 1.0);
            r = s - t * omega;
            rho = rho_new;
            r_norm = norm(comm, &r)?;
            let rel = r_norm / b_norm;
            self.trace_residual(comm, iter, rel);
            if rel < tol || omega == 0.0 {
                return Ok(iter);
            }
        }
        Ok(self.params.maxiter)
    }

    fn cg(
        &self,
        comm: &dyn Communicator,
        a: &DistMatrix,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
        b_norm: f64,
    ) -> Result<usize, CommError> {
        let tol = self.params.tol;
        let mut r = b - a.spmv(comm, x)?;
        if norm(comm, &r)? / b_norm < tol {
            return Ok(0);
        }
        let mut z = self.precondition(&r);
        let mut p = z.clone();
        let mut rz = dot(comm, &r, &z)?;

        for iter in 1..=self.params.maxiter {
            let q = a.spmv(comm, &p)?;
            let [pq, pp, qq] = reduce_sums(comm, [p.dot(&q), p.dot(&p), q.dot(&q)])?;
            if breakdown(pq, pp.sqrt(), qq.sqrt()) {
                return Ok(iter);
            }
            let alpha = rz / pq;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &q, 1.0);
            let rel = norm(comm, &r)? / b_norm;
            self.trace_residual(comm, iter, rel);
            if rel < tol {
                return Ok(iter);
            }
            z = self.precondition(&r);
            let rz_new = dot(comm, &r, &z)?;
            let beta = rz_new / rz;
            p = &z + &p * beta;
            rz = rz_new;
        }
        Ok(self.params.maxiter)
    }
}

impl LinearSolver for KrylovSolver {
    fn setup(&mut self, matrix: &DistMatrix) {
        let diag = matrix.diagonal();
        self.inv_diag = Some(diag.map(|d| if d != 0.0 { 1.0 / d } else { 1.0 }));
    }

    fn solve(
        &mut self,
        ctx: &CommContext<'_>,
        matrix: &DistMatrix,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> Result<SolveReport, CommError> {
        let comm = ctx.comm();
        if self.inv_diag.is_none() {
            self.setup(matrix);
        }
        let b_norm = match norm(comm, b)? {
            n if n > 0.0 => n,
            _ => 1.0,
        };
        let iterations = match self.params.method {
            KrylovMethod::BiCgStab => self.bicgstab(comm, matrix, b, x, b_norm)?,
            KrylovMethod::Cg => self.cg(comm, matrix, b, x, b_norm)?,
        };
        // report the true residual, not the recursively updated one
        let abs_err = norm(comm, &(b - matrix.spmv(comm, x)?))?;
        let rel_err = abs_err / b_norm;
        Ok(SolveReport {
            iterations,
            rel_err,
            abs_err,
            converged: rel_err < self.params.tol,
        })
    }

    fn name(&self) -> &'static str {
        match self.params.method {
            KrylovMethod::BiCgStab => "BiCGStab",
            KrylovMethod::Cg => "CG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parallel::comm::ThreadComm;
    use crate::Parallel::environment::ParallelEnvironment;
    use approx::assert_relative_eq;
    use std::thread;

    /// rows `lo..hi` of the 1-D Laplacian `[-1, 2, -1]` of size `n`
    fn laplacian_rows(n: usize, lo: usize, hi: usize) -> DistMatrix {
        let mut triplets = Vec::new();
        for g in lo..hi {
            let r = g - lo;
            triplets.push((r, g, 2.0));
            if g > 0 {
                triplets.push((r, g - 1, -1.0));
            }
            if g + 1 < n {
                triplets.push((r, g + 1, -1.0));
            }
        }
        DistMatrix::from_triplets(hi - lo, n, lo, &triplets)
    }

    fn solve_serial(params: &SolverParams, n: usize) -> (DVector<f64>, SolveReport) {
        solve_scaled(params, n, 1.0)
    }

    /// `A x = scale * 1` on the 1-D Laplacian
    fn solve_scaled(params: &SolverParams, n: usize, scale: f64) -> (DVector<f64>, SolveReport) {
        let env = ParallelEnvironment::serial();
        let ctx = env.context();
        let a = laplacian_rows(n, 0, n);
        let b = DVector::from_element(n, scale);
        let mut x = DVector::zeros(n);
        let mut solver = KrylovSolver::new(params);
        solver.setup(&a);
        let report = solver.solve(&ctx, &a, &b, &mut x).unwrap();
        (x, report)
    }

    #[test]
    fn test_matrix_structure() {
        let a = DistMatrix::from_triplets(2, 4, 1, &[(0, 1, 2.0), (0, 1, 1.0), (1, 0, -1.0)]);
        assert_eq!(a.rows(), 2);
        assert_eq!(a.global_cols(), 4);
        assert_eq!(a.nnz(), 2);
        assert_eq!(a.get(0, 1), 3.0);
        assert_eq!(a.diagonal(), DVector::from_vec(vec![3.0, 0.0]));
    }

    #[test]
    fn test_bicgstab_and_cg_converge() {
        for method in [KrylovMethod::BiCgStab, KrylovMethod::Cg] {
            let mut params = SolverParams::new(1e-10, 200, false);
            params.method = method;
            let (x, report) = solve_serial(&params, 20);
            assert!(report.converged, "{:?} did not converge: {:?}", method, report);
            assert!(report.rel_err < 1e-10);
            assert!(report.iterations > 0 && report.iterations <= 200);
            // exact solution of -u'' = 1 with zero ends: x_i = (i+1)(n-i)/2
            for i in 0..20 {
                assert_relative_eq!(x[i], ((i + 1) * (20 - i)) as f64 / 2.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_convergence_independent_of_rhs_scale() {
        for method in [KrylovMethod::BiCgStab, KrylovMethod::Cg] {
            let mut params = SolverParams::new(1e-10, 200, false);
            params.method = method;
            let (unit, _) = solve_serial(&params, 20);
            for scale in [1e-16, 1e-40, 1e20] {
                let (x, report) = solve_scaled(&params, 20, scale);
                assert!(report.converged, "{:?} at scale {}: {:?}", method, scale, report);
                assert!(report.iterations > 1);
                for i in 0..20 {
                    assert_relative_eq!(x[i] / scale, unit[i], max_relative = 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_iteration_cap_is_reported() {
        let params = SolverParams::new(1e-16, 1, false);
        let (_, report) = solve_serial(&params, 30);
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
        assert!(report.rel_err > 1e-16);
        assert_relative_eq!(report.abs_err, report.rel_err * 30f64.sqrt(), epsilon = 1e-9);
        report.pretty_print();
    }

    #[test]
    fn test_zero_rhs_needs_no_iteration() {
        let env = ParallelEnvironment::serial();
        let ctx = env.context();
        let a = laplacian_rows(5, 0, 5);
        let mut x = DVector::zeros(5);
        let mut solver = KrylovSolver::new(&SolverParams::default());
        let report = solver.solve(&ctx, &a, &DVector::zeros(5), &mut x).unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
    }

    #[test]
    fn test_distributed_matches_serial() {
        let n = 17;
        let params = SolverParams::new(1e-12, 200, false);
        let (serial, _) = solve_serial(&params, n);
        let bounds = [(0, 6), (6, 12), (12, 17)];
        let pieces: Vec<(usize, DVector<f64>)> = thread::scope(|s| {
            let handles: Vec<_> = ThreadComm::group(3)
                .into_iter()
                .map(|comm| {
                    let (lo, hi) = bounds[comm.rank()];
                    let params = params.clone();
                    s.spawn(move || {
                        let env = ParallelEnvironment::new(comm);
                        let ctx = env.context();
                        let a = laplacian_rows(n, lo, hi);
                        let b = DVector::from_element(hi - lo, 1.0);
                        let mut x = DVector::zeros(hi - lo);
                        let mut solver = KrylovSolver::new(&params);
                        solver.setup(&a);
                        let report = solver.solve(&ctx, &a, &b, &mut x).unwrap();
                        assert!(report.converged);
                        (lo, x)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (lo, x) in pieces {
            for (i, v) in x.iter().enumerate() {
                assert_relative_eq!(*v, serial[lo + i], epsilon = 1e-8);
            }
        }
    }
}
