//! Timing runs of the 2-D Poisson problem `d2x(u) + d2y(u) == 1` with zero Dirichlet
//! boundaries on an `n x n` mesh, split over in-process workers:
//! - 0 `matgen`: assembly of the linear system
//! - 1 `solve`: solves with the matrix rebuilt every time
//! - 2 `dy_solve`: solves reusing the first matrix
use crate::Boundary::bc_api::BCSpec;
use crate::EqnSolve::expr::{Equation, Expr, d2x, d2y};
use crate::EqnSolve::handler::{EqnSolveHandler, SolveError};
use crate::EqnSolve::mapper::BlockedMDRangeMapper;
use crate::EqnSolve::params::SolverParams;
use crate::Mesh::cartesian::MeshBuilder;
use crate::Mesh::field::FieldBuilder;
use crate::Mesh::field_api::{FieldError, LocOnMesh};
use crate::Parallel::comm::{CommError, ThreadComm};
use crate::Parallel::environment::ParallelEnvironment;
use crate::Utils::timing::Stopwatch;
use crate::master_info;
use log::{error, warn};
use prettytable::{Table, row};
use std::thread;

const REPEATS: usize = 5;

fn poisson(u: Expr<2>) -> Equation<2> {
    (d2x(u.clone()) + d2y(u)).equals(1.0)
}

fn task_name(task: usize) -> Option<&'static str> {
    match task {
        0 => Some("matgen"),
        1 => Some("solve"),
        2 => Some("dy_solve"),
        _ => None,
    }
}

/// one worker's share of a run; returns the gathered time of every repetition
fn run_worker(task: usize, n: usize, env: &ParallelEnvironment) -> Result<Vec<f64>, SolveError> {
    let mesh = MeshBuilder::new_mesh([n, n])
        .set_mesh_of_dim(0, 0., 1.)
        .set_mesh_of_dim(1, 0., 1.)
        .build()
        .map_err(FieldError::from)?;
    let mut u = FieldBuilder::new()
        .set_name("u")
        .set_mesh(mesh)
        .set_loc([LocOnMesh::Center, LocOnMesh::Center])
        .set_all_bcs(BCSpec::Dirichlet(0.))
        .set_partition(env.size(), env.rank())
        .build()?;
    let mapper = BlockedMDRangeMapper::gathered(env.comm(), u.local_writable_range())?;
    let params = match task {
        0 => SolverParams::new(1e-16, 100, false),
        1 => SolverParams::new(1e-50, 10, false),
        _ => SolverParams::new(1e-50, 10, true),
    };
    let mut handler = EqnSolveHandler::new(env, poisson, &mut u, mapper, params)?;
    let mut times = Vec::with_capacity(REPEATS);
    if task == 0 {
        for _ in 0..REPEATS {
            let watch = Stopwatch::start();
            handler.generate_ab()?;
            times.push(watch.gather(env.comm())?);
        }
    } else {
        let report = handler.solve()?;
        master_info!(
            env,
            "first solve: {} iterations, relative error {:.3e}, absolute error {:.3e}",
            report.iterations,
            report.rel_err,
            report.abs_err
        );
        for _ in 0..REPEATS {
            handler.target_mut().assign_scalar(0.);
            let watch = Stopwatch::start();
            handler.solve()?;
            times.push(watch.gather(env.comm())?);
        }
    }
    handler.finalize()?;
    Ok(times)
}

/// Runs one worker and withdraws it from the group on failure, so that its peers fail
/// their next collective instead of waiting for it.
fn run_or_abort(task: usize, n: usize, env: &ParallelEnvironment) -> Result<Vec<f64>, SolveError> {
    let result = run_worker(task, n, env);
    if let Err(e) = &result {
        error!("worker {}: {}", env.rank(), e);
        env.abort();
    }
    result
}

fn print_timings(name: &str, n: usize, workers: usize, times: &[f64]) {
    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut table = Table::new();
    table.add_row(row!["Benchmark", "n", "Workers", "Mean, ms", "Min, ms"]);
    table.add_row(row![
        name,
        n,
        workers,
        format!("{:.3}", mean * 1e3),
        format!("{:.3}", min * 1e3)
    ]);
    table.printstd();
}

/// Runs example `task` on `workers` in-process workers and returns the timings of worker 0.
/// Fails with the first error of any worker, a worker panic included.
pub fn eqn_solve_examples(task: usize, n: usize, workers: usize) -> Result<Vec<f64>, SolveError> {
    let Some(name) = task_name(task) else {
        warn!("no example with number {}", task);
        return Ok(Vec::new());
    };
    let results: Vec<Result<Vec<f64>, SolveError>> = thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::group(workers)
            .into_iter()
            .map(|comm| {
                s.spawn(move || {
                    let env = ParallelEnvironment::new(comm);
                    run_or_abort(task, n, &env)
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| {
                h.join()
                    .unwrap_or_else(|_| Err(CommError::Panicked { rank }.into()))
            })
            .collect()
    });
    let mut timings = Vec::new();
    let mut errors = Vec::new();
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(times) if rank == 0 => timings = times,
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        // report the worker that failed on its own, not a peer it aborted
        let cause = errors
            .iter()
            .position(|e| !matches!(e, SolveError::Comm(CommError::Aborted { .. })))
            .unwrap_or(0);
        let e = errors.swap_remove(cause);
        error!("{} failed: {}", name, e);
        return Err(e);
    }
    print_timings(name, n, workers.max(1), &timings);
    Ok(timings)
}

/// Runs example `task` with this process as one worker of an MPI job.
#[cfg(feature = "mpi")]
pub fn eqn_solve_examples_mpi(
    env: &ParallelEnvironment,
    task: usize,
    n: usize,
) -> Result<Vec<f64>, SolveError> {
    let Some(name) = task_name(task) else {
        warn!("no example with number {}", task);
        return Ok(Vec::new());
    };
    let times = run_or_abort(task, n, env)?;
    if env.rank() == 0 {
        print_timings(name, n, env.size(), &times);
    }
    Ok(times)
}
