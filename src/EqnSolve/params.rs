//! # Solver parameters
//!
//! Tolerance, iteration cap and matrix policy of an equation solve handler, plus the
//! choice of Krylov method and preconditioner. Parameters can be kept in a JSON file:
//!
//! ```json
//! {
//!   "tol": 1e-10,
//!   "maxiter": 500,
//!   "static_mat": false,
//!   "method": "BiCgStab",
//!   "preconditioner": "Jacobi",
//!   "verbose": false
//! }
//! ```
//!
//! A missing file yields the defaults; a present but malformed one is an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("tolerance must be positive, got {0}")]
    NonPositiveTol(f64),
    #[error("maxiter must be positive")]
    ZeroMaxIter,
    #[error("cannot access parameter file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed parameter file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KrylovMethod {
    BiCgStab,
    /// conjugate gradients; only for symmetric positive (or negative) definite systems
    Cg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preconditioner {
    Jacobi,
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// relative residual `||b - Ax|| / ||b||` to reach
    pub tol: f64,
    pub maxiter: usize,
    /// keep the first assembled matrix and only refresh the right-hand side afterwards
    pub static_mat: bool,
    pub method: KrylovMethod,
    pub preconditioner: Preconditioner,
    /// log the residual of every iteration at trace level
    pub verbose: bool,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tol: 1e-10,
            maxiter: 500,
            static_mat: false,
            method: KrylovMethod::BiCgStab,
            preconditioner: Preconditioner::Jacobi,
            verbose: false,
        }
    }
}

impl SolverParams {
    pub fn new(tol: f64, maxiter: usize, static_mat: bool) -> Self {
        Self {
            tol,
            maxiter,
            static_mat,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.tol > 0.0) {
            return Err(ParamsError::NonPositiveTol(self.tol));
        }
        if self.maxiter == 0 {
            return Err(ParamsError::ZeroMaxIter);
        }
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let params = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            log::info!("{} not found, using default solver parameters", path.display());
            Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ParamsError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
