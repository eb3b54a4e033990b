//! # Operator expressions
//!
//! A small expression tree over one unknown field. The same tree is evaluated on the
//! numeric field (giving values) and on its stencil view (giving matrix rows), so an
//! equation is written once:
//!
//! ```
//! use GhostFlow::EqnSolve::expr::{Expr, d2x, d2y};
//! let eqn = (d2x(Expr::<2>::Unknown) + d2y(Expr::Unknown)).equals(1.0);
//! assert_eq!(eqn.to_string(), "d2x(u) + d2y(u) == 1");
//! ```
//!
//! Derivatives are second-order centered differences; indices they touch past the
//! accessible range are answered by the boundary conditions of the field.

use crate::Mesh::elem::FieldElem;
use crate::Mesh::field::CartesianField;
use crate::Mesh::field_api::{FieldError, StructuredField};
use crate::Mesh::range::MDIndex;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Expr<const D: usize> {
    /// the field being solved for
    Unknown,
    Const(f64),
    /// a field with known values, e.g. a source term
    Known(Arc<CartesianField<D>>),
    Add(Box<Expr<D>>, Box<Expr<D>>),
    Sub(Box<Expr<D>>, Box<Expr<D>>),
    Scale(f64, Box<Expr<D>>),
    /// `(e[i+1] - e[i-1]) / 2h`
    D1 { dim: usize, arg: Box<Expr<D>> },
    /// `(e[i+1] - 2e[i] + e[i-1]) / h^2`
    D2 { dim: usize, arg: Box<Expr<D>> },
}

fn shifted<const D: usize>(index: &MDIndex<D>, dim: usize, by: i64) -> MDIndex<D> {
    let mut ret = *index;
    ret[dim] += by;
    ret
}

impl<const D: usize> Expr<D> {
    /// value of the expression at `index`, `unknown` standing in for [`Expr::Unknown`]
    pub fn eval<F: StructuredField<D>>(
        &self,
        unknown: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, FieldError> {
        match self {
            Expr::Unknown => unknown.eval_at(index),
            Expr::Const(c) => Ok(F::Elem::constant(*c)),
            Expr::Known(f) => Ok(F::Elem::constant(f.eval_at(index)?)),
            Expr::Add(a, b) => Ok(a.eval(unknown, index)? + b.eval(unknown, index)?),
            Expr::Sub(a, b) => Ok(a.eval(unknown, index)? - b.eval(unknown, index)?),
            Expr::Scale(s, e) => Ok(e.eval(unknown, index)? * *s),
            Expr::D1 { dim, arg } => {
                let h = unknown.spacing(*dim);
                let next = arg.eval(unknown, &shifted(index, *dim, 1))?;
                let prev = arg.eval(unknown, &shifted(index, *dim, -1))?;
                Ok((next - prev) * (0.5 / h))
            }
            Expr::D2 { dim, arg } => {
                let h = unknown.spacing(*dim);
                let next = arg.eval(unknown, &shifted(index, *dim, 1))?;
                let here = arg.eval(unknown, index)?;
                let prev = arg.eval(unknown, &shifted(index, *dim, -1))?;
                Ok((next - here * 2.0 + prev) * (1.0 / (h * h)))
            }
        }
    }

    /// `self == rhs`
    pub fn equals(self, rhs: impl Into<Expr<D>>) -> Equation<D> {
        Equation {
            lhs: self,
            rhs: rhs.into(),
        }
    }
}

/// second derivative in `dim`
pub fn d2<const D: usize>(dim: usize, e: Expr<D>) -> Expr<D> {
    Expr::D2 {
        dim,
        arg: Box::new(e),
    }
}

/// first derivative in `dim`
pub fn d1<const D: usize>(dim: usize, e: Expr<D>) -> Expr<D> {
    Expr::D1 {
        dim,
        arg: Box::new(e),
    }
}

pub fn d2x<const D: usize>(e: Expr<D>) -> Expr<D> {
    d2(0, e)
}

pub fn d2y<const D: usize>(e: Expr<D>) -> Expr<D> {
    d2(1, e)
}

impl<const D: usize> From<f64> for Expr<D> {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl<const D: usize> From<Arc<CartesianField<D>>> for Expr<D> {
    fn from(field: Arc<CartesianField<D>>) -> Self {
        Expr::Known(field)
    }
}

impl<const D: usize> Add for Expr<D> {
    type Output = Expr<D>;
    fn add(self, rhs: Self) -> Self {
        Expr::Add(Box::new(self), Box::new(rhs))
    }
}

impl<const D: usize> Sub for Expr<D> {
    type Output = Expr<D>;
    fn sub(self, rhs: Self) -> Self {
        Expr::Sub(Box::new(self), Box::new(rhs))
    }
}

impl<const D: usize> Mul<f64> for Expr<D> {
    type Output = Expr<D>;
    fn mul(self, rhs: f64) -> Self {
        Expr::Scale(rhs, Box::new(self))
    }
}

impl<const D: usize> Neg for Expr<D> {
    type Output = Expr<D>;
    fn neg(self) -> Self {
        Expr::Scale(-1.0, Box::new(self))
    }
}

const AXES: [&str; 3] = ["x", "y", "z"];

fn axis_name(dim: usize) -> String {
    AXES.get(dim)
        .map(|a| a.to_string())
        .unwrap_or_else(|| dim.to_string())
}

impl<const D: usize> fmt::Display for Expr<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Unknown => write!(f, "u"),
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Known(field) => write!(f, "{}", field.name()),
            Expr::Add(a, b) => write!(f, "{} + {}", a, b),
            Expr::Sub(a, b) => write!(f, "{} - ({})", a, b),
            Expr::Scale(s, e) => write!(f, "{}*({})", s, e),
            Expr::D1 { dim, arg } => write!(f, "d1{}({})", axis_name(*dim), arg),
            Expr::D2 { dim, arg } => write!(f, "d2{}({})", axis_name(*dim), arg),
        }
    }
}

/// `lhs == rhs`, discretized row by row as `lhs - rhs = 0`
#[derive(Debug, Clone)]
pub struct Equation<const D: usize> {
    pub lhs: Expr<D>,
    pub rhs: Expr<D>,
}

impl<const D: usize> Equation<D> {
    /// residual `lhs - rhs` at `index`
    pub fn eval<F: StructuredField<D>>(
        &self,
        unknown: &F,
        index: &MDIndex<D>,
    ) -> Result<F::Elem, FieldError> {
        Ok(self.lhs.eval(unknown, index)? - self.rhs.eval(unknown, index)?)
    }
}

impl<const D: usize> fmt::Display for Equation<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.lhs, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Boundary::bc_api::BCSpec;
    use crate::Mesh::cartesian::MeshBuilder;
    use crate::Mesh::field::FieldBuilder;
    use crate::Mesh::field_api::{DimPos, LocOnMesh};
    use approx::assert_relative_eq;

    fn parabola() -> CartesianField<1> {
        // 11 nodes on [0, 1]
        let mesh = MeshBuilder::new_mesh([11]).build().unwrap();
        let mut f = FieldBuilder::new()
            .set_mesh(mesh)
            .set_loc([LocOnMesh::Corner])
            .set_bc(0, DimPos::Start, BCSpec::Symmetric)
            .set_bc(0, DimPos::End, BCSpec::Neumann(2.0))
            .build()
            .unwrap();
        f.assign_with(|x| x[0] * x[0]);
        f
    }

    #[test]
    fn test_numeric_derivatives() {
        let f = parabola();
        let lap = d2x(Expr::<1>::Unknown);
        let grad = d1(0, Expr::<1>::Unknown);
        for i in 1..10 {
            assert_relative_eq!(lap.eval(&f, &[i]).unwrap(), 2.0, epsilon = 1e-9);
            assert_relative_eq!(
                grad.eval(&f, &[i]).unwrap(),
                2.0 * i as f64 * 0.1,
                epsilon = 1e-12
            );
        }
        // even extension across x = 0 keeps the curvature of x^2
        assert_relative_eq!(lap.eval(&f, &[0]).unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_combinators() {
        let f = Arc::new(parabola());
        let e = (Expr::Unknown * 3.0 - Expr::Known(Arc::clone(&f))) + Expr::from(0.5);
        let g = parabola();
        assert_relative_eq!(e.eval(&g, &[5]).unwrap(), 2.0 * 0.25 + 0.5, epsilon = 1e-12);
        let n = -Expr::<1>::Unknown;
        assert_relative_eq!(n.eval(&g, &[10]).unwrap(), -1.0);
    }

    #[test]
    fn test_stencil_row_of_laplacian() {
        let f = parabola();
        let view = f.stencil_view();
        let eqn = d2x(Expr::<1>::Unknown).equals(1.0);
        let row = eqn.eval(&view, &[4]).unwrap();
        assert_relative_eq!(row.coeff(&[3]), 100.0, epsilon = 1e-9);
        assert_relative_eq!(row.coeff(&[4]), -200.0, epsilon = 1e-9);
        assert_relative_eq!(row.coeff(&[5]), 100.0, epsilon = 1e-9);
        assert_relative_eq!(row.bias, -1.0);
        // the ghost at -1 mirrors node 1, which then carries both neighbours
        let edge = eqn.eval(&view, &[0]).unwrap();
        assert_relative_eq!(edge.coeff(&[1]), 200.0, epsilon = 1e-9);
        assert_relative_eq!(edge.coeff(&[0]), -200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_boundary_condition() {
        let mesh = MeshBuilder::new_mesh([4]).build().unwrap();
        let f = FieldBuilder::new().set_mesh(mesh).build().unwrap();
        let err = d2x(Expr::<1>::Unknown).eval(&f, &[0]).unwrap_err();
        assert!(matches!(err, FieldError::NoBoundaryCondition { dim: 0, .. }));
    }

    #[test]
    fn test_display() {
        let eqn = (d2x(Expr::<2>::Unknown) * 2.0).equals(0.0);
        assert_eq!(eqn.to_string(), "2*(d2x(u)) == 0");
    }
}
