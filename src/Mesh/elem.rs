//! Element types a structured field can evaluate to.
//!
//! A numeric field evaluates to `f64`. During assembly the same operator is evaluated on a
//! stencil view of the unknown, whose elements are [`StencilPad`]s: sparse linear
//! combinations of unknowns plus a constant. Both implement [`FieldElem`], so boundary
//! conditions and operators are written once for either.

use super::range::{MDIndex, index_to_string};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

pub trait FieldElem:
    Clone
    + Debug
    + Send
    + Sync
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
{
    fn constant(value: f64) -> Self;
    fn is_zero(&self) -> bool;
    fn describe(&self) -> String;
}

impl FieldElem for f64 {
    fn constant(value: f64) -> Self {
        value
    }
    fn is_zero(&self) -> bool {
        *self == 0.0
    }
    fn describe(&self) -> String {
        format!("{}", self)
    }
}

/// Linear combination `sum(coeff_i * u[index_i]) + bias`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StencilPad<const D: usize> {
    pub coeffs: BTreeMap<MDIndex<D>, f64>,
    pub bias: f64,
}

impl<const D: usize> StencilPad<D> {
    /// the unknown at `index` with coefficient one
    pub fn unit(index: MDIndex<D>) -> Self {
        let mut coeffs = BTreeMap::new();
        coeffs.insert(index, 1.0);
        Self { coeffs, bias: 0.0 }
    }

    pub fn coeff(&self, index: &MDIndex<D>) -> f64 {
        self.coeffs.get(index).copied().unwrap_or(0.0)
    }

    fn merged(mut self, other: Self, sign: f64) -> Self {
        for (idx, c) in other.coeffs {
            *self.coeffs.entry(idx).or_insert(0.0) += sign * c;
        }
        self.bias += sign * other.bias;
        self
    }
}

impl<const D: usize> Neg for StencilPad<D> {
    type Output = Self;
    fn neg(mut self) -> Self {
        self.coeffs.values_mut().for_each(|c| *c = -*c);
        self.bias = -self.bias;
        self
    }
}

impl<const D: usize> Add for StencilPad<D> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.merged(rhs, 1.0)
    }
}

impl<const D: usize> Sub for StencilPad<D> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.merged(rhs, -1.0)
    }
}

impl<const D: usize> Mul<f64> for StencilPad<D> {
    type Output = Self;
    fn mul(mut self, rhs: f64) -> Self {
        self.coeffs.values_mut().for_each(|c| *c *= rhs);
        self.bias *= rhs;
        self
    }
}

impl<const D: usize> FieldElem for StencilPad<D> {
    fn constant(value: f64) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            bias: value,
        }
    }

    fn is_zero(&self) -> bool {
        self.bias == 0.0 && self.coeffs.values().all(|c| *c == 0.0)
    }

    fn describe(&self) -> String {
        let mut terms: Vec<String> = self
            .coeffs
            .iter()
            .map(|(idx, c)| format!("{}*u{}", c, index_to_string(idx)))
            .collect();
        terms.push(format!("{}", self.bias));
        terms.join(" + ")
    }
}
