/// boundary condition trait, errors and the closed set of kinds
pub mod bc_api;
/// symmetric and antisymmetric reflection conditions
pub mod logical_bc;
/// Dirichlet and Neumann conditions
pub mod value_bc;
#[cfg(test)]
mod bc_tests;
