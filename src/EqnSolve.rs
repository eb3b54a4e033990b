/// operator expressions and equations over one unknown field
pub mod expr;
/// assembly and solve of one equation
pub mod handler;
/// distributed sparse matrices and Krylov solvers
pub mod krylov;
pub mod mapper;
pub mod params;
