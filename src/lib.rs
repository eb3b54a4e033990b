#[allow(non_snake_case)]
pub mod Boundary;
#[allow(non_snake_case)]
pub mod EqnSolve;
#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod Mesh;
#[allow(non_snake_case)]
pub mod Parallel;
#[allow(non_snake_case)]
pub mod Utils;
