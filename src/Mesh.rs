/// Cartesian meshes and their partitioning
pub mod cartesian;
/// value types fields evaluate to
pub mod elem;
/// structured fields with boundary conditions
pub mod field;
pub mod field_api;
/// multi-dimensional index ranges
pub mod range;
