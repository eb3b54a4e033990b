/// communicators: one worker, or a group of in-process workers
pub mod comm;
/// environment and per-handler communication contexts
pub mod environment;
/// communicator over an MPI world
#[cfg(feature = "mpi")]
pub mod mpi_comm;
