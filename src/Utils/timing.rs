//! Wall-clock timing of collective operations.

use crate::Parallel::comm::{CommError, Communicator};
use std::time::{Duration, Instant};

/// Collective: elapsed seconds between `start` and `end`, maximised over all workers, so
/// the slowest worker defines the time of the operation.
pub fn gather_time(
    comm: &dyn Communicator,
    start: Instant,
    end: Instant,
) -> Result<f64, CommError> {
    let elapsed = end.saturating_duration_since(start).as_secs_f64();
    comm.all_reduce_max(elapsed)
}

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// collective: see [`gather_time`]
    pub fn gather(&self, comm: &dyn Communicator) -> Result<f64, CommError> {
        gather_time(comm, self.start, Instant::now())
    }
}
