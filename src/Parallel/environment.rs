//! # Communication lifetime
//!
//! A `ParallelEnvironment` owns the communicator of one worker. Components that run
//! collectives (the equation solve handler and its solver) hold a `CommContext` borrowed
//! from it. The borrow guarantees a context never outlives its environment; the context
//! itself is released exactly once, either explicitly or on drop.

use super::comm::{CommError, Communicator, SerialComm};
use log::{debug, error};
use std::sync::atomic::{AtomicUsize, Ordering};

/// logs with `info!` on worker 0 only
#[macro_export]
macro_rules! master_info {
    ($comm:expr, $($arg:tt)+) => {
        if $comm.rank() == 0 {
            log::info!($($arg)+);
        }
    };
}

pub struct ParallelEnvironment {
    comm: Box<dyn Communicator>,
    live: AtomicUsize,
    issued: AtomicUsize,
}

impl std::fmt::Debug for ParallelEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelEnvironment")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("live_contexts", &self.live_contexts())
            .finish()
    }
}

impl ParallelEnvironment {
    pub fn new<C: Communicator + 'static>(comm: C) -> Self {
        Self {
            comm: Box::new(comm),
            live: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn serial() -> Self {
        Self::new(SerialComm)
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// acquires a new communication context
    pub fn context(&self) -> CommContext<'_> {
        let id = self.issued.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::AcqRel);
        debug!("rank {}: acquired communication context {}", self.rank(), id);
        CommContext {
            env: self,
            id,
            released: false,
        }
    }

    pub fn live_contexts(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// withdraws this worker from all further collectives of its group
    pub fn abort(&self) {
        error!("rank {}: leaving the worker group", self.rank());
        self.comm.abort();
    }
}

impl Drop for ParallelEnvironment {
    fn drop(&mut self) {
        let live = self.live_contexts();
        if live > 0 {
            error!(
                "rank {}: parallel environment torn down with {} live communication context(s)",
                self.rank(),
                live
            );
        }
    }
}

/// Communication resources of one component, tied to the lifetime of its environment
#[derive(Debug)]
pub struct CommContext<'env> {
    env: &'env ParallelEnvironment,
    id: usize,
    released: bool,
}

impl<'env> CommContext<'env> {
    pub fn comm(&self) -> &dyn Communicator {
        self.env.comm()
    }

    pub fn rank(&self) -> usize {
        self.env.rank()
    }

    pub fn size(&self) -> usize {
        self.env.size()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) -> Result<(), CommError> {
        if self.released {
            return Err(CommError::DoubleRelease(self.id));
        }
        self.released = true;
        self.env.live.fetch_sub(1, Ordering::AcqRel);
        debug!("rank {}: released communication context {}", self.rank(), self.id);
        Ok(())
    }
}

impl Drop for CommContext<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                error!("rank {}: {}", self.rank(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parallel::comm::ThreadComm;

    #[test]
    fn test_context_counting() {
        let env = ParallelEnvironment::serial();
        let mut a = env.context();
        {
            let _b = env.context();
            assert_eq!(env.live_contexts(), 2);
        }
        assert_eq!(env.live_contexts(), 1);
        a.release().unwrap();
        assert!(a.is_released());
        assert_eq!(env.live_contexts(), 0);
        drop(a);
        assert_eq!(env.live_contexts(), 0);
    }

    #[test]
    fn test_double_release_is_reported() {
        let env = ParallelEnvironment::serial();
        let mut ctx = env.context();
        let id = ctx.id();
        ctx.release().unwrap();
        assert_eq!(ctx.release().unwrap_err(), CommError::DoubleRelease(id));
        assert_eq!(env.live_contexts(), 0);
    }

    #[test]
    fn test_environment_over_thread_comm() {
        let mut group = ThreadComm::group(1);
        let env = ParallelEnvironment::new(group.remove(0));
        let ctx = env.context();
        assert_eq!((ctx.rank(), ctx.size()), (0, 1));
        assert_eq!(ctx.comm().all_reduce_max(4.0).unwrap(), 4.0);
        master_info!(ctx, "rank {} of {}", ctx.rank(), ctx.size());
    }
}
