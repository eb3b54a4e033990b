//! Collective operations the solver needs from the process topology.
//!
//! `ThreadComm::group(n)` gives `n` handles meant to be moved into `n` threads; every
//! collective must then be called by all of them, in the same order. A handle that is
//! dropped or aborted leaves the group: collectives still waiting for it, and every later
//! one, fail with `CommError::Aborted` instead of blocking.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommError {
    #[error("communication context {0} released twice")]
    DoubleRelease(usize),
    #[error("worker {rank} left the group before the collective completed")]
    Aborted { rank: usize },
    #[error("worker {rank} panicked")]
    Panicked { rank: usize },
}

pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self) -> Result<(), CommError>;
    /// concatenation of every worker's `local`, in rank order
    fn all_gather(&self, local: &[f64]) -> Result<Vec<f64>, CommError>;

    fn all_reduce_sum(&self, value: f64) -> Result<f64, CommError> {
        Ok(self.all_gather(&[value])?.iter().sum())
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, CommError> {
        Ok(self
            .all_gather(&[value])?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// tells the other workers this one takes part in no further collective
    fn abort(&self) {}
}

/// single worker; every collective is the identity
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }

    fn all_gather(&self, local: &[f64]) -> Result<Vec<f64>, CommError> {
        Ok(local.to_vec())
    }

    fn all_reduce_sum(&self, value: f64) -> Result<f64, CommError> {
        Ok(value)
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, CommError> {
        Ok(value)
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    /// first worker that left the group
    departed: Option<usize>,
}

#[derive(Debug)]
struct Exchange {
    size: usize,
    state: Mutex<BarrierState>,
    turnstile: Condvar,
    slots: Mutex<Vec<Vec<f64>>>,
}

impl Exchange {
    // a worker that panicked while holding a lock leaves plain data behind
    fn state(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Vec<f64>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until all `size` workers arrived or one of them left the group. A barrier
    /// that completed stays completed even if a worker leaves right after.
    fn wait(&self) -> Result<(), CommError> {
        let mut state = self.state();
        if let Some(rank) = state.departed {
            return Err(CommError::Aborted { rank });
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.turnstile.notify_all();
            return Ok(());
        }
        loop {
            state = self
                .turnstile
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if state.generation != generation {
                return Ok(());
            }
            if let Some(rank) = state.departed {
                return Err(CommError::Aborted { rank });
            }
        }
    }

    fn leave(&self, rank: usize) {
        let mut state = self.state();
        state.departed.get_or_insert(rank);
        self.turnstile.notify_all();
    }
}

/// one worker of a group of in-process workers sharing a barrier and exchange slots
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    exchange: Arc<Exchange>,
}

impl ThreadComm {
    /// handles for ranks `0..n`, in rank order
    pub fn group(n: usize) -> Vec<ThreadComm> {
        let n = n.max(1);
        let exchange = Arc::new(Exchange {
            size: n,
            state: Mutex::new(BarrierState::default()),
            turnstile: Condvar::new(),
            slots: Mutex::new(vec![Vec::new(); n]),
        });
        (0..n)
            .map(|rank| ThreadComm {
                rank,
                size: n,
                exchange: Arc::clone(&exchange),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.exchange.wait()
    }

    fn all_gather(&self, local: &[f64]) -> Result<Vec<f64>, CommError> {
        self.exchange.slots()[self.rank] = local.to_vec();
        self.barrier()?;
        let gathered = self.exchange.slots().concat();
        // nobody may overwrite a slot before everyone has read it
        self.barrier()?;
        Ok(gathered)
    }

    fn abort(&self) {
        self.exchange.leave(self.rank);
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        self.exchange.leave(self.rank);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_serial_comm_is_identity() {
        let c = SerialComm;
        assert_eq!(c.all_gather(&[1.0, 2.0]).unwrap(), vec![1.0, 2.0]);
        assert_eq!(c.all_reduce_sum(3.5).unwrap(), 3.5);
        assert_eq!(c.all_reduce_max(-1.0).unwrap(), -1.0);
        assert_eq!((c.rank(), c.size()), (0, 1));
        c.abort();
        assert!(c.barrier().is_ok());
    }

    #[test]
    fn test_thread_comm_collectives() {
        let group = ThreadComm::group(4);
        let results: Vec<(Vec<f64>, f64, f64)> = thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let r = comm.rank() as f64;
                        // uneven block sizes: rank r contributes r + 1 values
                        let local = vec![r; comm.rank() + 1];
                        let gathered = comm.all_gather(&local).unwrap();
                        let sum = comm.all_reduce_sum(r).unwrap();
                        let max = comm.all_reduce_max(10.0 - r).unwrap();
                        (gathered, sum, max)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let expected = vec![0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0];
        for (gathered, sum, max) in results {
            assert_eq!(gathered, expected);
            assert_eq!(sum, 6.0);
            assert_eq!(max, 10.0);
        }
    }

    #[test]
    fn test_group_of_zero_is_one_worker() {
        let group = ThreadComm::group(0);
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].all_reduce_sum(2.0).unwrap(), 2.0);
    }

    #[test]
    fn test_departed_worker_fails_collectives() {
        let results: Vec<Result<f64, CommError>> = thread::scope(|s| {
            let handles: Vec<_> = ThreadComm::group(3)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        if comm.rank() == 1 {
                            // leaves without taking part
                            return Ok(0.0);
                        }
                        comm.all_reduce_sum(1.0)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], Err(CommError::Aborted { rank: 1 }));
        assert_eq!(results[2], Err(CommError::Aborted { rank: 1 }));
    }

    #[test]
    fn test_abort_and_panic_release_waiting_workers() {
        let group = ThreadComm::group(2);
        let results: Vec<Result<(), CommError>> = thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        if comm.rank() == 0 {
                            comm.abort();
                            Ok(())
                        } else {
                            comm.barrier()
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[1], Err(CommError::Aborted { rank: 0 }));

        let mut group = ThreadComm::group(2);
        let survivor = group.pop().unwrap();
        let panicked = group.pop().unwrap();
        let outcome = thread::scope(|s| {
            let waiting = s.spawn(move || survivor.barrier());
            let failing = s.spawn(move || {
                let _comm = panicked;
                panic!("worker failure");
            });
            assert!(failing.join().is_err());
            waiting.join().unwrap()
        });
        assert_eq!(outcome, Err(CommError::Aborted { rank: 0 }));
    }
}
