//! One worker per MPI process. Collectives map onto the MPI ones over `MPI_COMM_WORLD`;
//! MPI errors abort the job, so the `Result`s returned here are always `Ok`.

use super::comm::{CommError, Communicator};
use mpi::Count;
use mpi::collective::SystemOperation;
use mpi::datatype::PartitionMut;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives};

pub struct MpiComm {
    world: SimpleCommunicator,
    // finalizes MPI when dropped, so it goes after `world`
    _universe: Universe,
}

impl MpiComm {
    /// initializes MPI; `None` if this process already did
    pub fn init() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        Some(Self {
            world,
            _universe: universe,
        })
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.world.barrier();
        Ok(())
    }

    fn all_gather(&self, local: &[f64]) -> Result<Vec<f64>, CommError> {
        let mut counts = vec![0 as Count; self.size()];
        self.world
            .all_gather_into(&(local.len() as Count), &mut counts[..]);
        let displs: Vec<Count> = counts
            .iter()
            .scan(0, |offset, &c| {
                let d = *offset;
                *offset += c;
                Some(d)
            })
            .collect();
        let total: Count = counts.iter().sum();
        let mut gathered = vec![0.0; total as usize];
        {
            let mut partition = PartitionMut::new(&mut gathered[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        Ok(gathered)
    }

    fn all_reduce_sum(&self, value: f64) -> Result<f64, CommError> {
        let mut sum = 0.0;
        self.world
            .all_reduce_into(&value, &mut sum, SystemOperation::sum());
        Ok(sum)
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, CommError> {
        let mut max = 0.0;
        self.world
            .all_reduce_into(&value, &mut max, SystemOperation::max());
        Ok(max)
    }

    fn abort(&self) {
        self.world.abort(1)
    }
}
