use GhostFlow::Utils::logger::init_logger;
use log::LevelFilter;

const N: usize = 129;

#[cfg(not(feature = "mpi"))]
pub fn main() {
    use GhostFlow::Examples::eqn_solve_examples::eqn_solve_examples;

    init_logger(LevelFilter::Info);
    // number of in-process workers, first CLI argument
    let workers: usize = std::env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(2);
    for task in 0..3 {
        if eqn_solve_examples(task, N, workers).is_err() {
            std::process::exit(1);
        }
    }
}

/// one worker per MPI process: `mpirun -n <workers> GhostFlow`
#[cfg(feature = "mpi")]
pub fn main() {
    use GhostFlow::Examples::eqn_solve_examples::eqn_solve_examples_mpi;
    use GhostFlow::Parallel::environment::ParallelEnvironment;
    use GhostFlow::Parallel::mpi_comm::MpiComm;

    init_logger(LevelFilter::Info);
    let Some(comm) = MpiComm::init() else {
        log::error!("MPI was already initialized");
        std::process::exit(1);
    };
    let env = ParallelEnvironment::new(comm);
    for task in 0..3 {
        if eqn_solve_examples_mpi(&env, task, N).is_err() {
            std::process::exit(1);
        }
    }
}
