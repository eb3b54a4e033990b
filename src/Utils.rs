/// terminal logger setup
pub mod logger;
/// timing of collective operations
pub mod timing;
