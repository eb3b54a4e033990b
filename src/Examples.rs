/// benchmark-style runs of the equation solve handler
pub mod eqn_solve_examples;
