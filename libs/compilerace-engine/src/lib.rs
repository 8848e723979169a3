pub mod clock;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod judge0;
pub mod race;
pub mod runner;
pub mod source;

#[cfg(test)]
mod testing;
