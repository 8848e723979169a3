pub mod config;
pub mod questions;
pub mod store;
pub mod types;
