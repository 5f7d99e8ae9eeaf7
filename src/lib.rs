pub mod cli;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod load_config;
pub mod progress;
pub mod scan;
pub mod upload;

pub use cli::{run, Cli, Commands};
