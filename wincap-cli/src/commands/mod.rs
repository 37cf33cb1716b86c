//! CLI command implementations

mod config;
mod simulate;

pub use config::{config, ConfigArgs};
pub use simulate::{simulate, SimulateArgs};
