//! trunkd - link aggregation control daemon
//!
//! Hosts a [`trunk_engine::TrunkRegistry`] behind a line-oriented control
//! surface, with simulated interfaces declared in a JSON configuration
//! file.

mod config;
mod control;

pub use config::{DaemonConfig, InterfaceConfig, TrunkDef};
pub use control::{ControlHandler, ControlResponse};
