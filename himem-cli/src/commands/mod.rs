//! CLI command implementations.

pub mod common;
pub mod config;
pub mod hint;
pub mod plan;
pub mod snapshot;
pub mod stats;
pub mod tile;
