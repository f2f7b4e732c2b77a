//! holistic-planner-cli: command-line driver for the holistic planner.
//!
//! Loads a planner TOML and a JSON portfolio snapshot, runs the planner,
//! prints the plan, and appends an audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod report;
pub mod run;
pub mod snapshot;
