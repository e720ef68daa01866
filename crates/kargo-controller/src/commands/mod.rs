//! CLI commands

pub mod lint;
pub mod run;
