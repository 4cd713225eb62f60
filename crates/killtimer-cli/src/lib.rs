//! Shared pieces of the `killtimer` and `killtimer-stats` binaries.

pub mod commands;
pub mod logging;
pub mod progress;
