//! Batch jobs behind the command-line subcommands.
//!
//! Single-target jobs return `Result<BatchReport>` and fail when the
//! provider returns nothing at the top level; multi-target jobs always
//! return a report with the failed targets counted in it.

pub mod competitions;
pub mod connection;
pub mod import;
pub mod leagues;
pub mod matches;
pub mod stats;
pub mod teams;
