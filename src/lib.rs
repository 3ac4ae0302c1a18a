//! Football sports-data ingestion.
//!
//! Pulls fixtures, competitions, teams, squads and statistics from
//! football-data.org and api-sports.io, reconciles them into one relational
//! model in PostgreSQL, and serves a small match browser plus an AI matchup
//! analysis over HTTP.

pub mod analysis;
pub mod batch;
pub mod browse;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod server;
pub mod stats;
pub mod store;
pub mod upsert;
pub mod upstream;

pub use error::{IngestError, Result};
