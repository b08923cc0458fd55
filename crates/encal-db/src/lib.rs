//! Database access layer for the calibration MySQL schema
//!
//! Works against the experiment's existing schema - NO migrations.
//! Assumes the `graphs`, `graph_points`, `run` and `energy_calibration`
//! tables already exist and match the production layout. The `run` and
//! `energy_calibration` tables are read-only to this crate.

pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use schema::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid point data: {0}")]
    ValidationError(String),

    #[error("Record not found")]
    NotFound,
}

pub type DbResult<T> = Result<T, DbError>;
