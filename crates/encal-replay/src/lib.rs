//! Batch replay job generation and supervision
//!
//! Builds newline-delimited command lists for the external analyzer
//! executable and hands them to the external `parallel` utility, which
//! owns all concurrency, scheduling and process management. This crate
//! implements none of that itself.

pub mod joblist;
pub mod runner;

pub use joblist::*;
pub use runner::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty job batch: {0}")]
    EmptyBatch(String),

    #[error("`{command}` exited with {status}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
    },
}

pub type ReplayResult<T> = Result<T, ReplayError>;
