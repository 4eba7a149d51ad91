//! Command implementations.
//!
//! Every command reports through `tracing`; the console's own notifications
//! are logged by the client as they happen.

pub mod pricing;
pub mod shipments;
pub mod users;

use std::path::PathBuf;

use moogship_client::{ApiError, ConfigError, MutationError, SelectionError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{}", .0.message())]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Failed to access {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Shipment {0} not found")]
    NotFound(i64),
}
