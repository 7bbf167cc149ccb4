//! Error types for workorder.

use std::path::PathBuf;
use std::sync::Arc;

/// Top-level error type for spool operations, which touch both the order
/// files and the index.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Order document errors.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Malformed order document: {0}")]
    Malformed(String),

    #[error("Invalid order status: {0:?}")]
    InvalidStatus(String),

    #[error("Failed to persist order to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Order not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed error returned by a job action.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A captured action error, shared by every waiter on the job.
pub type SharedActionError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure recorded for an action that panicked instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("action panicked: {0}")]
pub struct ActionPanicked(pub String);

/// Job-related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    #[error("Job {name} already started")]
    AlreadyStarted { name: String },

    #[error("Job {name} failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: SharedActionError,
    },
}

impl JobError {
    /// The action's original error, if this is a failure.
    pub fn action_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Failed { source, .. } => Some(source.as_ref()),
            Self::AlreadyStarted { .. } => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
