//! Engine error types

use thiserror::Error;

/// Failures surfaced by host collaborators during effect application.
///
/// Rule-level problems (parse failures, unknown variables) are not errors
/// here; the engine records them as skip diagnostics and action conflicts
/// become `Error`-severity issues.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The notification collaborator rejected a dispatch
    #[error("notification dispatch failed: {0}")]
    Dispatch(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
