//! Error types for mojify

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Action rejected because of the target's lifecycle state (e.g. a closed prompt)
    #[error("{0}")]
    StateConflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArenaError {
    /// Stable machine-readable code surfaced to API clients
    pub fn code(&self) -> &'static str {
        match self {
            ArenaError::NotFound(_) => "NOT_FOUND",
            ArenaError::Conflict(_) => "CONFLICT",
            ArenaError::StateConflict(_) => "STATE_CONFLICT",
            ArenaError::Unauthorized(_) => "UNAUTHORIZED",
            ArenaError::Validation(_) => "VALIDATION_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// True for errors caused by the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ArenaError::NotFound(_)
                | ArenaError::Conflict(_)
                | ArenaError::StateConflict(_)
                | ArenaError::Unauthorized(_)
                | ArenaError::Validation(_)
        )
    }
}

/// True when a rusqlite error is a UNIQUE / constraint violation
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
