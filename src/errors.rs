//! Unified error types for RAB Maker.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants map onto the
//! error taxonomy callers care about: missing rows, foreign ownership, blocked
//! deletes, invalid input and storage failures.

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Input rejected before touching storage
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description of the problem
        message: String,
    },

    /// A volume, coefficient or price that is negative, zero where not allowed, or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The offending value
        amount: f64,
    },

    /// Referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name, e.g. `"template"`
        entity: &'static str,
        /// Primary key that was looked up
        id: i64,
    },

    /// Row exists but belongs to a different owner
    #[error("{entity} {id} belongs to another owner")]
    OwnershipViolation {
        /// Entity name, e.g. `"project"`
        entity: &'static str,
        /// Primary key of the foreign row
        id: i64,
    },

    /// Delete blocked because dependents still reference the row
    #[error("Cannot delete {entity} {id}: {reason}")]
    ReferentialIntegrity {
        /// Entity name, e.g. `"work category"`
        entity: &'static str,
        /// Primary key of the guarded row
        id: i64,
        /// Why the delete was refused
        reason: String,
    },

    /// Underlying storage failure; the enclosing transaction is rolled back
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system error, e.g. while reading `config.toml`
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// HTTP-equivalent status code for surfacing the error to a caller.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::OwnershipViolation { .. } => 403,
            Self::ReferentialIntegrity { .. } => 409,
            Self::Validation { .. } | Self::InvalidAmount { .. } => 422,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::EnvVar(_) => 500,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
