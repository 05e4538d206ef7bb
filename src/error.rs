//! Error types for NutriGenie.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generation::GenerationPhase;

/// Top-level error type for the onboarding and generation core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

impl Error {
    /// Classify this error into the user-facing failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Api(e) => e.kind(),
            Self::Validation(_) => FailureKind::Validation,
            Self::Generation(GenerationError::Timeout { .. }) => FailureKind::Timeout,
            Self::Config(_) | Self::Database(_) | Self::Generation(_) => {
                FailureKind::BackendUnavailable
            }
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Local persistence errors.
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

/// Errors from the external collaborators (profile store, plan backend,
/// registration endpoint, macro backend).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated: {reason}")]
    Auth { reason: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map to the failure taxonomy shown to the user.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Auth { .. } => FailureKind::Auth,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Rejected { .. } => FailureKind::Validation,
            Self::Unavailable { .. } | Self::Decode(_) => FailureKind::BackendUnavailable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: u16, resource: &str, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth { reason: body },
            404 => Self::NotFound {
                resource: resource.to_string(),
            },
            400..=499 => Self::Rejected {
                status,
                message: body,
            },
            _ => Self::Unavailable {
                reason: format!("{resource} returned {status}: {body}"),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}

/// Malformed profile or request input. Surfaced inline, never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid postal code: {0:?}")]
    InvalidPostalCode(String),

    #[error("Weekly budget must be at least {min}, got {value}")]
    BudgetTooLow { value: String, min: String },

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Orchestration failures that are not plain collaborator errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Backend returned an invalid plan id: {0}")]
    InvalidPlanId(String),

    #[error("Job cannot move from {from} to {to}")]
    InvalidTransition {
        from: GenerationPhase,
        to: GenerationPhase,
    },
}

/// User-facing failure classes. Recorded on failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No or expired session; send the user to login.
    Auth,
    /// Malformed input; fix and resubmit.
    Validation,
    /// Profile or plan absent.
    NotFound,
    /// Network or 5xx; retryable by user action.
    BackendUnavailable,
    /// Polling exceeded its budget; retry by resubmitting.
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
