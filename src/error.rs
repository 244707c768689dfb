//! Error types for the profile service.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Database-related errors, shared by the scalar and document stores.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error("Pool error: {0}")]
    PoolRuntime(#[from] deadpool_postgres::PoolError),

    #[cfg(feature = "libsql")]
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which oracle call an [`OracleError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStage {
    Extract,
    Decide,
}

impl std::fmt::Display for OracleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleStage::Extract => write!(f, "extract"),
            OracleStage::Decide => write!(f, "decide"),
        }
    }
}

/// Failures of a single oracle stage. These abort the stage, never the process.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("{stage} call failed: {source}")]
    Call {
        stage: OracleStage,
        #[source]
        source: LlmError,
    },

    #[error("{stage} response is not valid JSON: {reason}")]
    Unparseable { stage: OracleStage, reason: String },

    #[error("{stage} response has the wrong shape: {reason}")]
    Shape { stage: OracleStage, reason: String },
}

impl OracleError {
    pub fn stage(&self) -> OracleStage {
        match self {
            OracleError::Call { stage, .. }
            | OracleError::Unparseable { stage, .. }
            | OracleError::Shape { stage, .. } => *stage,
        }
    }
}

/// Bad caller input. The only error class surfaced as a rejection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("user_id is required")]
    MissingUserId,

    #[error("messages must not be empty")]
    EmptyMessages,

    #[error("invalid source '{0}', expected one of: pg, mongo, both")]
    InvalidSource(String),

    #[error("invalid evidence limit {0}, expected -1, 0 or a positive count")]
    InvalidEvidenceLimit(i64),

    #[error("unknown profile field '{0}'")]
    UnknownField(String),
}

/// Cold-start import failures. Callers log these and treat the profile as empty.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("summary request failed: {0}")]
    Request(String),

    #[error("summary endpoint returned HTTP {0}")]
    Status(u16),

    #[error("summary envelope reported failure")]
    Rejected,

    #[error("summary envelope has no data")]
    MissingData,

    #[error("summary body is malformed: {0}")]
    Malformed(String),

    #[error("seeding the profile stores failed: {0}")]
    Seed(#[from] DatabaseError),
}

/// Errors surfaced by the read-side profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
