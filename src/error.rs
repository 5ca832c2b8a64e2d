//! Application error types

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No data available: {0}")]
    FetchUnavailable(String),

    #[error("Alignment error in batch {batch}: {message}")]
    Alignment { batch: usize, message: String },

    #[error("Write failure: {0}")]
    WriteFailure(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code used in logs and run summaries
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::DuckDb(_) => "DUCKDB_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::FetchUnavailable(_) => "FETCH_UNAVAILABLE",
            AppError::Alignment { .. } => "ALIGNMENT_ERROR",
            AppError::WriteFailure(_) => "WRITE_FAILURE",
            AppError::Provider(_) => "PROVIDER_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error only affects a single ticker.
    ///
    /// Store and configuration errors abort the whole run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::FetchUnavailable(_)
                | AppError::Alignment { .. }
                | AppError::Http(_)
                | AppError::Provider(_)
                | AppError::Validation(_)
                | AppError::NotFound(_)
                | AppError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
