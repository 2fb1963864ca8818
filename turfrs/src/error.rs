//! Application-level errors.
//!
//! Wraps core errors plus the storage, serialization and network failures
//! that only exist in the app layer.

use thiserror::Error;
use turfcore::TurfError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] TurfError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Short message suitable for a transient UI banner.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Core(TurfError::Validation { .. }) => self.to_string(),
            AppError::Core(TurfError::InsufficientPoints {
                minimum_required, ..
            }) => format!("Add at least {} points", minimum_required),
            AppError::Core(TurfError::ClaimTooLarge { .. }) => {
                "Area is too large to claim, draw a smaller one".to_string()
            }
            AppError::Core(_) => "Something went wrong".to_string(),
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Encode(_)
            | AppError::Decode(_) => "Could not save your data".to_string(),
            AppError::Json(_) => "Unexpected data format".to_string(),
            AppError::Http(_) | AppError::HttpStatus { .. } => {
                "Network unavailable, try again later".to_string()
            }
            AppError::NotFound { entity, .. } => format!("{} not found", entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err: AppError = TurfError::validation("email", "not a valid address").into();
        assert_eq!(err.user_message(), "Invalid email: not a valid address");

        let err = AppError::HttpStatus {
            status: 503,
            url: "https://example.com".to_string(),
        };
        assert_eq!(err.user_message(), "Network unavailable, try again later");
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com");

        let err = AppError::not_found("Run", "run-1");
        assert_eq!(err.to_string(), "Run 'run-1' not found");
        assert_eq!(err.user_message(), "Run not found");
    }

    #[test]
    fn test_sqlite_error_converts() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(err.user_message(), "Could not save your data");
    }
}
