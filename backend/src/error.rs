//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization error
    #[error("Access denied: {0}")]
    Authorization(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict error (e.g., duplicate taxonomy name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error (missing field, duplicate version)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload into a cell that is marked not applicable
    #[error("Not applicable: {0}")]
    NotApplicable(String),

    /// Uploaded filename does not follow the naming convention
    #[error("Filename mismatch: expected '{expected}', got '{actual}'")]
    FilenameMismatch { expected: String, actual: String },

    /// Bulk download with no matching artifacts
    #[error("Nothing to download: {0}")]
    NothingToDownload(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Archive packaging error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

/// Returns true when a database error is a unique-constraint violation on the
/// named constraint or index.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MIGRATION_ERROR"),
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotApplicable(_) => (StatusCode::BAD_REQUEST, "NOT_APPLICABLE"),
            AppError::FilenameMismatch { .. } => (StatusCode::BAD_REQUEST, "FILENAME_MISMATCH"),
            AppError::NothingToDownload(_) => (StatusCode::NOT_FOUND, "NOTHING_TO_DOWNLOAD"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            AppError::Archive(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ARCHIVE_ERROR"),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            AppError::AddrParse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ADDR_PARSE_ERROR"),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "JSON_ERROR"),
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "JWT_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Human-readable message returned to the caller.
    fn public_message(&self) -> String {
        match self {
            AppError::Config(msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg)
            | AppError::NotApplicable(msg)
            | AppError::NothingToDownload(msg)
            | AppError::Storage(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::FilenameMismatch { expected, actual } => format!(
                "Filename does not match the naming convention. Expected '{}', got '{}'",
                expected, actual
            ),
            AppError::Migration(_) => "Database migration failed".to_string(),
            AppError::Archive(e) => format!("Archive packaging failed: {}", e),
            AppError::Io(e) => format!("IO operation failed: {}", e),
            AppError::AddrParse(_) => "Invalid address".to_string(),
            AppError::Json(_) => "Invalid JSON".to_string(),
            AppError::Jwt(_) => "Invalid token".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.public_message();

        if status.is_server_error() {
            tracing::error!(error = %self, code = code, "Request error");
        } else {
            tracing::debug!(error = %self, code = code, "Request rejected");
        }

        let body = match &self {
            AppError::FilenameMismatch { expected, actual } => json!({
                "code": code,
                "message": message,
                "expected": expected,
                "actual": actual,
            }),
            _ => json!({
                "code": code,
                "message": message,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_filename_mismatch_carries_both_names() {
        let resp = AppError::FilenameMismatch {
            expected: "Enterprise_brochure_v1.0".to_string(),
            actual: "brochure".to_string(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "FILENAME_MISMATCH");
        assert_eq!(body["expected"], "Enterprise_brochure_v1.0");
        assert_eq!(body["actual"], "brochure");
    }

    #[tokio::test]
    async fn test_not_applicable_is_distinct_from_validation() {
        let resp = AppError::NotApplicable("cell disabled".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "NOT_APPLICABLE");
        assert_eq!(body["message"], "cell disabled");
    }

    #[tokio::test]
    async fn test_database_error_surfaces_underlying_message() {
        let resp = AppError::Database("connection reset".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "connection reset");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Authorization("x".into()).status_and_code().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NothingToDownload("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_and_code().0,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_row_not_found_is_not_unique_violation() {
        assert!(!is_unique_violation(
            &sqlx::Error::RowNotFound,
            "idx_artifacts_cell_version"
        ));
    }
}
