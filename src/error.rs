//! Application error type and its rendering into the JSON envelope.
//!
//! Every handler returns `Result<HttpResponse, AppError>`; actix turns the
//! error side into `{"success": false, "message": ..., "errors"?: {...}}`.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::{Map, Value, json};
use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;

/// MySQL error numbers for duplicate unique keys (ER_DUP_ENTRY, ER_DUP_ENTRY_WITH_KEY_NAME).
/// Foreign-key failures share SQLSTATE 23000, so the number is what tells them apart.
const DUPLICATE_ENTRY: [u16; 2] = [1062, 1586];

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Map<String, Value>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors: Map::new(),
        }
    }

    pub fn permission_denied() -> Self {
        AppError::Forbidden("Permission denied.".to_string())
    }

    /// Maps a duplicate-key failure to `Conflict`, passing every other error through.
    pub fn conflict_on_duplicate(err: sqlx::Error, message: &str) -> Self {
        if is_unique_violation(&err) {
            AppError::Conflict(message.to_string())
        } else {
            AppError::Database(err)
        }
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|e| is_duplicate_entry(e.number())),
        _ => false,
    }
}

fn is_duplicate_entry(number: u16) -> bool {
    DUPLICATE_ENTRY.contains(&number)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal Server Error".to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "success": false,
            "message": message,
        });

        if let AppError::Validation { errors, .. } = self {
            if !errors.is_empty() {
                body["errors"] = Value::Object(errors.clone());
            }
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn forbidden_renders_envelope() {
        let (status, body) = body_of(AppError::permission_denied()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Permission denied.");
        assert!(body.get("errors").is_none());
    }

    #[actix_web::test]
    async fn validation_carries_field_errors() {
        let mut errors = Map::new();
        errors.insert("name".into(), json!(["This field may not be blank."]));
        let (status, body) = body_of(AppError::Validation {
            message: "Validation error".into(),
            errors,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["name"][0], "This field may not be blank.");
    }

    #[actix_web::test]
    async fn conflict_and_not_found_statuses() {
        let (status, _) = body_of(AppError::Conflict("Already checked in today.".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = body_of(AppError::NotFound("Project not found.".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Project not found.");
    }

    #[actix_web::test]
    async fn database_errors_do_not_leak_details() {
        let (status, body) = body_of(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal Server Error");
    }

    #[test]
    fn only_duplicate_entry_numbers_count_as_unique_violations() {
        assert!(is_duplicate_entry(1062));
        assert!(is_duplicate_entry(1586));
        // foreign key failures on insert and delete
        assert!(!is_duplicate_entry(1452));
        assert!(!is_duplicate_entry(1451));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(matches!(
            AppError::conflict_on_duplicate(sqlx::Error::RowNotFound, "dup"),
            AppError::Database(_)
        ));
    }
}
