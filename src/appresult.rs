use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// The caller-visible error taxonomy every operation reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    SelfReference,
    Conflict,
    Unauthenticated,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no {0} found")]
    NotFound(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("you are trying to connect with your own account")]
    SelfReference,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("storage unavailable")]
    StorageUnavailable(#[source] sqlx::Error),

    #[error("storage constraint violated")]
    ConstraintViolation(#[source] sqlx::Error),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::SelfReference => ErrorKind::SelfReference,
            AppError::Conflict(_) | AppError::ConstraintViolation(_) => ErrorKind::Conflict,
            AppError::Unauthenticated => ErrorKind::Unauthenticated,
            AppError::StorageUnavailable(_)
            | AppError::MalformedRecord(_)
            | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidArgument(_) | AppError::SelfReference => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Conflict(_) | AppError::ConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MalformedRecord(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to the caller. Server-side faults never expose their source.
    fn public_message(&self) -> String {
        match self {
            AppError::StorageUnavailable(_) => "Service temporarily unavailable.".to_owned(),
            AppError::ConstraintViolation(_) => "Request conflicts with existing data.".to_owned(),
            AppError::MalformedRecord(_) | AppError::Internal(_) => {
                "Something went wrong!".to_owned()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (
            status,
            Json(json!({
                "error": {
                    "message": self.public_message(),
                    "status": status.as_u16().to_string(),
                }
            })),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let violates_constraint = matches!(
            &err,
            sqlx::Error::Database(db)
                if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation()
        );
        if violates_constraint {
            return AppError::ConstraintViolation(err);
        }

        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::StorageUnavailable(err)
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_) => AppError::MalformedRecord(err.to_string()),
            other => AppError::Internal(anyhow::Error::from(other)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

/// Parses an id handed to us by the caller.
pub fn parse_id(field: &str, raw: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|_| AppError::InvalidArgument(format!("invalid {field}")))
}

/// Parses an id read back from storage.
pub(crate) fn stored_id(raw: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| AppError::MalformedRecord(format!("stored id {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_kind() {
        assert_eq!(AppError::SelfReference.kind(), ErrorKind::SelfReference);
        assert_eq!(AppError::NotFound("user").kind(), ErrorKind::NotFound);
        assert_eq!(AppError::InvalidArgument("x".into()).kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn pool_exhaustion_is_storage_unavailable() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::StorageUnavailable(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::Internal(anyhow::anyhow!("secret table name"));
        assert_eq!(err.public_message(), "Something went wrong!");
    }

    #[test]
    fn malformed_caller_id_is_invalid_argument() {
        let err = parse_id("connection_id", "not-a-uuid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
