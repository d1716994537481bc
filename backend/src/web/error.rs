use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;
use tracing::error;

use crate::services::activation::ActivationError;
use crate::services::client_identity::IdentityError;
use crate::services::grant_manager::GrantError;
use crate::services::voucher_manager::VoucherError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Too many requests: {message}")]
    TooManyRequests {
        message: String,
        retry_after_seconds: Option<u64>,
    },
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn invalid_router_credentials() -> Self {
        AppError::Unauthorized("Invalid router credentials".to_string())
    }

    pub fn rate_limited() -> Self {
        AppError::TooManyRequests {
            message: "Rate limit exceeded".to_string(),
            retry_after_seconds: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TooManyRequests {
                message,
                retry_after_seconds,
            } => {
                retry_after = retry_after_seconds;
                (StatusCode::TOO_MANY_REQUESTS, message)
            }
            AppError::DatabaseError(msg) => {
                error!(error = %msg, "Database error while handling request.");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
            AppError::ServiceUnavailable(msg) => {
                error!(error = %msg, "Storage unavailable while handling request.");
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                error!(error = %msg, "Internal error while handling request.");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };

        let body = match retry_after {
            Some(seconds) => serde_json::json!({
                "ok": false,
                "error": error_message,
                "retryAfterSeconds": seconds,
            }),
            None => serde_json::json!({ "ok": false, "error": error_message }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => AppError::ServiceUnavailable(err.to_string()),
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(format!("JSON serialization/deserialization error: {err}"))
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<GrantError> for AppError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::NotFound(msg) => AppError::NotFound(msg.to_string()),
            GrantError::NoTimeLeft => AppError::InvalidInput(err.to_string()),
            GrantError::Contended => AppError::Conflict(err.to_string()),
            GrantError::Db(db_err) => db_err.into(),
        }
    }
}

impl From<ActivationError> for AppError {
    fn from(err: ActivationError) -> Self {
        match err {
            ActivationError::MissingFields => AppError::InvalidInput(err.to_string()),
            ActivationError::InvalidBindCode => AppError::Unauthorized(err.to_string()),
            ActivationError::LicenseNotFound => AppError::NotFound(err.to_string()),
            ActivationError::LicenseInactive
            | ActivationError::LicenseExpired
            | ActivationError::LicenseMismatch
            | ActivationError::NoSeatsAvailable => AppError::Forbidden(err.to_string()),
            ActivationError::Cooldown { retry_after_seconds } => AppError::TooManyRequests {
                message: err.to_string(),
                retry_after_seconds: Some(retry_after_seconds),
            },
            ActivationError::Db(db_err) => db_err.into(),
        }
    }
}

impl From<VoucherError> for AppError {
    fn from(err: VoucherError) -> Self {
        match err {
            VoucherError::MissingCode | VoucherError::AlreadyRedeemed | VoucherError::Expired => {
                AppError::InvalidInput(err.to_string())
            }
            VoucherError::NotFound => AppError::NotFound(err.to_string()),
            VoucherError::CodeSpaceExhausted => AppError::InternalServerError(err.to_string()),
            VoucherError::Db(db_err) => db_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_contended_grant_is_a_conflict() {
        let response = AppError::from(GrantError::Contended).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_of(response).await,
            serde_json::json!({ "ok": false, "error": "Grant was modified concurrently, please retry" })
        );
    }

    #[tokio::test]
    async fn test_cooldown_sets_retry_after() {
        let response = AppError::from(ActivationError::Cooldown { retry_after_seconds: 12 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
        assert_eq!(body_of(response).await["retryAfterSeconds"], 12);
    }
}
