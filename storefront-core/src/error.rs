use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors raised by the order, invoicing and payment core.
///
/// Store and workflow failures propagate as these typed variants; the HTTP
/// layer turns them into responses through [`IntoResponse`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("insufficient stock for product '{product}' (id {product_id}): requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        product: String,
        requested: i32,
        available: i32,
    },

    #[error("product '{product}' (id {product_id}) is not active")]
    ProductInactive { product_id: i64, product: String },

    #[error("invoice request {request_id} is paid and can no longer change status")]
    PaidRequestImmutable { request_id: i64 },

    #[error("status id {status_id} is outside the allowed range {min}..={max}")]
    StatusOutOfRange { status_id: i32, min: i32, max: i32 },

    #[error("cannot {action} {entity} {id} while it is {current}")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        action: &'static str,
        current: String,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code, also sent as `X-Error-Code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "not_found",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::ProductInactive { .. } => "product_inactive",
            AppError::PaidRequestImmutable { .. } => "paid_request_immutable",
            AppError::StatusOutOfRange { .. } => "status_out_of_range",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized => "unauthorized",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ProductInactive { .. }
            | AppError::StatusOutOfRange { .. }
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PaidRequestImmutable { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut resp = (status, Json(ErrorBody { code, message })).into_response();
        resp.headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_everything() {
        let err = AppError::InsufficientStock {
            product_id: 7,
            product: "Espresso beans".to_string(),
            requested: 3,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("Espresso beans"));
        assert!(msg.contains("requested 3"));
        assert!(msg.contains("available 2"));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::not_found("order", 1).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::PaidRequestImmutable { request_id: 1 }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::StatusOutOfRange { status_id: 9, min: 1, max: 3 }.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_response_carries_error_code_header() {
        let resp = AppError::not_found("invoice request", 12).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "not_found");
    }
}
