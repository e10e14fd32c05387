use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shop_types::domain::cart::CartError;
use shop_types::domain::customer::AddressError;
use shop_types::domain::order::OrderError;
use shop_types::domain::payment::PaymentError;
use shop_types::ports::RepoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::CouponExhausted(code) => {
                AppError::Conflict(format!("coupon {code} has no redemptions left"))
            }
            other => AppError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::LineNotFound(_) => AppError::NotFound(e.to_string()),
            CartError::InvalidQuantity | CartError::VariantMismatch { .. } => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::EmptyCart | OrderError::InvalidEmail => AppError::BadRequest(e.to_string()),
            OrderError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotRefundable(_) | PaymentError::ExceedsBalance { .. } => {
                AppError::Conflict(e.to_string())
            }
            PaymentError::NegativeAmount | PaymentError::EmptyRefund => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<AddressError> for AppError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::NotFound(_) => AppError::NotFound(e.to_string()),
            AddressError::MissingFields(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };

        let body = serde_json::to_string(&ErrorBody {
            success: false,
            message: msg,
        })
        .unwrap_or_else(|_| "{\"success\":false,\"message\":\"internal serialization\"}".into());
        (code, [("content-type", "application/json")], body).into_response()
    }
}
