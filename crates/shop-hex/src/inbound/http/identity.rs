use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shop_types::domain::cart::Identity;
use uuid::Uuid;

use crate::errors::AppError;

/// Set by the upstream auth layer for signed-in customers.
pub const CUSTOMER_HEADER: &str = "x-customer-id";
/// Opaque anonymous session token; echoed back when a new one is minted.
pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Debug, Clone)]
pub struct RequestIdentity(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for RequestIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(raw) = header(CUSTOMER_HEADER) {
            let customer_id = Uuid::parse_str(&raw)
                .map_err(|e| AppError::BadRequest(format!("{CUSTOMER_HEADER}: {e}")))?;
            return Ok(Self(Identity::Authenticated { customer_id }));
        }
        Ok(Self(Identity::Anonymous {
            session_token: header(SESSION_HEADER),
        }))
    }
}
