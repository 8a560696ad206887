use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Container for the authenticated user's id stored in request extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Claims expected inside the JWT for authenticated users.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's UUID as a string.
    pub sub: String,
    pub exp: usize,
}

/// Validates an HS256 bearer token and returns the user it names.
pub fn authenticate(authorization: Option<&str>, secret: &str) -> Result<CurrentUser, AppError> {
    let token = authorization
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let claims = decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        })?
        .claims;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(CurrentUser(user_id))
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the request is forwarded with a [`CurrentUser`] extension;
/// on failure a `401` is returned.
pub async fn jwt_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(header, &state.config.jwt_secret) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}
