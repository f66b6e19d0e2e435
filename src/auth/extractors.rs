use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::claims::Principal;
use crate::{error::AppError, state::AppState};

/// Extracts and validates the bearer token, yielding the caller's principal.
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthenticated("Invalid auth scheme".into()))?;

        let principal = state.auth.token_grant(token.trim()).await?;
        Ok(AuthUser(principal))
    }
}
