use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use healthpulse_security::verify_token;

use crate::error::ApiError;
use crate::state::SharedState;

/// Extractor yielding the authenticated user's id from the bearer token.
/// The pipeline trusts this id completely; body-supplied ids are not
/// accepted anywhere.
pub struct AuthUser(pub i64);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let claims = verify_token(token, &state.jwt_secret)?;
        Ok(AuthUser(claims.sub))
    }
}
