//! Learner identity. Accounts and login live in an external service; this
//! crate only verifies the HS256 access tokens it issues.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::response::AppError;
use crate::state::AppState;

pub const LEARNER_TOKEN_TYPE: &str = "learner";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub jti: String,
}

/// Issues a learner token. Used by tooling and tests; production tokens come
/// from the identity service with the same secret.
pub fn sign_learner_token(
    learner_id: &str,
    secret: &str,
    expires_in_hours: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: learner_id.to_string(),
        token_type: LEARNER_TOKEN_TYPE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(expires_in_hours as i64)).timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(&format!("jwt sign failed: {e}")))
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.algorithms = vec![Algorithm::HS256];

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token"))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth_header| auth_header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// SSE clients (EventSource) cannot set headers, so `?token=` is accepted too.
fn extract_query_token(parts: &Parts) -> Option<String> {
    parts.uri.query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .map(str::to_string)
            .filter(|token| !token.is_empty())
    })
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub learner_id: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = extract_bearer_token(&parts.headers)
            .or_else(|| extract_query_token(parts))
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;
        let claims = verify_jwt(&token, &app_state.config().jwt_secret)?;

        if claims.token_type != LEARNER_TOKEN_TYPE {
            return Err(AppError::unauthorized("Invalid token type"));
        }
        // learner ids are key segments in the store
        if claims.sub.is_empty() || claims.sub.contains(':') {
            return Err(AppError::unauthorized("Invalid token subject"));
        }

        Ok(AuthUser {
            learner_id: claims.sub,
        })
    }
}
