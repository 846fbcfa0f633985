//! Owner session handling.
//!
//! Sessions are HS256 tokens in an http-only cookie. Handlers take an
//! [`OwnerSession`] argument to require authentication; extraction fails
//! with 401 before any business logic runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use service_core::error::AppError;

use crate::config::MembershipConfig;
use crate::startup::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Claims carried in the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Owner id.
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated owner making the request.
#[derive(Debug, Clone)]
pub struct OwnerSession {
    pub owner_id: Uuid,
    pub email: String,
}

/// Sign a session token for `owner_id`, valid for the configured TTL.
pub fn issue_session_token(
    config: &MembershipConfig,
    owner_id: Uuid,
    email: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = SessionClaims {
        sub: owner_id,
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(config.auth.session_ttl_seconds)).timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.auth.jwt_secret.expose_secret().as_bytes()),
    )?;
    Ok(token)
}

/// Build the http-only session cookie around a signed token.
pub fn session_cookie(config: &MembershipConfig, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(config.auth.session_ttl_seconds))
        .build()
}

/// A cookie that immediately expires the session.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[async_trait]
impl FromRequestParts<AppState> for OwnerSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing session cookie")))?;

        let data = decode::<SessionClaims>(
            &token,
            &DecodingKey::from_secret(state.config.auth.jwt_secret.expose_secret().as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        let span = tracing::Span::current();
        span.record("owner_id", data.claims.sub.to_string().as_str());

        Ok(OwnerSession {
            owner_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}
