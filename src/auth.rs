use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the Supabase-issued access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID, also the key into `public.profiles`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// Resolved identity of an authenticated request. Roles are deliberately not carried
/// here; they are read through the role store so a revocation is seen on the next
/// evaluation instead of living as long as the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Session
///
/// The optional identity used by routes that must also serve anonymous visitors
/// (the gate evaluation endpoint). Never rejects: any authentication failure yields an
/// anonymous session, which every gate treats as "no access".
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<AuthUser>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// Resolves the caller's identity from the request headers.
///
/// 1. Local bypass: in `Env::Local` a known user id in `x-user-id` is accepted.
/// 2. Bearer token: decoded and validated against the Supabase secret.
/// 3. Profile lookup: the user must still exist.
async fn resolve_user(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<AuthUser, StatusCode> {
    if config.env == Env::Local {
        if let Some(user_id) = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|id_str| Uuid::parse_str(id_str).ok())
        {
            if let Some(user) = repo.get_user(user_id).await {
                return Ok(AuthUser {
                    id: user.id,
                    email: user.email,
                });
            }
        }
    }

    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    // Supabase sets `aud = "authenticated"`; the signature and expiry are what matter here.
    validation.validate_aud = false;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("rejected expired access token"),
            other => tracing::debug!("rejected access token: {:?}", other),
        }
        StatusCode::UNAUTHORIZED
    })?;

    let user = repo
        .get_user(token_data.claims.sub)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(AuthUser {
        id: user.id,
        email: user.email,
    })
}

/// AuthUser Extractor
///
/// Rejects with 401 when the request carries no valid identity.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        resolve_user(parts, &repo, &config).await
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        Ok(Session {
            user: resolve_user(parts, &repo, &config).await.ok(),
        })
    }
}
