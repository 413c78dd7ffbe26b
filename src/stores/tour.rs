use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{gates::path_within, models::TourStatus};

/// TourClaims
///
/// Body of a tour token. The token lives on the client for one browser session and is
/// only honoured for the subject it was issued to and until `exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourClaims {
    /// User id, or `anonymous` for visitors without a session.
    pub sub: String,
    pub tour: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TourTokenError {
    #[error("invalid tour token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("tour token issued to {issued_to}, presented by {presented_by}")]
    SubjectMismatch {
        issued_to: String,
        presented_by: String,
    },
    #[error("token is not a tour token")]
    NotATourToken,
}

/// TourTokens
///
/// Issues and verifies signed tour tokens. `ttl` only bounds how long a leaked token stays
/// usable; it is set longer than any realistic browser session, so a tour ends through
/// navigation or explicit exit in practice.
pub struct TourTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TourTokens {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TourTokenError> {
        let iat = now.timestamp();
        let claims = TourClaims {
            sub: subject.to_string(),
            tour: true,
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// The invariant check for tour mode: signature, expiry, subject and the tour marker
    /// must all hold for the token to mean "active".
    pub fn verify(&self, token: &str, subject: &str) -> Result<TourClaims, TourTokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = decode::<TourClaims>(token, &self.decoding, &validation)?.claims;
        if !claims.tour {
            return Err(TourTokenError::NotATourToken);
        }
        if claims.sub != subject {
            return Err(TourTokenError::SubjectMismatch {
                issued_to: claims.sub,
                presented_by: subject.to_string(),
            });
        }
        Ok(claims)
    }
}

/// TourState
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourState {
    Inactive,
    Active,
}

/// Next tour state after navigating to `path`.
///
/// The onboarding marker always (re)enters the tour. Otherwise an active tour survives only
/// on paths equal to, or nested under, one of `tour_routes`.
pub fn next_state(
    current: TourState,
    from_onboarding: bool,
    path: &str,
    tour_routes: &[String],
) -> TourState {
    if from_onboarding {
        return TourState::Active;
    }
    match current {
        TourState::Active if is_tour_route(path, tour_routes) => TourState::Active,
        _ => TourState::Inactive,
    }
}

pub fn is_tour_route(path: &str, tour_routes: &[String]) -> bool {
    tour_routes.iter().any(|route| path_within(path, route))
}

/// TourMode
///
/// Tour-mode store. The only persistent state is the token held by the client; each
/// navigation reports whether the tour is still active and whether the client must
/// store a new token or clear the old one.
pub struct TourMode {
    tokens: TourTokens,
    tour_routes: Vec<String>,
}

impl TourMode {
    pub fn new(tokens: TourTokens, tour_routes: Vec<String>) -> Self {
        Self {
            tokens,
            tour_routes,
        }
    }

    pub fn on_navigation(
        &self,
        subject: &str,
        path: &str,
        from_onboarding: bool,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> TourStatus {
        if from_onboarding {
            return match self.tokens.issue(subject, now) {
                Ok(token) => {
                    tracing::info!(subject, path, "tour mode entered");
                    TourStatus {
                        active: true,
                        token: Some(token),
                        cleared: false,
                    }
                }
                Err(e) => {
                    tracing::error!("failed to issue tour token: {}", e);
                    TourStatus::default()
                }
            };
        }

        let Some(token) = token else {
            return TourStatus::default();
        };

        let current = match self.tokens.verify(token, subject) {
            Ok(_) => TourState::Active,
            Err(e) => {
                tracing::debug!(subject, "dropping tour token: {}", e);
                TourState::Inactive
            }
        };

        match next_state(current, false, path, &self.tour_routes) {
            TourState::Active => TourStatus {
                active: true,
                token: None,
                cleared: false,
            },
            TourState::Inactive => {
                if current == TourState::Active {
                    tracing::info!(subject, path, "tour mode exited by navigation");
                }
                Self::exit()
            }
        }
    }

    /// Explicit exit.
    pub fn exit() -> TourStatus {
        TourStatus {
            active: false,
            token: None,
            cleared: true,
        }
    }
}
