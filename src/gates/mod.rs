//! Pure access-gating decisions.
//!
//! Every gate is a function of an immutable [`GateContext`] and returns a [`Verdict`].
//! Gates hold no state: re-running one with the same context yields the same verdict,
//! and a capability revoked between two runs is reflected on the second.

pub mod board;
pub mod capability;
pub mod domain;
pub mod permission;
pub mod session;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::{Permission, RoleAssignment}, stores::Resolution};

/// GateContext
///
/// Snapshot of everything a gate may read for one navigation.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub path: String,
    pub hostname: Option<String>,
    pub session: Resolution<Option<Uuid>>,
    pub roles: Resolution<RoleAssignment>,
    pub board_view: Resolution<bool>,
}

impl GateContext {
    /// A fully resolved context, mostly useful in tests.
    pub fn resolved(
        path: impl Into<String>,
        user_id: Option<Uuid>,
        roles: RoleAssignment,
        board_view: bool,
    ) -> Self {
        Self {
            path: path.into(),
            hostname: None,
            session: Resolution::Ready(user_id),
            roles: Resolution::Ready(roles),
            board_view: Resolution::Ready(board_view),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

/// Redirect
///
/// Always replaces the current history entry. `from` carries the attempted path for
/// an optional return after the user gains access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Redirect {
    pub to: String,
    pub replace: bool,
    pub from: Option<String>,
}

impl Redirect {
    pub fn replace(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            replace: true,
            from: None,
        }
    }

    pub fn carrying(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Denial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
#[ts(export)]
pub enum Denial {
    /// Render nothing, or the supplied fallback.
    Silent { fallback: Option<String> },
    /// Render an explicit "Access Denied" notice listing what was missing.
    Notice { missing: Vec<Permission> },
}

/// Decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum Decision {
    Render,
    /// Blocking loading state: no content, no redirect.
    Loading,
    Redirect(Redirect),
    Deny(Denial),
}

impl Decision {
    pub fn is_render(&self) -> bool {
        matches!(self, Decision::Render)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Decision::Redirect(r) => Some(&r.to),
            _ => None,
        }
    }
}

/// Notice
///
/// A one-time message for the toast facility. `key` identifies the gate that raised it so
/// the mount can fire each notice once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notice {
    pub key: String,
    pub message: String,
}

/// Verdict
///
/// A gate's decision plus the notice it wants shown, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub notice: Option<Notice>,
}

impl Verdict {
    pub fn render() -> Self {
        Decision::Render.into()
    }

    pub fn loading() -> Self {
        Decision::Loading.into()
    }

    pub fn with_notice(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.notice = Some(Notice {
            key: key.into(),
            message: message.into(),
        });
        self
    }
}

impl From<Decision> for Verdict {
    fn from(decision: Decision) -> Self {
        Self {
            decision,
            notice: None,
        }
    }
}

/// True when `path` equals `prefix` or lies under it at a segment boundary
/// (`/studio/video` is within `/studio`, `/studioX` is not).
pub fn path_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Strips any query string or fragment and guarantees a leading slash.
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = raw[..end].trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_within_respects_segments() {
        assert!(path_within("/board", "/board"));
        assert!(path_within("/board/", "/board"));
        assert!(path_within("/board/minutes", "/board"));
        assert!(!path_within("/boardroom", "/board"));
        assert!(!path_within("/dashboard", "/board"));
        assert!(path_within("/anything", "/"));
    }

    #[test]
    fn normalize_path_drops_query_and_fragment() {
        assert_eq!(normalize_path("/studio?tab=video"), "/studio");
        assert_eq!(normalize_path("/studio#top"), "/studio");
        assert_eq!(normalize_path("billing"), "/billing");
    }
}
