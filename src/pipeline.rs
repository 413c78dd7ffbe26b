//! The ordered gate pipeline.
//!
//! Global gates run for every path in a fixed, visible order (domain, then board); the
//! longest matching route rule then contributes its own gates in the order listed. The
//! first gate that does not render decides the navigation.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    config::GateSettings,
    gates::{
        GateContext, Verdict,
        board::{self, BoardRules},
        capability,
        domain::{self, DomainRules},
        path_within,
        permission::{self, DenialMode},
        session,
    },
    models::{Capability, Permission},
};

/// GateSpec
///
/// One per-route gate, as written in the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum GateSpec {
    Session,
    Capability {
        any_of: Vec<Capability>,
        #[serde(default)]
        redirect_to: Option<String>,
    },
    Permission {
        permissions: Vec<Permission>,
        #[serde(default)]
        require_all: bool,
        #[serde(default)]
        notice: bool,
        #[serde(default)]
        fallback: Option<String>,
    },
}

impl GateSpec {
    pub fn require(capability: Capability) -> Self {
        GateSpec::Capability {
            any_of: vec![capability],
            redirect_to: None,
        }
    }

    fn denial_mode(notice: bool, fallback: &Option<String>) -> DenialMode {
        match (notice, fallback) {
            (true, _) => DenialMode::Notice,
            (false, Some(f)) => DenialMode::SilentWithFallback(f.clone()),
            (false, None) => DenialMode::Silent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub prefix: String,
    pub gates: Vec<GateSpec>,
}

impl RouteRule {
    pub fn new(prefix: &str, gates: Vec<GateSpec>) -> Self {
        Self {
            prefix: prefix.to_string(),
            gates,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteTableError {
    #[error("cannot read route table: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed route table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("route prefix must start with '/': {0}")]
    BadPrefix(String),
}

/// RouteTable
///
/// Route rules keyed by path prefix. A path uses the rule with the longest prefix that
/// contains it at a segment boundary; paths without a rule only see the global gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RouteTableError> {
        if let Some(bad) = rules.iter().find(|r| !r.prefix.starts_with('/')) {
            return Err(RouteTableError::BadPrefix(bad.prefix.clone()));
        }
        Ok(Self { rules })
    }

    pub fn from_json(raw: &str) -> Result<Self, RouteTableError> {
        let rules: Vec<RouteRule> = serde_json::from_str(raw)?;
        Self::new(rules)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RouteTableError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// The built-in table, or the file named by `routes_file` when set.
    pub fn load(settings: &GateSettings) -> Result<Self, RouteTableError> {
        match &settings.routes_file {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|rule| path_within(path, &rule.prefix))
            .max_by_key(|rule| rule.prefix.trim_end_matches('/').len())
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        let session = || GateSpec::Session;
        let notice_any = |names: &[&str]| GateSpec::Permission {
            permissions: names.iter().map(|n| Permission::new(*n)).collect(),
            require_all: false,
            notice: true,
            fallback: None,
        };

        Self {
            rules: vec![
                RouteRule::new("/dashboard", vec![session()]),
                RouteRule::new("/studio", vec![session()]),
                RouteRule::new("/billing", vec![session()]),
                RouteRule::new("/trucking", vec![session()]),
                RouteRule::new("/email", vec![session(), notice_any(&["email.send"])]),
                RouteRule::new(
                    "/marketing",
                    vec![session(), notice_any(&["marketing.view", "marketing.manage"])],
                ),
                RouteRule::new(
                    "/board",
                    vec![
                        session(),
                        GateSpec::Capability {
                            any_of: vec![Capability::BoardMember, Capability::Admin],
                            redirect_to: None,
                        },
                    ],
                ),
                // Admin areas send everyone lacking the flag, visitors included, to the
                // dashboard rather than the sign-in page.
                RouteRule::new("/admin", vec![GateSpec::require(Capability::Admin)]),
                RouteRule::new("/admin/super", vec![GateSpec::require(Capability::SuperAdmin)]),
            ],
        }
    }
}

/// Pipeline
///
/// The single evaluator every navigation and every gated server route goes through.
pub struct Pipeline {
    table: RouteTable,
    settings: GateSettings,
    /// Configured domain exemptions plus the board portal.
    domain_exempt: Vec<String>,
}

impl Pipeline {
    pub fn new(table: RouteTable, settings: GateSettings) -> Self {
        // The board guard forces some users onto the portal; domain forcing must never
        // send them back off it.
        let mut domain_exempt = settings.domain_exempt_prefixes.clone();
        if !domain_exempt.contains(&settings.board_prefix) {
            domain_exempt.push(settings.board_prefix.clone());
        }
        Self {
            table,
            settings,
            domain_exempt,
        }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn evaluate(&self, ctx: &GateContext) -> Verdict {
        let domain_rules = DomainRules {
            routes: &self.settings.domain_routes,
            exempt_prefixes: &self.domain_exempt,
        };
        let board_rules = BoardRules {
            public_paths: &self.settings.board_public_paths,
            board_prefix: &self.settings.board_prefix,
        };

        let global = [
            domain::guard(ctx, &domain_rules),
            board::guard(ctx, &board_rules),
        ];
        if let Some(verdict) = global.into_iter().find(|v| !v.decision.is_render()) {
            return verdict;
        }

        let Some(rule) = self.table.rule_for(&ctx.path) else {
            return Verdict::render();
        };

        rule.gates
            .iter()
            .map(|spec| self.run(spec, ctx))
            .find(|v| !v.decision.is_render())
            .unwrap_or_else(Verdict::render)
    }

    fn run(&self, spec: &GateSpec, ctx: &GateContext) -> Verdict {
        match spec {
            GateSpec::Session => session::require_session(ctx, &self.settings.sign_in_path),
            GateSpec::Capability {
                any_of,
                redirect_to,
            } => capability::guard(
                ctx,
                any_of,
                redirect_to
                    .as_deref()
                    .unwrap_or(&self.settings.default_redirect),
            ),
            GateSpec::Permission {
                permissions,
                require_all,
                notice,
                fallback,
            } => permission::gate(
                ctx,
                permissions,
                *require_all,
                &GateSpec::denial_mode(*notice, fallback),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::default();
        assert_eq!(table.rule_for("/admin/super/keys").unwrap().prefix, "/admin/super");
        assert_eq!(table.rule_for("/admin/users").unwrap().prefix, "/admin");
        assert!(table.rule_for("/administrator").is_none());
        assert!(table.rule_for("/").is_none());
    }

    #[test]
    fn admin_rules_check_only_the_capability() {
        let table = RouteTable::default();
        assert_eq!(
            table.rule_for("/admin/users").unwrap().gates,
            vec![GateSpec::require(Capability::Admin)]
        );
        assert_eq!(
            table.rule_for("/admin/super").unwrap().gates,
            vec![GateSpec::require(Capability::SuperAdmin)]
        );
    }

    #[test]
    fn board_portal_is_exempt_from_domain_forcing() {
        let pipeline = Pipeline::new(RouteTable::default(), GateSettings::default());
        assert!(pipeline.domain_exempt.contains(&"/board".to_string()));

        let roles = crate::models::RoleAssignment {
            capabilities: [Capability::BoardMember].into_iter().collect(),
            ..Default::default()
        };
        let ctx = GateContext::resolved("/board", Some(uuid::Uuid::from_u128(7)), roles, false)
            .with_hostname("seeksytrucking.com");
        assert!(pipeline.evaluate(&ctx).decision.is_render());
    }

    #[test]
    fn route_table_parses_from_json() {
        let table = RouteTable::from_json(
            r#"[
                {"prefix": "/admin", "gates": [
                    {"gate": "session"},
                    {"gate": "capability", "any_of": ["admin"], "redirect_to": "/home"}
                ]},
                {"prefix": "/email", "gates": [
                    {"gate": "permission", "permissions": ["email.send"], "notice": true}
                ]}
            ]"#,
        )
        .unwrap();

        let admin = table.rule_for("/admin").unwrap();
        assert_eq!(admin.gates[0], GateSpec::Session);
        assert_eq!(
            admin.gates[1],
            GateSpec::Capability {
                any_of: vec![Capability::Admin],
                redirect_to: Some("/home".to_string()),
            }
        );
    }

    #[test]
    fn route_table_rejects_relative_prefix() {
        let err = RouteTable::from_json(r#"[{"prefix": "admin", "gates": []}]"#).unwrap_err();
        assert!(matches!(err, RouteTableError::BadPrefix(_)));
    }
}
