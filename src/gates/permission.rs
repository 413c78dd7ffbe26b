use super::{Decision, Denial, GateContext, Verdict};
use crate::models::Permission;

/// How a permission gate presents a denial.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DenialMode {
    /// Render nothing, or `fallback` when given.
    #[default]
    Silent,
    SilentWithFallback(String),
    /// Explicit "Access Denied" notice; each missing permission is written to the audit log.
    Notice,
}

/// Permission gate.
///
/// With `require_all` every listed permission must be held; otherwise one suffices.
/// Permission data that is still loading counts as holding nothing.
pub fn gate(
    ctx: &GateContext,
    permissions: &[Permission],
    require_all: bool,
    mode: &DenialMode,
) -> Verdict {
    let held = ctx.roles.ready();
    let holds = |p: &Permission| held.is_some_and(|roles| roles.has_permission(p));

    let allowed = if require_all {
        permissions.iter().all(|p| holds(p))
    } else {
        permissions.iter().any(|p| holds(p))
    };

    if allowed {
        return Verdict::render();
    }

    let denial = match mode {
        DenialMode::Silent => Denial::Silent { fallback: None },
        DenialMode::SilentWithFallback(fallback) => Denial::Silent {
            fallback: Some(fallback.clone()),
        },
        DenialMode::Notice => {
            let missing: Vec<Permission> = permissions
                .iter()
                .filter(|p| !holds(*p))
                .cloned()
                .collect();
            let user = ctx.session.ready().copied().flatten();
            for permission in &missing {
                tracing::warn!(
                    target: "audit",
                    user_id = ?user,
                    path = %ctx.path,
                    permission = %permission,
                    "permission denied"
                );
            }
            Denial::Notice { missing }
        }
    };

    Decision::Deny(denial).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::RoleAssignment, stores::Resolution};
    use uuid::Uuid;

    fn ctx_with(perms: &[&str]) -> GateContext {
        GateContext::resolved(
            "/email",
            Some(Uuid::from_u128(1)),
            RoleAssignment {
                permissions: perms.iter().map(|p| Permission::new(*p)).collect(),
                ..Default::default()
            },
            false,
        )
    }

    fn ab() -> Vec<Permission> {
        vec![Permission::new("a"), Permission::new("b")]
    }

    #[test]
    fn require_all_denies_partial_holder() {
        let verdict = gate(&ctx_with(&["a"]), &ab(), true, &DenialMode::Silent);
        assert_eq!(
            verdict.decision,
            Decision::Deny(Denial::Silent { fallback: None })
        );
    }

    #[test]
    fn any_allows_partial_holder() {
        let verdict = gate(&ctx_with(&["a"]), &ab(), false, &DenialMode::Silent);
        assert!(verdict.decision.is_render());
    }

    #[test]
    fn loading_is_denial() {
        let mut ctx = ctx_with(&["a", "b"]);
        ctx.roles = Resolution::Loading;
        let verdict = gate(&ctx, &ab(), false, &DenialMode::Silent);
        assert!(matches!(verdict.decision, Decision::Deny(_)));
    }

    #[test]
    fn notice_mode_lists_missing() {
        let verdict = gate(&ctx_with(&["a"]), &ab(), true, &DenialMode::Notice);
        assert_eq!(
            verdict.decision,
            Decision::Deny(Denial::Notice {
                missing: vec![Permission::new("b")]
            })
        );
    }

    #[test]
    fn silent_fallback_is_passed_through() {
        let mode = DenialMode::SilentWithFallback("upgrade-banner".to_string());
        let verdict = gate(&ctx_with(&[]), &ab(), false, &mode);
        assert_eq!(
            verdict.decision,
            Decision::Deny(Denial::Silent {
                fallback: Some("upgrade-banner".to_string())
            })
        );
    }
}
