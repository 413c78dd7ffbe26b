use super::{Decision, GateContext, Redirect, Verdict};
use crate::models::Capability;

/// Capability guard (the generalized "require admin").
///
/// * Roles still loading: blocking `Loading`, never content and never a redirect.
/// * None of `any_of` held: redirect to `redirect_to`, carrying the attempted path,
///   with a denial notice keyed to the requirement.
/// * Otherwise: render.
///
/// An anonymous session has no capabilities and is handled by the second rule.
pub fn guard(ctx: &GateContext, any_of: &[Capability], redirect_to: &str) -> Verdict {
    let Some(roles) = ctx.roles.ready() else {
        return Verdict::loading();
    };

    if any_of.iter().any(|c| roles.has(*c)) {
        return Verdict::render();
    }

    let required = any_of
        .iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join("|");

    tracing::debug!(path = %ctx.path, required = %required, "capability guard denied");

    Verdict::from(Decision::Redirect(
        Redirect::replace(redirect_to).carrying(ctx.path.clone()),
    ))
    .with_notice(
        format!("capability:{}", required),
        "You don't have permission to access that page.",
    )
}
