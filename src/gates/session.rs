use super::{Decision, GateContext, Redirect, Verdict};

/// Session gate: the route needs a signed-in user.
///
/// Anonymous visitors are sent to `sign_in_path` carrying the attempted path.
pub fn require_session(ctx: &GateContext, sign_in_path: &str) -> Verdict {
    match ctx.session.ready() {
        None => Verdict::loading(),
        Some(Some(_)) => Verdict::render(),
        Some(None) => {
            Decision::Redirect(Redirect::replace(sign_in_path).carrying(ctx.path.clone())).into()
        }
    }
}
