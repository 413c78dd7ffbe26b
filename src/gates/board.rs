use super::{Decision, GateContext, Redirect, Verdict, path_within};

/// Where a navigation sits relative to the board portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    /// Path is on the public allow-list; never redirected.
    Public,
    /// Board member without admin, off the board portal.
    ForcedBoard,
    /// Admin who opted into board preview, off the board portal.
    AdminPreviewBoard,
    Unrestricted,
}

/// Board guard settings.
#[derive(Debug, Clone)]
pub struct BoardRules<'a> {
    /// Public paths. `/` matches only itself; other entries also cover their subpaths.
    pub public_paths: &'a [String],
    pub board_prefix: &'a str,
}

/// Classifies a navigation. Rules apply in order; the first match wins:
///
/// 1. public path
/// 2. board member, not admin, off the board portal
/// 3. admin with board preview on, off the board portal
/// 4. anything else
///
/// Admin always beats plain board membership: an admin who is also a board member is
/// only moved to the portal through the explicit preview opt-in.
pub fn classify(
    is_board_member: bool,
    is_admin: bool,
    viewing_as_board: bool,
    path: &str,
    rules: &BoardRules<'_>,
) -> BoardState {
    if is_public(path, rules.public_paths) {
        return BoardState::Public;
    }
    let on_board = path_within(path, rules.board_prefix);
    if is_board_member && !is_admin && !on_board {
        return BoardState::ForcedBoard;
    }
    if is_admin && viewing_as_board && !on_board {
        return BoardState::AdminPreviewBoard;
    }
    BoardState::Unrestricted
}

/// Board guard. No redirect is decided until both the roles and the board-view
/// preference have resolved.
pub fn guard(ctx: &GateContext, rules: &BoardRules<'_>) -> Verdict {
    if is_public(&ctx.path, rules.public_paths) {
        return Verdict::render();
    }

    let (Some(roles), Some(viewing_as_board)) = (ctx.roles.ready(), ctx.board_view.ready()) else {
        return Verdict::loading();
    };

    match classify(
        roles.is_board_member(),
        roles.is_admin(),
        *viewing_as_board,
        &ctx.path,
        rules,
    ) {
        BoardState::ForcedBoard | BoardState::AdminPreviewBoard => {
            Decision::Redirect(Redirect::replace(rules.board_prefix)).into()
        }
        BoardState::Public | BoardState::Unrestricted => Verdict::render(),
    }
}

/// `/auth/callback` is public when `/auth` is; the root entry never covers the whole site.
pub fn is_public(path: &str, public_paths: &[String]) -> bool {
    public_paths.iter().any(|p| match p.as_str() {
        "/" => path == "/",
        prefix => path_within(path, prefix),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Capability, RoleAssignment},
        stores::Resolution,
    };
    use uuid::Uuid;

    fn public() -> Vec<String> {
        vec!["/".into(), "/auth".into()]
    }

    fn roles(caps: &[Capability]) -> RoleAssignment {
        RoleAssignment {
            capabilities: caps.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn run(path: &str, caps: &[Capability], preview: bool) -> Decision {
        let public = public();
        let rules = BoardRules {
            public_paths: &public,
            board_prefix: "/board",
        };
        let ctx = GateContext::resolved(path, Some(Uuid::from_u128(1)), roles(caps), preview);
        guard(&ctx, &rules).decision
    }

    #[test]
    fn board_member_is_forced_to_board() {
        assert_eq!(
            run("/dashboard", &[Capability::BoardMember], false),
            Decision::Redirect(Redirect::replace("/board"))
        );
        assert!(run("/board/reports", &[Capability::BoardMember], false).is_render());
        assert!(run("/auth", &[Capability::BoardMember], false).is_render());
    }

    #[test]
    fn public_entries_cover_subpaths_but_root_does_not() {
        assert!(run("/auth/callback", &[Capability::BoardMember], false).is_render());
        assert!(!run("/authors", &[Capability::BoardMember], false).is_render());
        assert!(!run("/studio", &[Capability::BoardMember], false).is_render());
    }

    #[test]
    fn admin_board_member_is_not_forced() {
        assert!(run("/dashboard", &[Capability::BoardMember, Capability::Admin], false).is_render());
    }

    #[test]
    fn admin_preview_redirects_until_turned_off() {
        assert_eq!(
            run("/dashboard", &[Capability::Admin], true),
            Decision::Redirect(Redirect::replace("/board"))
        );
        assert!(run("/dashboard", &[Capability::Admin], false).is_render());
    }

    #[test]
    fn preview_flag_without_admin_does_nothing() {
        assert!(run("/dashboard", &[], true).is_render());
    }

    #[test]
    fn boardroom_is_not_the_board_portal() {
        assert_eq!(
            run("/boardroom", &[Capability::BoardMember], false),
            Decision::Redirect(Redirect::replace("/board"))
        );
    }

    #[test]
    fn waits_for_both_inputs() {
        let public = public();
        let rules = BoardRules {
            public_paths: &public,
            board_prefix: "/board",
        };
        let mut ctx = GateContext::resolved(
            "/dashboard",
            Some(Uuid::from_u128(1)),
            roles(&[Capability::BoardMember]),
            false,
        );
        ctx.board_view = Resolution::Loading;
        assert_eq!(guard(&ctx, &rules).decision, Decision::Loading);
    }

    #[test]
    fn classify_covers_all_states() {
        let public = public();
        let rules = BoardRules {
            public_paths: &public,
            board_prefix: "/board",
        };
        assert_eq!(classify(true, true, true, "/", &rules), BoardState::Public);
        assert_eq!(classify(true, false, false, "/x", &rules), BoardState::ForcedBoard);
        assert_eq!(classify(false, true, true, "/x", &rules), BoardState::AdminPreviewBoard);
        assert_eq!(classify(true, true, false, "/x", &rules), BoardState::Unrestricted);
    }
}
