use std::collections::BTreeMap;

use super::{Decision, GateContext, Redirect, Verdict, path_within};

/// Domain routing for white-labeled verticals.
#[derive(Debug, Clone)]
pub struct DomainRules<'a> {
    /// Lowercased hostname to forced prefix.
    pub routes: &'a BTreeMap<String, String>,
    /// Cross-cutting prefixes (sign-in, admin) exempt from forcing.
    pub exempt_prefixes: &'a [String],
}

/// Lowercases, and strips any port and trailing dot.
pub fn normalize_hostname(hostname: &str) -> String {
    let host = hostname.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Forced prefix for a hostname, if it is a mapped vertical.
pub fn target_for<'a>(hostname: &str, rules: &DomainRules<'a>) -> Option<&'a str> {
    rules
        .routes
        .get(&normalize_hostname(hostname))
        .map(String::as_str)
}

/// Pure redirect decision for `(hostname, path)`.
///
/// Exempt paths, including the target prefix itself, always win over forcing.
pub fn redirect_for(hostname: &str, path: &str, rules: &DomainRules<'_>) -> Option<Redirect> {
    let target = target_for(hostname, rules)?;

    let exempt = path_within(path, target)
        || rules
            .exempt_prefixes
            .iter()
            .any(|prefix| path_within(path, prefix));

    if exempt {
        None
    } else {
        Some(Redirect::replace(target))
    }
}

pub fn guard(ctx: &GateContext, rules: &DomainRules<'_>) -> Verdict {
    match ctx
        .hostname
        .as_deref()
        .and_then(|host| redirect_for(host, &ctx.path, rules))
    {
        Some(redirect) => Decision::Redirect(redirect).into(),
        None => Verdict::render(),
    }
}
