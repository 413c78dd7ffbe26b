//! Per-mount bookkeeping for repeated evaluations.
//!
//! A mount is one route consumer on the client. It fires each notice at most once,
//! issues a given redirect at most once per path entry, and ignores evaluations
//! overtaken by a newer navigation or finished after it was unmounted.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::{Duration, Instant},
};
use uuid::Uuid;

use crate::gates::{Decision, Notice, Verdict};

/// Settled
///
/// A verdict after mount bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub decision: Decision,
    /// Present only the first time this mount raises the notice.
    pub notice: Option<Notice>,
    /// The same redirect was already issued for this path entry.
    pub duplicate: bool,
    /// A newer navigation (or an unmount) overtook this evaluation; nothing should happen.
    pub superseded: bool,
}

impl Settled {
    fn superseded(decision: Decision) -> Self {
        Self {
            decision,
            notice: None,
            duplicate: false,
            superseded: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct GuardMount {
    latest_seq: u64,
    path: Option<String>,
    redirected_to: Option<String>,
    notified: HashSet<String>,
}

impl GuardMount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of an evaluation. Returns false when a newer navigation was
    /// already seen. A changed path starts a new path entry.
    pub fn begin(&mut self, seq: u64, path: &str) -> bool {
        if seq < self.latest_seq {
            return false;
        }
        self.latest_seq = seq;
        if self.path.as_deref() != Some(path) {
            self.path = Some(path.to_string());
            self.redirected_to = None;
        }
        true
    }

    pub fn settle(&mut self, seq: u64, verdict: Verdict) -> Settled {
        if seq != self.latest_seq {
            return Settled::superseded(verdict.decision);
        }

        let duplicate = match verdict.decision.redirect_target() {
            Some(target) if self.redirected_to.as_deref() == Some(target) => true,
            Some(target) => {
                self.redirected_to = Some(target.to_string());
                false
            }
            None => {
                self.redirected_to = None;
                false
            }
        };

        let notice = verdict
            .notice
            .filter(|n| self.notified.insert(n.key.clone()));

        Settled {
            decision: verdict.decision,
            notice,
            duplicate,
            superseded: false,
        }
    }
}

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct Tracked {
    mount: GuardMount,
    last_seen: Instant,
}

struct Mounts {
    entries: HashMap<Uuid, Tracked>,
    last_sweep: Instant,
}

/// MountRegistry
///
/// Mounts keyed by client-generated id. A mount comes into being on its first
/// evaluation and lives until unmounted, or until it has not been evaluated for
/// `idle_ttl`. Clients that close a tab never unmount, so idle mounts are swept
/// on `begin`, at most once per `idle_ttl`.
pub struct MountRegistry {
    mounts: Mutex<Mounts>,
    idle_ttl: Duration,
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            mounts: Mutex::new(Mounts {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            idle_ttl,
        }
    }

    pub fn begin(&self, id: Uuid, seq: u64, path: &str) -> bool {
        let now = Instant::now();
        let mut mounts = self.mounts.lock().unwrap_or_else(|e| e.into_inner());

        if now.duration_since(mounts.last_sweep) >= self.idle_ttl {
            let before = mounts.entries.len();
            let ttl = self.idle_ttl;
            mounts
                .entries
                .retain(|_, tracked| now.duration_since(tracked.last_seen) < ttl);
            mounts.last_sweep = now;
            let evicted = before - mounts.entries.len();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = mounts.entries.len(), "idle mounts evicted");
            }
        }

        let tracked = mounts.entries.entry(id).or_insert_with(|| Tracked {
            mount: GuardMount::new(),
            last_seen: now,
        });
        tracked.last_seen = now;
        tracked.mount.begin(seq, path)
    }

    /// Settles an evaluation. An evaluation finishing after unmount (or eviction) writes
    /// nothing and comes back superseded.
    pub fn settle(&self, id: Uuid, seq: u64, verdict: Verdict) -> Settled {
        let mut mounts = self.mounts.lock().unwrap_or_else(|e| e.into_inner());
        match mounts.entries.get_mut(&id) {
            Some(tracked) => tracked.mount.settle(seq, verdict),
            None => Settled::superseded(verdict.decision),
        }
    }

    pub fn unmount(&self, id: Uuid) -> bool {
        let mut mounts = self.mounts.lock().unwrap_or_else(|e| e.into_inner());
        mounts.entries.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.mounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
