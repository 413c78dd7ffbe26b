//! Read-side stores feeding the gates.
//!
//! Each store owns one cached value per user and is the only writer of it. Gates
//! receive plain snapshots and never touch a store directly.

pub mod board_view;
pub mod cache;
pub mod roles;
pub mod tour;

pub use board_view::BoardViewStore;
pub use cache::SnapshotCache;
pub use roles::RoleStore;
pub use tour::{TourMode, TourTokens};

/// Resolution
///
/// A store value as a gate sees it: either still loading, or resolved at least once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Loading,
    Ready(T),
}

impl<T> Resolution<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Resolution::Loading => None,
            Resolution::Ready(value) => Some(value),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resolution::Loading)
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Resolution::Ready(v),
            None => Resolution::Loading,
        }
    }
}
