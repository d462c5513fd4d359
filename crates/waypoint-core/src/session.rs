// ABOUTME: Session state snapshot published by the auth controller to its observers.
// ABOUTME: Tracks the confirmed user, the settled authentication flag, and in-flight loading.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::user::UserRecord;

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Created at startup; no identity check has started yet.
    Initial,
    /// An identity check is in flight.
    Loading,
    Authenticated,
    Anonymous,
}

/// The client's current belief about who is signed in.
///
/// `is_authenticated` implies `user` is present. While `is_loading` is true,
/// `is_authenticated` and `user` still hold the last settled values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub user: Option<UserRecord>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    /// When the state last settled; `None` before the first settle.
    pub checked_at: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

impl SessionState {
    pub fn initial() -> Self {
        Self {
            phase: SessionPhase::Initial,
            user: None,
            is_authenticated: false,
            is_loading: true,
            checked_at: None,
        }
    }

    /// Settled state for a confirmed user.
    pub fn authenticated(user: UserRecord) -> Self {
        Self {
            phase: SessionPhase::Authenticated,
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
            checked_at: Some(Utc::now()),
        }
    }

    /// Settled state with nobody signed in.
    pub fn anonymous() -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            user: None,
            is_authenticated: false,
            is_loading: false,
            checked_at: Some(Utc::now()),
        }
    }

    /// Same identity, marked as re-checking.
    pub fn loading(&self) -> Self {
        Self {
            phase: SessionPhase::Loading,
            is_loading: true,
            ..self.clone()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(UserRecord::is_admin)
    }
}
