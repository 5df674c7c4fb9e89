//! Session state of the signed-in user.
//!
//! [`AuthContext`] is the single owner of "who is logged in". Only
//! [`AuthContext::login`] and [`AuthContext::logout`] change it; everything
//! else reads a snapshot or subscribes to changes.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Manages at least one location through an authority.
    ManageLocations,
    /// Registers attendance at a location.
    ScanAttendance,
    Volunteer,
}

/// Identity as returned by the login provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub admin: bool,
    pub capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user_id: Option<String>,
    pub logged_in: bool,
    pub is_admin: bool,
    pub capabilities: BTreeSet<Capability>,
}

impl AuthState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.logged_in && (self.is_admin || self.capabilities.contains(&capability))
    }
}

impl From<AuthenticatedUser> for AuthState {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            user_id: Some(user.user_id),
            logged_in: true,
            is_admin: user.admin,
            capabilities: user.capabilities,
        }
    }
}

#[derive(Clone)]
pub struct AuthContext {
    state: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::anonymous());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn login(&self, user: AuthenticatedUser) {
        info!("User {} logged in (admin: {})", user.user_id, user.admin);
        self.state.send_replace(user.into());
    }

    pub fn logout(&self) {
        let previous = self.state.send_replace(AuthState::anonymous());
        if let Some(user_id) = previous.user_id {
            info!("User {user_id} logged out");
        }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "000170000001".into(),
            admin: false,
            capabilities: BTreeSet::from([Capability::Volunteer]),
        }
    }

    #[test]
    fn starts_anonymous() {
        let auth = AuthContext::new();
        let state = auth.current();
        assert!(!state.logged_in);
        assert!(!state.has(Capability::Volunteer));
    }

    #[test]
    fn login_and_logout_drive_the_state() {
        let auth = AuthContext::new();
        auth.login(student());

        let state = auth.current();
        assert_eq!(state.user_id.as_deref(), Some("000170000001"));
        assert!(state.has(Capability::Volunteer));
        assert!(!state.has(Capability::ManageLocations));

        auth.logout();
        assert_eq!(auth.current(), AuthState::anonymous());
    }

    #[test]
    fn admin_has_every_capability() {
        let auth = AuthContext::new();
        auth.login(AuthenticatedUser {
            user_id: "admin".into(),
            admin: true,
            capabilities: BTreeSet::new(),
        });
        assert!(auth.current().has(Capability::ManageLocations));
        assert!(auth.current().has(Capability::ScanAttendance));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let auth = AuthContext::new();
        let mut rx = auth.subscribe();

        auth.login(student());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().logged_in);

        auth.logout();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().logged_in);
    }
}
