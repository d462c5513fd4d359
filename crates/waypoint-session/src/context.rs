// ABOUTME: SessionContext, the handle consumers hold to read session state and invoke auth operations.
// ABOUTME: Wires config, transport, resolver, controller, and admin API together at startup.

use std::sync::Arc;

use tokio::sync::watch;

use waypoint_client::{CandidateResolver, TransportError};
use waypoint_core::{EndpointConfig, SessionPhase, SessionState};

use crate::admin::AdminApi;
use crate::controller::AuthSession;
use crate::outcome::{AuthOutcome, Registration};

/// Cloneable view of the one session controller. Consumers get snapshots
/// and the named operations; they never touch the state directly.
#[derive(Clone)]
pub struct SessionContext {
    session: Arc<AuthSession>,
    admin: AdminApi,
}

impl SessionContext {
    pub fn new(session: Arc<AuthSession>) -> Self {
        let admin = AdminApi::new(session.resolver().clone());
        Self { session, admin }
    }

    /// Build the HTTP stack for `config` and start the controller; the first
    /// identity check runs in the background.
    pub fn start(config: &EndpointConfig) -> Result<Self, TransportError> {
        let resolver = CandidateResolver::from_config(config)?;
        Ok(Self::new(AuthSession::spawn(resolver)))
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// Wait until no identity check is in flight and return that state.
    /// A session that was never checked gets its first check here.
    pub async fn settled(&self) -> SessionState {
        if self.session.state().phase == SessionPhase::Initial {
            self.session.ensure_checked().await;
        }
        let mut rx = self.subscribe();
        match rx.wait_for(|s| !s.is_loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    pub async fn refresh_session(&self) {
        self.session.refresh_session().await;
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        self.session.login(email, password).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthOutcome {
        self.session.register(name, email, password).await
    }

    pub async fn register_with(&self, registration: Registration) -> AuthOutcome {
        self.session.register_with(registration).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub fn admin(&self) -> &AdminApi {
        &self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use waypoint_client::testing::ScriptedTransport;
    use waypoint_core::Method;

    #[tokio::test]
    async fn settled_waits_for_background_check() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(
                    Method::Get,
                    "/api/auth/me",
                    200,
                    json!({"authenticated": true, "user": {"id": 1, "userType": "user"}}),
                )
                .with_delay(Duration::from_millis(20)),
        );
        let resolver = CandidateResolver::new(transport.clone(), "/api");
        let context = SessionContext::new(AuthSession::spawn(resolver));

        assert!(context.state().is_loading);
        let settled = context.settled().await;

        assert_eq!(settled.phase, SessionPhase::Authenticated);
        assert!(!context.is_admin());
    }

    #[tokio::test]
    async fn clones_share_one_session() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(Method::Get, "/api/auth/me", 200, json!({"user": {"id": 9, "userType": "admin"}}))
                .respond(Method::Post, "/api/auth/logout", 200, json!({})),
        );
        let resolver = CandidateResolver::new(transport.clone(), "/api");
        let context = SessionContext::new(Arc::new(AuthSession::initialize(resolver).await));
        let other = context.clone();
        let mut rx = other.subscribe();

        assert!(other.is_admin());
        context.logout().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, SessionPhase::Anonymous);
        assert!(!other.is_admin());
    }

    #[tokio::test]
    async fn settled_runs_first_check_for_unstarted_session() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Get,
            "/api/auth/me",
            200,
            json!({"user": {"id": 4, "userType": "admin"}}),
        ));
        let resolver = CandidateResolver::new(transport.clone(), "/api");
        let context = SessionContext::new(Arc::new(AuthSession::new(resolver)));

        let settled = tokio::time::timeout(Duration::from_secs(1), context.settled())
            .await
            .unwrap();

        assert_eq!(settled.phase, SessionPhase::Authenticated);
        assert!(context.is_admin());
        assert_eq!(transport.paths(), vec!["/api/auth/me"]);
    }

    #[tokio::test]
    async fn settled_after_spawn_checks_once() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Get,
            "/api/auth/me",
            200,
            json!({"authenticated": false}),
        ));
        let resolver = CandidateResolver::new(transport.clone(), "/api");
        let context = SessionContext::new(AuthSession::spawn(resolver));

        let settled = context.settled().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(settled.phase, SessionPhase::Anonymous);
        assert_eq!(transport.paths(), vec!["/api/auth/me"]);
    }
}
