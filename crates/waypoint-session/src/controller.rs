// ABOUTME: The authentication session controller: login, register, logout, and identity refresh.
// ABOUTME: Owns the session state, serializes mutations, and publishes every transition on a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};

use waypoint_client::CandidateResolver;
use waypoint_core::{CandidateRequest, Endpoint, SessionState, UserRecord};

use crate::outcome::{
    AuthOutcome, LOGIN_FAILED, LOGIN_SUCCEEDED, REGISTER_FAILED, REGISTER_SUCCEEDED, Registration,
};

/// Owns the session state for one running client.
///
/// Consumers read snapshots through `state()` or `subscribe()` and change
/// them only through the four operations. Mutations run one at a time; a
/// refresh requested while another refresh is in flight waits for it and
/// reuses its result instead of issuing a second identity check.
pub struct AuthSession {
    resolver: CandidateResolver,
    state: watch::Sender<SessionState>,
    mutation: Mutex<()>,
    refreshes: AtomicU64,
}

impl AuthSession {
    /// Create a controller in the `Initial` state without contacting the backend.
    pub fn new(resolver: CandidateResolver) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self {
            resolver,
            state,
            mutation: Mutex::new(()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Create a controller and wait for its first identity check.
    pub async fn initialize(resolver: CandidateResolver) -> Self {
        let session = Self::new(resolver);
        session.refresh_session().await;
        session
    }

    /// Create a shared controller and run its first identity check on a
    /// background task. Observers see `Initial`, then `Loading`, then the
    /// settled state.
    pub fn spawn(resolver: CandidateResolver) -> Arc<Self> {
        let session = Arc::new(Self::new(resolver));
        let background = Arc::clone(&session);
        tokio::spawn(async move {
            background.ensure_checked().await;
        });
        session
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin()
    }

    pub fn resolver(&self) -> &CandidateResolver {
        &self.resolver
    }

    /// Ask the backend who is signed in and settle the state accordingly.
    /// Never fails: any error settles as anonymous.
    pub async fn refresh_session(&self) {
        let seen = self.refreshes.load(Ordering::Acquire);
        let _guard = self.mutation.lock().await;
        if self.refreshes.load(Ordering::Acquire) != seen {
            tracing::debug!("identity check finished while waiting, reusing its result");
            return;
        }
        self.refresh_locked().await;
    }

    /// Run the first identity check unless one has already completed.
    pub async fn ensure_checked(&self) {
        let _guard = self.mutation.lock().await;
        if self.refreshes.load(Ordering::Acquire) > 0 {
            return;
        }
        self.refresh_locked().await;
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        let request = CandidateRequest::for_endpoint(Endpoint::Login)
            .with_payload(json!({ "email": email, "password": password }));

        let _guard = self.mutation.lock().await;
        match self.resolver.execute(&request).await {
            Ok(response) => {
                tracing::info!(path = %response.path, "login accepted");
                self.refresh_locked().await;
                AuthOutcome::succeeded(&response.body, LOGIN_SUCCEEDED)
            }
            Err(err) => {
                tracing::info!(error = %err, "login rejected");
                AuthOutcome::failed(&err, LOGIN_FAILED)
            }
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthOutcome {
        self.register_with(Registration::new(name, email, password))
            .await
    }

    /// Register from a structured payload. Does not change the session by
    /// itself; a successful sign-up triggers an identity refresh.
    pub async fn register_with(&self, registration: Registration) -> AuthOutcome {
        let payload = match serde_json::to_value(&registration) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "registration payload could not be encoded");
                return AuthOutcome {
                    success: false,
                    message: REGISTER_FAILED.to_string(),
                };
            }
        };
        let request = CandidateRequest::for_endpoint(Endpoint::Register).with_payload(payload);

        let _guard = self.mutation.lock().await;
        match self.resolver.execute(&request).await {
            Ok(response) => {
                tracing::info!(path = %response.path, "registration accepted");
                self.refresh_locked().await;
                AuthOutcome::succeeded(&response.body, REGISTER_SUCCEEDED)
            }
            Err(err) => {
                tracing::info!(error = %err, "registration rejected");
                AuthOutcome::failed(&err, REGISTER_FAILED)
            }
        }
    }

    /// Tell the backend to end the session, then clear local state no matter
    /// how that call went.
    pub async fn logout(&self) {
        let request = CandidateRequest::for_endpoint(Endpoint::Logout);

        let _guard = self.mutation.lock().await;
        if let Err(err) = self.resolver.execute(&request).await {
            tracing::warn!(error = %err, "remote logout failed, clearing local session anyway");
        }
        self.publish(SessionState::anonymous());
    }

    /// Identity check body. Caller must hold `mutation`.
    async fn refresh_locked(&self) {
        let previous = self.state();
        let fallback = if previous.is_loading {
            SessionState::anonymous()
        } else {
            previous.clone()
        };
        self.publish(previous.loading());
        let mut pending = SettleOnDrop {
            state: &self.state,
            fallback: Some(fallback),
        };

        let request = CandidateRequest::for_endpoint(Endpoint::WhoAmI);
        let next = match self.resolver.execute(&request).await {
            Ok(response) => match user_from_identity(&response.body) {
                Some(user) => {
                    tracing::debug!(user = %user.display_name(), "session authenticated");
                    SessionState::authenticated(user)
                }
                None => SessionState::anonymous(),
            },
            Err(err) => {
                tracing::debug!(error = %err, "identity check failed, treating session as anonymous");
                SessionState::anonymous()
            }
        };

        pending.fallback = None;
        self.publish(next);
        self.refreshes.fetch_add(1, Ordering::AcqRel);
    }

    fn publish(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}

/// Settles the published state if an identity check is dropped mid-flight,
/// so observers never stay in `Loading`.
struct SettleOnDrop<'a> {
    state: &'a watch::Sender<SessionState>,
    fallback: Option<SessionState>,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            tracing::debug!(phase = ?fallback.phase, "identity check cancelled, restoring settled state");
            self.state.send_replace(fallback);
        }
    }
}

/// Extract the signed-in user from a who-am-i body.
///
/// `authenticated: false` always means nobody. Otherwise the user comes from
/// `user`, `data.user`, or the body itself when it looks like a user.
pub fn user_from_identity(body: &Value) -> Option<UserRecord> {
    if body.get("authenticated").and_then(Value::as_bool) == Some(false) {
        return None;
    }

    let candidate = body
        .get("user")
        .filter(|u| u.is_object())
        .or_else(|| body.pointer("/data/user").filter(|u| u.is_object()))
        .or_else(|| {
            let looks_like_user = body.get("email").is_some() || body.get("id").is_some();
            (body.is_object() && looks_like_user).then_some(body)
        })?;

    match serde_json::from_value::<UserRecord>(candidate.clone()) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(error = %e, "identity response carried an unreadable user");
            None
        }
    }
}
