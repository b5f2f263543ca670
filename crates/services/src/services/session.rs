//! Process-wide session state.
//!
//! The store subscribes to the auth provider's event stream, checks the
//! existing session once, then folds every `(event, session)` pair into a
//! [`SessionState`]. Consumers read the current state or watch it change.

use std::{sync::Arc, time::Duration};

use db::models::user::UserProfile;
use remote::{
    AuthError, AuthEventKind, AuthSubscription, Backend, Credentials, DataError, Session,
    SignUpCredentials, SignUpOutcome,
};
use serde::Serialize;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use ts_rs::TS;
use uuid::Uuid;

/// How long `login`/`logout` wait for the event loop to catch up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Before the first session check completes.
    Initializing,
    Anonymous,
    /// Signed in; the profile row is being fetched.
    ProfileLoading { session: Session },
    /// Signed in. `profile` is `None` only when the fetch failed, in which
    /// case `profile_error` says why.
    Authenticated {
        session: Session,
        profile: Option<UserProfile>,
        profile_error: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    Anonymous,
    ProfileLoading,
    Authenticated,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Initializing => SessionPhase::Initializing,
            Self::Anonymous => SessionPhase::Anonymous,
            Self::ProfileLoading { .. } => SessionPhase::ProfileLoading,
            Self::Authenticated { .. } => SessionPhase::Authenticated,
        }
    }

    /// Settled states are the ones route guards can decide on.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Anonymous | Self::Authenticated { .. })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::ProfileLoading { session } | Self::Authenticated { session, .. } => Some(session),
            Self::Initializing | Self::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session().map(Session::user_id)
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    /// Profile name, falling back to the profile or auth email.
    pub fn display_name(&self) -> Option<String> {
        self.profile()
            .and_then(UserProfile::display_name)
            .map(str::to_string)
            .or_else(|| self.session().and_then(|s| s.user.email.clone()))
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    state: watch::Sender<SessionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    async fn apply(&self, kind: AuthEventKind, session: Option<Session>) {
        tracing::debug!(event = %kind, signed_in = session.is_some(), "Applying auth event");

        let Some(session) = session else {
            self.state.send_replace(SessionState::Anonymous);
            return;
        };

        let user_id = session.user_id();
        self.state.send_replace(SessionState::ProfileLoading {
            session: session.clone(),
        });

        let (profile, profile_error) = match self.backend.get_user_profile(user_id).await {
            Ok(profile) => (Some(profile), None),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load profile");
                (None, Some(e.to_string()))
            }
        };

        self.state.send_replace(SessionState::Authenticated {
            session,
            profile,
            profile_error,
        });
    }

    async fn run(self: Arc<Self>, mut subscription: AuthSubscription) {
        let initial = match self.backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Initial session check failed; starting signed out");
                None
            }
        };
        self.apply(AuthEventKind::InitialSession, initial).await;

        while let Some(event) = subscription.recv().await {
            self.apply(event.kind, event.session).await;
        }
        tracing::debug!("Auth event stream closed");
    }
}

/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("phase", &self.state().phase())
            .finish()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                task: Mutex::new(None),
            }),
        }
    }

    /// Subscribes to auth events and spawns the event loop. Calling it on a
    /// running store is a no-op.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        // Subscribe before probing so no event between the two is lost
        let subscription = self.inner.backend.subscribe();
        let inner = self.inner.clone();
        *task = Some(tokio::spawn(inner.run(subscription)));
        tracing::debug!("Session store started");
    }

    /// Stops the event loop and drops its subscription.
    pub async fn shutdown(&self) {
        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            tracing::debug!("Session store stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Waits until the state is `Anonymous` or `Authenticated`. Returns the
    /// current state immediately when the store is not running.
    pub async fn settled(&self) -> SessionState {
        if !self.is_running().await {
            return self.state();
        }
        let mut rx = self.subscribe();
        match rx.wait_for(SessionState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Re-fetches the profile for the current user.
    pub async fn refresh_profile(&self) -> Result<Option<UserProfile>, DataError> {
        let Some(user_id) = self.state().user_id() else {
            return Ok(None);
        };
        let profile = self.inner.backend.get_user_profile(user_id).await?;

        self.inner.state.send_if_modified(|state| match state {
            SessionState::Authenticated {
                session,
                profile: current,
                profile_error,
            } if session.user_id() == user_id => {
                *current = Some(profile.clone());
                *profile_error = None;
                true
            }
            _ => false,
        });
        Ok(Some(profile))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let session = self.inner.backend.sign_in(credentials).await?;
        self.sync(AuthEventKind::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    pub async fn register(
        &self,
        credentials: &SignUpCredentials,
    ) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.inner.backend.sign_up(credentials).await?;
        if let Some(session) = &outcome.session {
            self.sync(AuthEventKind::SignedIn, Some(session.clone()))
                .await;
        }
        Ok(outcome)
    }

    /// Signs out; the local state is cleared even if the remote call fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = self.inner.backend.sign_out().await;
        self.sync(AuthEventKind::SignedOut, None).await;
        result
    }

    /// Brings the state in line with an auth change this store caused. A
    /// running store learns about it from the event stream; a stopped one
    /// applies it directly.
    async fn sync(&self, kind: AuthEventKind, session: Option<Session>) {
        if !self.is_running().await {
            self.inner.apply(kind, session).await;
            return;
        }

        let expected = session.as_ref().map(Session::user_id);
        let mut rx = self.subscribe();
        let wait = rx.wait_for(|state| state.is_settled() && state.user_id() == expected);
        if tokio::time::timeout(SETTLE_TIMEOUT, wait).await.is_err() {
            tracing::warn!(event = %kind, "Session store did not observe auth change in time");
        }
    }
}
