//! Authentication types, the auth event bus and the [`AuthProvider`] seam.

mod events;
pub mod gotrue;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use events::{AuthEvent, AuthEventKind, AuthEvents, AuthSubscription};
pub use gotrue::GoTrueClient;

use crate::error::AuthError;

/// Access tokens are refreshed once they are this close to expiry.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// The auth service's view of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// True when the access token expires within `margin` from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        let margin = chrono::Duration::milliseconds(margin.as_millis() as i64);
        self.expires_at - Utc::now() <= margin
    }

    pub fn needs_refresh(&self) -> bool {
        self.expires_within(REFRESH_MARGIN)
    }
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct SignUpCredentials {
    pub email: String,
    pub password: String,
    /// Stored as user metadata and copied into the profile row.
    #[serde(default)]
    pub name: Option<String>,
}

impl fmt::Debug for SignUpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl SignUpCredentials {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// Result of a sign-up. `session` is `None` while email confirmation is
/// pending.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

impl SignUpOutcome {
    pub fn needs_confirmation(&self) -> bool {
        self.session.is_none()
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, credentials: &SignUpCredentials) -> Result<SignUpOutcome, AuthError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Clears the local session even when the remote call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Current session, refreshed first if it is about to expire.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Fetches the user for the current session from the auth service.
    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError>;

    async fn refresh_session(&self) -> Result<Session, AuthError>;

    /// Subscribes to auth state changes. Dropping the subscription
    /// unsubscribes.
    fn subscribe(&self) -> AuthSubscription;

    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError> {
        if self.get_session().await?.is_some() {
            self.get_user().await
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: i64) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: Some("a@example.com".into()),
                user_metadata: Value::Null,
            },
        }
    }

    #[test]
    fn test_refresh_margin() {
        assert!(session(10).needs_refresh());
        assert!(session(-5).needs_refresh());
        assert!(!session(3600).needs_refresh());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", session(60));
        assert!(!debug.contains("access\""));
        assert!(debug.contains("<redacted>"));

        let creds = Credentials {
            email: "a@example.com".into(),
            password: "hunter22".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter22"));
    }
}
