//! HTTP client for the GoTrue auth service (`{project}/auth/v1`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::{
    AuthEventKind, AuthEvents, AuthProvider, AuthSubscription, AuthUser, Credentials, Session,
    SignUpCredentials, SignUpOutcome,
};
use crate::{
    config::RemoteConfig,
    error::{AuthError, map_reqwest_auth_error},
};

const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                Utc::now()
                    + chrono::Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Holds the process-wide session and publishes every change on its
/// event bus.
#[derive(Clone)]
pub struct GoTrueClient {
    http: Client,
    config: Arc<RemoteConfig>,
    session: Arc<RwLock<Option<Session>>>,
    refresh_lock: Arc<Mutex<()>>,
    events: AuthEvents,
}

impl std::fmt::Debug for GoTrueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueClient")
            .field("http", &"<reqwest::Client>")
            .field("base_url", &self.config.supabase_url.as_str())
            .finish()
    }
}

impl GoTrueClient {
    pub fn new(config: Arc<RemoteConfig>, http: Client) -> Self {
        Self {
            http,
            config,
            session: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
            events: AuthEvents::new(),
        }
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Access token for the data API, refreshing it first when needed.
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.get_session().await?.map(|s| s.access_token))
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        self.config
            .auth_url(path)
            .map_err(|e| AuthError::Transport(format!("invalid auth URL: {e}")))
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", self.config.anon_key())
    }

    async fn store_session(&self, session: Option<Session>, kind: AuthEventKind) {
        *self.session.write().await = session.clone();
        self.events.emit(kind, session);
    }

    async fn clear_session(&self) {
        let had_session = self.session.write().await.take().is_some();
        if had_session {
            self.events.emit(AuthEventKind::SignedOut, None);
        }
    }

    async fn read_error(response: reqwest::Response) -> (u16, String) {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        (status, error_message(&body))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, (u16, String)> {
        let mut url = self
            .url("token")
            .map_err(|e| (0, e.to_string()))?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        tracing::debug!(grant_type, "Requesting auth token");

        let response = self
            .request(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| (0, map_reqwest_auth_error(e).to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        response
            .json::<TokenResponse>()
            .await
            .map(TokenResponse::into_session)
            .map_err(|e| (0, format!("failed to parse token response: {e}")))
    }
}

/// Pulls a human-readable message out of the several error shapes GoTrue
/// returns.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn grant_error(status: u16, message: String) -> AuthError {
    if status == 0 {
        AuthError::Transport(message)
    } else {
        AuthError::Rejected { status, message }
    }
}

#[async_trait]
impl AuthProvider for GoTrueClient {
    async fn sign_up(&self, credentials: &SignUpCredentials) -> Result<SignUpOutcome, AuthError> {
        let url = self.url("signup")?;
        let mut body = json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        if let Some(name) = credentials.name.as_deref().filter(|n| !n.trim().is_empty()) {
            body["data"] = json!({ "name": name });
        }

        tracing::debug!(email = %credentials.email, "Signing up");

        let response = self
            .request(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_auth_error)?;

        if !response.status().is_success() {
            let (status, message) = Self::read_error(response).await;
            tracing::warn!(status, message = %message, "Sign-up rejected");
            return Err(AuthError::Rejected { status, message });
        }

        let value: Value = response.json().await.map_err(map_reqwest_auth_error)?;

        // With email confirmation on, GoTrue answers with the bare user.
        if value.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(value).map_err(|e| AuthError::Parse(e.to_string()))?;
            let session = token.into_session();
            let user = session.user.clone();
            self.store_session(Some(session.clone()), AuthEventKind::SignedIn)
                .await;
            Ok(SignUpOutcome {
                user,
                session: Some(session),
            })
        } else {
            let user: AuthUser =
                serde_json::from_value(value).map_err(|e| AuthError::Parse(e.to_string()))?;
            Ok(SignUpOutcome {
                user,
                session: None,
            })
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
        });

        match self.token_grant("password", body).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id(), "Signed in");
                self.store_session(Some(session.clone()), AuthEventKind::SignedIn)
                    .await;
                Ok(session)
            }
            Err((400 | 401 | 422, message)) => {
                tracing::debug!(message = %message, "Sign-in rejected");
                Err(AuthError::InvalidCredentials)
            }
            Err((status, message)) => Err(grant_error(status, message)),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());

        let Some(token) = token else {
            self.events.emit(AuthEventKind::SignedOut, None);
            return Ok(());
        };

        let result = match self.url("logout") {
            Ok(url) => self
                .request(self.http.post(url))
                .bearer_auth(&token)
                .send()
                .await
                .map_err(map_reqwest_auth_error)
                .map(|response| response.status()),
            Err(e) => Err(e),
        };

        self.clear_session().await;

        match result {
            // An already-invalid token is as good as signed out
            Ok(status)
                if status.is_success()
                    || status == StatusCode::UNAUTHORIZED
                    || status == StatusCode::NOT_FOUND =>
            {
                Ok(())
            }
            Ok(status) => Err(AuthError::Rejected {
                status: status.as_u16(),
                message: "logout failed".to_string(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Remote sign-out failed; local session cleared");
                Err(e)
            }
        }
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.needs_refresh() {
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AuthError::SessionExpired | AuthError::NotAuthenticated) => Ok(None),
            Err(e) if e.is_transient() && session.expires_at > Utc::now() => {
                tracing::warn!(error = %e, "Token refresh failed; using current token until expiry");
                Ok(Some(session))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let response = self
            .request(self.http.get(self.url("user")?))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(map_reqwest_auth_error)?;

        match response.status() {
            status if status.is_success() => {
                let user: AuthUser = response.json().await.map_err(map_reqwest_auth_error)?;
                Ok(Some(user))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!(user_id = %session.user_id(), "Session rejected by auth service");
                self.clear_session().await;
                Err(AuthError::SessionExpired)
            }
            _ => {
                let (status, message) = Self::read_error(response).await;
                Err(AuthError::Rejected { status, message })
            }
        }
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let seen = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NotAuthenticated)?;

        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.session.read().await.clone() else {
            return Err(AuthError::NotAuthenticated);
        };
        // Another caller refreshed while we waited for the lock
        if current.refresh_token != seen {
            return Ok(current);
        }

        let body = json!({ "refresh_token": current.refresh_token });
        match self.token_grant("refresh_token", body).await {
            Ok(session) => {
                tracing::debug!(user_id = %session.user_id(), "Access token refreshed");
                self.store_session(Some(session.clone()), AuthEventKind::TokenRefreshed)
                    .await;
                Ok(session)
            }
            Err((400 | 401 | 403, message)) => {
                tracing::info!(message = %message, "Refresh token rejected, signing out");
                self.clear_session().await;
                Err(AuthError::SessionExpired)
            }
            Err((status, message)) => Err(grant_error(status, message)),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"code":422,"msg":"Password too short"}"#), "Password too short");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn test_token_response_prefers_absolute_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 2_000_000_000,
            "user": { "id": uuid::Uuid::nil() }
        }))
        .unwrap();
        let session = token.into_session();
        assert_eq!(session.expires_at.timestamp(), 2_000_000_000);
    }
}
