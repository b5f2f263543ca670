use serde::Serialize;
use tokio::sync::broadcast;

use super::Session;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }
}

impl std::fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `(event, session)` pair as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

/// Fan-out of auth state changes to any number of subscribers.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        tracing::debug!(event = %kind, subscribers = self.tx.receiver_count(), "Auth state changed");
        // No subscribers is fine
        let _ = self.tx.send(AuthEvent { kind, session });
    }

    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Handle returned by `subscribe`; dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Next event, or `None` once the provider is gone. Events missed by a
    /// slow subscriber are skipped; the latest session always follows.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth subscriber lagged, skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();

        events.emit(AuthEventKind::SignedIn, None);
        events.emit(AuthEventKind::SignedOut, None);

        assert_eq!(sub.recv().await.unwrap().kind, AuthEventKind::SignedIn);
        assert_eq!(sub.recv().await.unwrap().kind, AuthEventKind::SignedOut);
    }

    #[test]
    fn test_unsubscribe_drops_receiver() {
        let events = AuthEvents::new();
        let sub = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_when_provider_dropped() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        drop(events);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            serde_json::to_value(AuthEventKind::TokenRefreshed).unwrap(),
            serde_json::json!("TOKEN_REFRESHED")
        );
        assert_eq!(AuthEventKind::InitialSession.to_string(), "INITIAL_SESSION");
    }
}
