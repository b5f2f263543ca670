use std::{sync::Arc, time::Duration};

use db::models::user::UpdateUserProfile;
use remote::{AuthProvider, Credentials, InMemoryBackend, KanbanApi, SignUpCredentials};
use services::services::session::{SessionPhase, SessionState, SessionStore};

fn backend_with_user() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.register_user("ada@example.com", "password1", Some("Ada"));
    backend
}

fn credentials() -> Credentials {
    Credentials {
        email: "ada@example.com".into(),
        password: "password1".into(),
    }
}

#[tokio::test]
async fn test_starts_anonymous_without_session() {
    let store = SessionStore::new(Arc::new(backend_with_user()));
    assert_eq!(store.state().phase(), SessionPhase::Initializing);

    store.start().await;
    let state = store.settled().await;
    assert!(matches!(state, SessionState::Anonymous));
    store.shutdown().await;
}

#[tokio::test]
async fn test_picks_up_existing_session_on_start() {
    let backend = backend_with_user();
    backend.sign_in(&credentials()).await.unwrap();

    let store = SessionStore::new(Arc::new(backend));
    store.start().await;
    let state = store.settled().await;

    assert!(state.is_authenticated());
    assert_eq!(state.display_name().as_deref(), Some("Ada"));
    store.shutdown().await;
}

#[tokio::test]
async fn test_login_and_logout() {
    let store = SessionStore::new(Arc::new(backend_with_user()));
    store.start().await;
    store.settled().await;

    let session = store.login(&credentials()).await.unwrap();
    let state = store.state();
    assert_eq!(state.user_id(), Some(session.user_id()));
    assert_eq!(state.profile().and_then(|p| p.name.as_deref()), Some("Ada"));

    store.logout().await.unwrap();
    assert!(matches!(store.state(), SessionState::Anonymous));
    store.shutdown().await;
}

#[tokio::test]
async fn test_wrong_password_leaves_state_alone() {
    let store = SessionStore::new(Arc::new(backend_with_user()));
    store.start().await;
    store.settled().await;

    let result = store
        .login(&Credentials {
            email: "ada@example.com".into(),
            password: "nope".into(),
        })
        .await;
    assert!(result.is_err());
    assert!(matches!(store.state(), SessionState::Anonymous));
    store.shutdown().await;
}

#[tokio::test]
async fn test_register_pending_confirmation_stays_anonymous() {
    let backend = InMemoryBackend::new();
    backend.require_email_confirmation(true);
    let store = SessionStore::new(Arc::new(backend));
    store.start().await;
    store.settled().await;

    let outcome = store
        .register(&SignUpCredentials {
            email: "grace@example.com".into(),
            password: "password1".into(),
            name: Some("Grace".into()),
        })
        .await
        .unwrap();

    assert!(outcome.needs_confirmation());
    assert!(matches!(store.state(), SessionState::Anonymous));
    store.shutdown().await;
}

#[tokio::test]
async fn test_register_signs_in_when_confirmation_is_off() {
    let store = SessionStore::new(Arc::new(InMemoryBackend::new()));
    store.start().await;
    store.settled().await;

    store
        .register(&SignUpCredentials {
            email: "grace@example.com".into(),
            password: "password1".into(),
            name: Some("Grace".into()),
        })
        .await
        .unwrap();

    let state = store.state();
    assert!(state.is_authenticated());
    assert_eq!(state.display_name().as_deref(), Some("Grace"));
    store.shutdown().await;
}

#[tokio::test]
async fn test_sign_up_then_sign_in_again() {
    let store = SessionStore::new(Arc::new(InMemoryBackend::new()));
    store.start().await;
    store.settled().await;

    let sign_up = SignUpCredentials {
        email: "grace@example.com".into(),
        password: "password1".into(),
        name: Some("Grace".into()),
    };
    let outcome = store.register(&sign_up).await.unwrap();
    store.logout().await.unwrap();
    assert!(matches!(store.state(), SessionState::Anonymous));

    let session = store.login(&sign_up.credentials()).await.unwrap();
    assert_eq!(session.user.id, outcome.user.id);
    let state = store.state();
    assert_eq!(state.user_id(), Some(outcome.user.id));
    assert_eq!(state.display_name().as_deref(), Some("Grace"));
    store.shutdown().await;
}

#[tokio::test]
async fn test_works_without_event_loop() {
    let store = SessionStore::new(Arc::new(backend_with_user()));

    store.login(&credentials()).await.unwrap();
    assert!(store.state().is_authenticated());

    store.logout().await.unwrap();
    assert!(matches!(store.state(), SessionState::Anonymous));
}

#[tokio::test]
async fn test_shutdown_drops_subscription() {
    let backend = backend_with_user();
    let store = SessionStore::new(Arc::new(backend.clone()));

    store.start().await;
    store.settled().await;
    assert_eq!(backend.auth_subscriber_count(), 1);

    // Starting twice keeps a single subscription
    store.start().await;
    assert_eq!(backend.auth_subscriber_count(), 1);

    store.shutdown().await;
    assert!(!store.is_running().await);
    assert_eq!(backend.auth_subscriber_count(), 0);
}

#[tokio::test]
async fn test_token_refresh_updates_session() {
    let backend = backend_with_user();
    let store = SessionStore::new(Arc::new(backend.clone()));
    store.start().await;
    let first = store.login(&credentials()).await.unwrap();

    let refreshed = backend.refresh_session().await.unwrap();
    assert_ne!(first.access_token, refreshed.access_token);

    let mut rx = store.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|state| {
            state.is_settled()
                && state
                    .session()
                    .is_some_and(|s| s.access_token == refreshed.access_token)
        }),
    )
    .await
    .expect("refresh not observed")
    .unwrap()
    .clone();

    assert!(state.profile().is_some());
    store.shutdown().await;
}

#[tokio::test]
async fn test_refresh_profile_picks_up_changes() {
    let backend = backend_with_user();
    let store = SessionStore::new(Arc::new(backend.clone()));
    store.start().await;
    let session = store.login(&credentials()).await.unwrap();

    backend
        .update_user_profile(
            session.user_id(),
            &UpdateUserProfile {
                name: Some("Ada L.".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let profile = store.refresh_profile().await.unwrap().unwrap();
    assert_eq!(profile.name.as_deref(), Some("Ada L."));
    assert_eq!(store.state().display_name().as_deref(), Some("Ada L."));
    store.shutdown().await;
}

#[tokio::test]
async fn test_refresh_profile_when_signed_out() {
    let store = SessionStore::new(Arc::new(InMemoryBackend::new()));
    assert_eq!(store.refresh_profile().await.unwrap(), None);
}
