//! Client for the hosted backend: GoTrue for authentication and PostgREST
//! for data, both reached through one project URL and anon key.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod rest;
pub mod supabase;

pub use api::{Backend, KanbanApi};
pub use auth::{
    AuthEvent, AuthEventKind, AuthProvider, AuthSubscription, AuthUser, Credentials, Session,
    SignUpCredentials, SignUpOutcome,
};
pub use config::{ConfigError, RemoteConfig};
pub use error::{AuthError, DataError};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryBackend;
pub use supabase::SupabaseClient;
