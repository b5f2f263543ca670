//! PostgREST access: a small query builder and the client that sends it.

mod client;
pub mod query;

pub use client::RestClient;
pub use query::Query;
