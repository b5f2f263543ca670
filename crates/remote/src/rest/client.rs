use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, header::ACCEPT};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::query::Query;
use crate::{
    auth::GoTrueClient,
    config::RemoteConfig,
    error::{DataError, map_reqwest_data_error},
};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Sends [`Query`] values to `{project}/rest/v1` as the signed-in user.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    config: Arc<RemoteConfig>,
    auth: GoTrueClient,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("http", &"<reqwest::Client>")
            .field("base_url", &self.config.supabase_url.as_str())
            .finish()
    }
}

impl RestClient {
    pub fn new(config: Arc<RemoteConfig>, http: Client, auth: GoTrueClient) -> Self {
        Self { http, config, auth }
    }

    /// Row-level security keys off the user's JWT, so every request needs
    /// a live session.
    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, DataError> {
        let token = self
            .auth
            .access_token()
            .await?
            .ok_or(DataError::NotAuthenticated)?;
        Ok(builder
            .header("apikey", self.config.anon_key())
            .bearer_auth(token))
    }

    pub async fn fetch<T: DeserializeOwned>(&self, query: &Query) -> Result<T, DataError> {
        let mut url = self
            .config
            .rest_url(query.table())
            .map_err(|e| DataError::Transport(format!("invalid REST URL: {e}")))?;
        let pairs = query.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        tracing::debug!(method = %query.method(), url = %url, "Data API request");

        let mut builder = self.http.request(query.method().clone(), url);
        if query.is_single() {
            builder = builder.header(ACCEPT, SINGLE_OBJECT);
        }
        if let Some(prefer) = query.prefer() {
            builder = builder.header("Prefer", prefer);
        }
        if let Some(body) = query.body() {
            builder = builder.json(body);
        }

        let response = self
            .authorized(builder)
            .await?
            .send()
            .await
            .map_err(map_reqwest_data_error)?;

        Self::handle_response(response).await
    }

    /// Deletes matching rows and fails with `NotFound` when none were
    /// visible to the caller.
    pub async fn delete(&self, query: &Query) -> Result<(), DataError> {
        let deleted: Vec<Value> = self.fetch(query).await?;
        if deleted.is_empty() {
            Err(DataError::NotFound)
        } else {
            Ok(())
        }
    }

    /// Calls a database function through `/rpc/{function}`.
    pub async fn rpc<T: DeserializeOwned>(&self, function: &str, args: &Value) -> Result<T, DataError> {
        let url = self
            .config
            .rest_url(&format!("rpc/{function}"))
            .map_err(|e| DataError::Transport(format!("invalid REST URL: {e}")))?;

        tracing::debug!(function, "Data API rpc");

        let builder = self.http.post(url).json(args);
        let response = self
            .authorized(builder)
            .await?
            .send()
            .await
            .map_err(map_reqwest_data_error)?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, DataError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| DataError::Parse(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            let err = DataError::from_postgrest(status.as_u16(), &body);
            match &err {
                DataError::NotFound => {}
                _ => tracing::warn!(status = status.as_u16(), body = %body, "Data API returned error"),
            }
            Err(err)
        }
    }
}
