use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Failure modes of the PostgREST data store, kept distinct so callers can
/// react to conflicts and missing rows without string matching.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("store authorization failed: {0}")]
    Auth(String),

    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store error ({status}): {message}")]
    Api { status: u16, message: String },
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn headers(&self, auth_token: Option<&str>, returning: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        if returning {
            headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        }

        headers
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        returning: bool,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Store request: {} {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.headers(auth_token, returning));

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Store error ({}): {}", status, message);

            return Err(match status {
                // PostgREST reports unique-constraint violations as 409.
                StatusCode::CONFLICT => StoreError::Conflict(message),
                StatusCode::NOT_FOUND => StoreError::NotFound(message),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth(message),
                _ => StoreError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET `/rest/v1/{path_and_query}`, decoding the row set.
    pub async fn select<T>(
        &self,
        path_and_query: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request(
            Method::GET,
            &format!("/rest/v1/{}", path_and_query),
            auth_token,
            None,
            false,
        )
        .await
    }

    /// POST a row and return the stored representation.
    pub async fn insert_returning<T>(
        &self,
        table: &str,
        row: Value,
        auth_token: Option<&str>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self
            .request(
                Method::POST,
                &format!("/rest/v1/{}", table),
                auth_token,
                Some(row),
                true,
            )
            .await?;

        if rows.is_empty() {
            return Err(StoreError::Api {
                status: 200,
                message: format!("insert into {} returned no rows", table),
            });
        }
        Ok(rows.remove(0))
    }

    /// PATCH matching rows and return the first updated representation.
    pub async fn update_returning<T>(
        &self,
        path_and_query: &str,
        changes: Value,
        auth_token: Option<&str>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self
            .request(
                Method::PATCH,
                &format!("/rest/v1/{}", path_and_query),
                auth_token,
                Some(changes),
                true,
            )
            .await?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(format!(
                "no rows matched {}",
                path_and_query
            )));
        }
        Ok(rows.remove(0))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
