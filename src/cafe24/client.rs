//! Authenticated request client for the Cafe24 admin API.
//!
//! Every call carries the managed access token. A 401 triggers one refresh
//! and one retry; a second 401 propagates as an error. Never loops.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::warn;

use super::credentials::CredentialManager;
use super::CUSTOMERS_PRIVACY_PATH;
use crate::error::ApiError;

/// Fixed deadline for every outbound call, token endpoint included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for platform and token endpoint traffic. Built once at
/// startup; a client without the timeout must never be handed out.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("default reqwest client")
}

pub struct Cafe24Client {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialManager>,
}

impl Cafe24Client {
    pub fn new(http: reqwest::Client, base_url: String, credentials: Arc<CredentialManager>) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Perform an authenticated platform call and return the response body.
    ///
    /// First attempt with the current token; on 401, refresh once and retry
    /// once with the fresh token. Whatever the retry returns is final.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let token = self.credentials.access_token().await;
        let first = self.send(method.clone(), &url, body, query, &token).await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return read_json(first).await;
        }

        warn!("Platform rejected the access token; refreshing and retrying once");
        let fresh = self.credentials.refresh(&token).await?;
        let second = self.send(method, &url, body, query, &fresh).await?;
        read_json(second).await
    }

    /// Customer privacy lookup for one member id.
    pub async fn customers_privacy(&self, member_id: &str) -> Result<Value, ApiError> {
        self.request(
            Method::GET,
            CUSTOMERS_PRIVACY_PATH,
            None,
            &[("member_id", member_id)],
        )
        .await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.http.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(json) = body {
            request = request.json(json);
        }
        request
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("platform unreachable: {e}")))
    }
}

/// Read a platform response as JSON; non-success statuses become errors
/// carrying the body for the logs.
async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::UpstreamStatus {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ApiError::Upstream(format!("invalid JSON from platform: {e}")))
}
