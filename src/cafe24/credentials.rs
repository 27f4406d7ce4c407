//! Credential manager for the Cafe24 OAuth token pair.
//!
//! Owns the in-memory pair and its durable store. Refreshes are single-flight:
//! Cafe24 rotates the refresh token on every grant, so two parallel refreshes
//! would leave one caller holding a pair the platform no longer recognizes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::error::ApiError;
use crate::store::tokens::TokenStore;

/// Lifecycle phase of the managed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPhase {
    /// The current access token is presumed good.
    Valid,
    /// A refresh is in flight.
    Refreshing,
    /// The refresh token was rejected; the mall must be re-authorized by hand.
    Expired,
}

struct CredentialState {
    access: String,
    refresh: String,
    phase: TokenPhase,
}

/// Successful token endpoint response. Both fields are required; Cafe24
/// issues a new refresh token with every grant.
#[derive(Debug, Deserialize)]
struct GrantResponse {
    access_token: String,
    refresh_token: String,
}

/// Error payload from the token endpoint.
#[derive(Debug, Deserialize)]
struct GrantError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct CredentialManager {
    state: RwLock<CredentialState>,
    /// Serializes refresh attempts; held across the token endpoint call.
    flight: Mutex<()>,
    store: Arc<dyn TokenStore>,
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl CredentialManager {
    /// Load the working pair: the stored record wins, the configured seed
    /// covers first boot, and with neither the service refuses to start.
    pub async fn bootstrap(
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
        token_url: String,
        client_id: String,
        client_secret: String,
        seed: Option<(String, String)>,
    ) -> Result<Self, ApiError> {
        let (access, refresh) = match store.load().await? {
            Some(record) => {
                info!("Token pair loaded from store");
                (record.access_token, record.refresh_token)
            }
            None => match seed {
                Some(pair) => {
                    info!("Token store empty; starting from the configured seed pair");
                    pair
                }
                None => {
                    return Err(ApiError::MissingCredentials(
                        "token store is empty and no CAFE24_ACCESS_TOKEN / \
                         CAFE24_REFRESH_TOKEN seed is configured"
                            .into(),
                    ));
                }
            },
        };

        Ok(Self {
            state: RwLock::new(CredentialState {
                access,
                refresh,
                phase: TokenPhase::Valid,
            }),
            flight: Mutex::new(()),
            store,
            http,
            token_url,
            client_id,
            client_secret,
        })
    }

    /// Current access token for outbound platform calls.
    pub async fn access_token(&self) -> String {
        self.state.read().await.access.clone()
    }

    pub async fn phase(&self) -> TokenPhase {
        self.state.read().await.phase
    }

    /// Exchange the refresh token for a new pair after `stale_access` was
    /// rejected upstream.
    ///
    /// Callers that lost the race get the winner's fresh token without a
    /// second endpoint call. The new pair is persisted before it becomes
    /// visible in memory, so a crash in between leaves the store
    /// authoritative.
    pub async fn refresh(&self, stale_access: &str) -> Result<String, ApiError> {
        let _flight = self.flight.lock().await;

        let refresh_token = {
            let state = self.state.read().await;
            if state.phase == TokenPhase::Expired {
                return Err(ApiError::RefreshRejected);
            }
            // Another caller may have refreshed while we waited on the gate.
            if state.access != stale_access {
                return Ok(state.access.clone());
            }
            state.refresh.clone()
        };

        self.state.write().await.phase = TokenPhase::Refreshing;

        match self.exchange(&refresh_token).await {
            Ok(grant) => {
                if let Err(e) = self.store.save(&grant.access_token, &grant.refresh_token).await {
                    error!("Refreshed pair could not be persisted; keeping the old pair");
                    self.state.write().await.phase = TokenPhase::Valid;
                    return Err(e);
                }
                let mut state = self.state.write().await;
                state.access = grant.access_token.clone();
                state.refresh = grant.refresh_token;
                state.phase = TokenPhase::Valid;
                info!("Access token refreshed and persisted");
                Ok(grant.access_token)
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.phase = if matches!(e, ApiError::RefreshRejected) {
                    TokenPhase::Expired
                } else {
                    // Transient failure; the next 401 may try again.
                    TokenPhase::Valid
                };
                Err(e)
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<GrantResponse, ApiError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| ApiError::RefreshFailed(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(grant_error) = serde_json::from_str::<GrantError>(&body) {
                if grant_error.error == "invalid_grant" {
                    error!(
                        "Refresh token rejected ({}); manual re-authorization required",
                        grant_error
                            .error_description
                            .as_deref()
                            .unwrap_or("invalid_grant")
                    );
                    return Err(ApiError::RefreshRejected);
                }
            }
            return Err(ApiError::RefreshFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<GrantResponse>()
            .await
            .map_err(|e| ApiError::RefreshFailed(format!("malformed token response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cafe24::client::http_client;
    use crate::cafe24::OAUTH_TOKEN_PATH;
    use crate::store::tokens::testing::MemoryTokenStore;

    async fn manager(
        server: &MockServer,
        store: Arc<MemoryTokenStore>,
        seed: Option<(&str, &str)>,
    ) -> CredentialManager {
        CredentialManager::bootstrap(
            store,
            http_client(),
            format!("{}{}", server.uri(), OAUTH_TOKEN_PATH),
            "app-client-id".to_string(),
            "app-client-secret".to_string(),
            seed.map(|(a, r)| (a.to_string(), r.to_string())),
        )
        .await
        .unwrap()
    }

    fn grant_ok(access: &str, refresh: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 7200,
        }))
    }

    #[tokio::test]
    async fn bootstrap_prefers_the_stored_pair_over_the_seed() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryTokenStore::seeded("stored-A", "stored-R"));
        let manager = manager(&server, store, Some(("seed-A", "seed-R"))).await;

        assert_eq!(manager.access_token().await, "stored-A");
        assert_eq!(manager.phase().await, TokenPhase::Valid);
    }

    #[tokio::test]
    async fn bootstrap_refuses_to_start_with_no_pair_anywhere() {
        let store = Arc::new(MemoryTokenStore::empty());
        let result = CredentialManager::bootstrap(
            store,
            http_client(),
            "http://localhost:9/unused".to_string(),
            "id".to_string(),
            "secret".to_string(),
            None,
        )
        .await;

        assert!(matches!(result, Err(ApiError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn refresh_persists_the_new_pair_before_serving_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OAUTH_TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=R1"))
            .respond_with(grant_ok("A2", "R2"))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::empty());
        let manager = manager(&server, store.clone(), Some(("A1", "R1"))).await;

        let fresh = manager.refresh("A1").await.unwrap();
        assert_eq!(fresh, "A2");
        assert_eq!(store.stored_pair(), Some(("A2".into(), "R2".into())));
        assert_eq!(manager.access_token().await, "A2");
        assert_eq!(manager.phase().await, TokenPhase::Valid);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OAUTH_TOKEN_PATH))
            .respond_with(grant_ok("A2", "R2").set_delay(Duration::from_millis(50)))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::empty());
        let manager = manager(&server, store.clone(), Some(("A1", "R1"))).await;

        let (first, second) = tokio::join!(manager.refresh("A1"), manager.refresh("A1"));
        assert_eq!(first.unwrap(), "A2");
        assert_eq!(second.unwrap(), "A2");
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn stale_caller_gets_the_current_token_without_a_new_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OAUTH_TOKEN_PATH))
            .respond_with(grant_ok("A2", "R2"))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::empty());
        let manager = manager(&server, store, Some(("A1", "R1"))).await;

        assert_eq!(manager.refresh("A1").await.unwrap(), "A2");
        // Same stale token again: the pair already moved on.
        assert_eq!(manager.refresh("A1").await.unwrap(), "A2");
    }

    #[tokio::test]
    async fn invalid_grant_is_terminal_until_reauthorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OAUTH_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "refresh token expired",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::empty());
        let manager = manager(&server, store.clone(), Some(("A1", "R1"))).await;

        let first = manager.refresh("A1").await;
        assert!(matches!(first, Err(ApiError::RefreshRejected)));
        assert_eq!(manager.phase().await, TokenPhase::Expired);
        assert_eq!(store.save_count(), 0);

        // Short-circuits without touching the endpoint again.
        let second = manager.refresh("A1").await;
        assert!(matches!(second, Err(ApiError::RefreshRejected)));
    }

    #[tokio::test]
    async fn transient_endpoint_failure_leaves_the_pair_usable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OAUTH_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::empty());
        let manager = manager(&server, store, Some(("A1", "R1"))).await;

        let result = manager.refresh("A1").await;
        assert!(matches!(result, Err(ApiError::RefreshFailed(_))));
        assert_eq!(manager.phase().await, TokenPhase::Valid);
        assert_eq!(manager.access_token().await, "A1");
    }

    #[tokio::test]
    async fn failed_save_aborts_the_refresh_and_keeps_the_old_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OAUTH_TOKEN_PATH))
            .respond_with(grant_ok("A2", "R2"))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::failing());
        let manager = manager(&server, store.clone(), Some(("A1", "R1"))).await;

        let result = manager.refresh("A1").await;
        assert!(matches!(result, Err(ApiError::Storage(_))));
        assert_eq!(manager.access_token().await, "A1");
        assert_eq!(manager.phase().await, TokenPhase::Valid);
        assert_eq!(store.stored_pair(), None);
    }
}
