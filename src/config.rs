use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Database (MongoDB, shared by token + entry collections) ─────────
    pub mongodb_uri: String,
    pub db_name: String,
    pub token_collection: String,

    // ── Cafe24 OAuth app credentials ─────────────────────────────────────
    pub client_id: String,
    pub client_secret: String,
    /// Mall identifier, the subdomain of the platform API host.
    pub mall_id: String,

    // ── Initial token seed ───────────────────────────────────────────────
    /// Used only when the token store holds no record yet (first deploy).
    pub seed_access_token: Option<String>,
    pub seed_refresh_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3100".into())
                .parse()
                .context("Invalid PORT")?,

            mongodb_uri: std::env::var("MONGODB_URI")
                .context("MONGODB_URI is required (MongoDB connection string)")?,
            db_name: std::env::var("DB_NAME").context("DB_NAME is required")?,
            token_collection: std::env::var("TOKEN_COLLECTION_NAME")
                .unwrap_or_else(|_| "tokens".into()),

            client_id: std::env::var("CAFE24_CLIENT_ID")
                .context("CAFE24_CLIENT_ID is required")?,
            client_secret: std::env::var("CAFE24_CLIENT_SECRET")
                .context("CAFE24_CLIENT_SECRET is required")?,
            mall_id: std::env::var("CAFE24_MALLID").context("CAFE24_MALLID is required")?,

            seed_access_token: std::env::var("CAFE24_ACCESS_TOKEN").ok(),
            seed_refresh_token: std::env::var("CAFE24_REFRESH_TOKEN").ok(),
        })
    }

    /// Base URL of the mall's platform API host.
    pub fn platform_base_url(&self) -> String {
        format!("https://{}.cafe24api.com", self.mall_id)
    }

    /// Seed token pair from the environment, if both halves are present.
    pub fn seed_tokens(&self) -> Option<(String, String)> {
        match (&self.seed_access_token, &self.seed_refresh_token) {
            (Some(a), Some(r)) => Some((a.clone(), r.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            host: "0.0.0.0".into(),
            port: 3100,
            mongodb_uri: "mongodb://localhost:27017".into(),
            db_name: "events".into(),
            token_collection: "tokens".into(),
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            mall_id: "yogibo".into(),
            seed_access_token: None,
            seed_refresh_token: None,
        }
    }

    #[test]
    fn platform_base_url_uses_mall_id() {
        assert_eq!(sample().platform_base_url(), "https://yogibo.cafe24api.com");
    }

    #[test]
    fn seed_tokens_require_both_halves() {
        let mut config = sample();
        assert!(config.seed_tokens().is_none());

        config.seed_access_token = Some("A1".into());
        assert!(config.seed_tokens().is_none());

        config.seed_refresh_token = Some("R1".into());
        assert_eq!(config.seed_tokens(), Some(("A1".into(), "R1".into())));
    }
}
