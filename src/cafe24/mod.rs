//! Cafe24 platform integration: managed credentials + authenticated client.

pub mod client;
pub mod credentials;

pub use client::Cafe24Client;
pub use credentials::{CredentialManager, TokenPhase};

/// OAuth token endpoint path under a mall's API host.
pub const OAUTH_TOKEN_PATH: &str = "/api/v2/oauth/token";

/// Customer privacy lookup path under a mall's API host.
pub const CUSTOMERS_PRIVACY_PATH: &str = "/api/v2/admin/customersprivacy";
