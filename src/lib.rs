//! cafe24-events: event entry service for Cafe24 malls with managed OAuth
//! token refresh.

use std::sync::Arc;

pub mod api;
pub mod cafe24;
pub mod config;
pub mod error;
pub mod export;
pub mod store;

pub use config::Config;
pub use error::ApiError;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub entries: Arc<dyn store::EntryStore>,
    pub cafe24: cafe24::Cafe24Client,
}

pub type SharedState = Arc<AppState>;
