use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use cafe24_events::cafe24::{self, client, Cafe24Client, CredentialManager};
use cafe24_events::config::Config;
use cafe24_events::store::{MongoEntryStore, MongoTokenStore};
use cafe24_events::{api, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cafe24_events=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("cafe24-events v{}", env!("CARGO_PKG_VERSION"));
    info!("Mall: {}", config.mall_id);

    let http = client::http_client();

    let token_store = Arc::new(MongoTokenStore::new(
        &config.mongodb_uri,
        &config.db_name,
        &config.token_collection,
    ));
    let credentials = Arc::new(
        CredentialManager::bootstrap(
            token_store,
            http.clone(),
            format!("{}{}", config.platform_base_url(), cafe24::OAUTH_TOKEN_PATH),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.seed_tokens(),
        )
        .await?,
    );
    info!("Credentials ready ✓");

    let entries = Arc::new(MongoEntryStore::connect(&config.mongodb_uri, &config.db_name).await?);
    info!("Database connected ✓");

    let platform = Cafe24Client::new(http, config.platform_base_url(), credentials);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        entries,
        cafe24: platform,
    });

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr} ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
