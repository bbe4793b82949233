use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use prospect_api::{build_router, AppState};
use prospect_common::Config;
use prospect_scout::fetcher::{build_http_client, HttpCandidateFetcher};
use prospect_scout::refresh::ScheduledRefresh;
use prospect_scout::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("prospect=info".parse()?))
        .init();

    let config = Config::api_from_env();
    config.log_redacted();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let client = build_http_client(Duration::from_secs(config.fetcher_timeout_secs))?;
    let fetcher = HttpCandidateFetcher::new(
        client,
        config.require_fetcher_url()?,
        Some(config.fetcher_api_key.as_str()),
    );

    let refresh = ScheduledRefresh::builder()
        .prospects(store.clone())
        .items(store.clone())
        .run_log(store.clone())
        .fetcher(Arc::new(fetcher))
        .settings(config.refresh.clone())
        .build();

    let state = Arc::new(AppState {
        refresh: Arc::new(refresh),
        run_log: store,
        refresh_secret: config.refresh_secret,
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Prospect refresh API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
