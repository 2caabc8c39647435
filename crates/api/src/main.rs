use std::sync::Arc;

use anyhow::Context;

use folio_api::app::{build_app, services::AppServices};
use folio_infra::config::FolioConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FolioConfig::from_env().context("invalid configuration")?;
    folio_observability::init(config.log_format);

    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialize services")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
