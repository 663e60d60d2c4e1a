use std::sync::Arc;

use anyhow::Context;

use roster_api::app::{build_app, AppServices};
use roster_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roster_observability::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let services = Arc::new(AppServices::bootstrap(&settings).await?);
    let app = build_app(services);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, prefix = %settings.api_prefix, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
