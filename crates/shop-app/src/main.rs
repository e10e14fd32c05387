use std::sync::Arc;

use shop_hex::application::Storefront;
use shop_hex::config::Config;
use shop_hex::inbound::http::{HttpServer, HttpServerConfig};
use shop_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // DATABASE_URL, SERVER_PORT and pricing overrides may come from .env.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    let repo: Repo = build_repo(config.database_url.as_deref()).await?;
    tracing::info!(
        backend = repo.backend(),
        currency = %config.pricing.currency,
        "storage ready"
    );
    let storefront = Storefront::new(Arc::new(repo), config.pricing.clone());

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(storefront, server_cfg).await?;
    http.run().await
}
