//! depot server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use depot_client::{ControllerConfig, FetchClient, FetchConfig, Registration};
use depot_core::store::{StoreHandle, StoreTarget};
use depot_core::{AppConfig, DurableStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), origin = %config.origin, version = %config.cache_version, "Starting depot server on stdio transport");

    let handle = Arc::new(
        StoreHandle::new(StoreTarget::File(config.db_path.clone())).with_partitions(config.extra_partitions.clone()),
    );
    if let Err(e) = handle.db().await {
        tracing::error!(error = %e, "cache store unavailable; serving without persistence");
    }
    let store = DurableStore::new(Arc::clone(&handle)).with_freshness(config.freshness());

    let network = FetchClient::new(FetchConfig { user_agent: config.user_agent.clone(), ..Default::default() })?;
    let registration = Registration::with_store(handle, Arc::new(network));

    let controller_config = ControllerConfig::from_app_config(&config)?;
    match registration.restore(controller_config.clone()).await {
        Ok(true) => tracing::info!(version = %controller_config.version, "restored persisted controller"),
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "could not restore persisted controller"),
    }
    if let Err(e) = registration.register(controller_config.clone()).await {
        tracing::warn!(error = %e, "controller install failed; serving with the previous shell or the network");
    }

    let handler = handler::DepotServer::new(handler::AppState { registration, store, controller_config });
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
