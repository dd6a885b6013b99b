//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that open both
//! stores and wire them into a running MCP tool handler.

use crate::tools::CompanionTools;
use anyhow::{Context, Result};
use companion_memory::config::CompanionConfig;
use companion_memory::memory::{JournalStore, RecordStore};
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

type SharedState = (
    Arc<Mutex<RecordStore>>,
    Arc<Mutex<JournalStore>>,
    Arc<CompanionConfig>,
);

/// Open both databases and wrap everything in `Arc` for sharing across sessions.
fn setup_shared_state(config: CompanionConfig) -> Result<SharedState> {
    let records = RecordStore::open(&config.storage).with_context(|| {
        format!(
            "failed to open record store at {}",
            config.storage.memory_db_path().display()
        )
    })?;
    tracing::info!(db = %config.storage.memory_db_path().display(), "record store ready");

    let journal = JournalStore::open(&config.storage).with_context(|| {
        format!(
            "failed to open journal at {}",
            config.storage.journal_db_path().display()
        )
    })?;
    tracing::info!(db = %config.storage.journal_db_path().display(), "journal ready");

    Ok((
        Arc::new(Mutex::new(records)),
        Arc::new(Mutex::new(journal)),
        Arc::new(config),
    ))
}

/// Start the server on the transport named in the config.
pub async fn serve(config: CompanionConfig) -> Result<()> {
    match config.server.transport.as_str() {
        "http" => serve_http(config).await,
        "stdio" => serve_stdio(config).await,
        other => anyhow::bail!("unknown transport: {other} (expected stdio or http)"),
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CompanionConfig) -> Result<()> {
    tracing::info!("starting companion memory MCP server on stdio");

    let (records, journal, config) = setup_shared_state(config)?;

    let tools = CompanionTools::new(records, journal, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP at `/mcp`.
pub async fn serve_http(config: CompanionConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting companion memory MCP server on HTTP");

    let (records, journal, config) = setup_shared_state(config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || {
            Ok(CompanionTools::new(
                records.clone(),
                journal.clone(),
                config.clone(),
            ))
        },
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
