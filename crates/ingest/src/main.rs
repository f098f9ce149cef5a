//! Standalone CLI entry point for C9: fetches every source once, builds
//! the catalog, and exits. `screening-api` triggers the same refresh
//! lazily on first request (§4.9) or on demand via `/refresh-lists`;
//! this binary is for warming a deployment's `DATA_DIR` ahead of time,
//! grounded in `original_source/src/engine.py::refresh_lists` being
//! runnable standalone as well as from the API.

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_DATA_DIR: &str = "./data";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()));
    std::fs::create_dir_all(&data_dir)?;

    tracing::info!(data_dir = %data_dir.display(), "starting standalone refresh");

    let entities = ingest::fetch_all_sources(&data_dir).await?;
    tracing::info!(entities = entities.len(), "fetched and normalised all sources");

    let catalog = ingest::CatalogHandle::new(data_dir.join("sanctions.db"), data_dir.join("name_index"));
    let generation = catalog.refresh(entities).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::info!(generation, rows = catalog.pin().entities.len(), "catalog built");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
