mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::{Arc, Mutex},
};

use roulette_core::{
    config::{self, AppConfig},
    Backend, LocalBackend, ProfileStore, RpcBackend, SpinService,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir())?;

    let backend: Arc<dyn Backend> = match &config.remote {
        Some(remote) => Arc::new(RpcBackend::new(remote)?),
        None => Arc::new(LocalBackend::new(
            ProfileStore::new(config.profile_dir()),
            config.base_free_spins,
        )),
    };
    info!(
        backend = backend.name(),
        player = %config.player_id,
        seeded = config.seed.is_some(),
        "Starting roulette"
    );

    let service = SpinService::from_config(backend, &config);
    service
        .catalog()
        .validate(service.table())
        .context("rarity table does not match the catalog")?;

    let mut app = app::RouletteApp::new(Arc::new(service));
    app.run().await
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("roulette.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The alternate screen owns stdout, so only the file layer is installed.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
