use anyhow::{Context, Result};
use deskflow::app::{self, proxy::LogProxy, Session};
use deskflow::config::{self, AppConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // An optional first argument overrides the config file location.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config: AppConfig = config::settings::load_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    if !config.desktop_directory.is_dir() {
        anyhow::bail!(
            "Watched directory {:?} does not exist",
            config.desktop_directory
        );
    }
    tracing::info!("Watching {:?}", config.desktop_directory);

    let mut session = Session::open(config, LogProxy);
    if let Some(path) = config_path {
        session = session.with_config_file(path);
    }
    if let Err(e) = app::commands::scan_desktop(&session).await {
        tracing::warn!("Initial scan failed: {}", e);
    }

    let pipeline =
        app::tasks::spawn_pipeline(&session).context("Failed to start directory monitoring")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    pipeline.shutdown();
    Ok(())
}
