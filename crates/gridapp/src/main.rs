use std::sync::Arc;

use clap::Parser;
use eyre::Result;
use gridapp::cli::Cli;
use gridapp_core::config::{env_mode, load_env_files};
use gridapp_core::hub::{DetachedHub, HubConnector, LocalHub};
use gridapp_core::{GridAppConfig, MountedSession};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Env files must be loaded before anything reads the environment
    let env_dir = match &cli.env_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let env_files = load_env_files(&env_dir, &env_mode());

    // Initialize tracing (level configured via RUST_LOG env var)
    gridapp_core::utils::tracing::init_tracing()?;
    env_files.log();

    let mut config = GridAppConfig::from_env()?;
    cli.apply(&mut config);

    let connector: Arc<dyn HubConnector> = match &cli.local_hub {
        Some(path) => Arc::new(LocalHub::from_settings_file(path)?),
        None => Arc::new(DetachedHub),
    };

    info!(
        dev_mode = config.dev_mode,
        product_id = %config.product_id,
        local_hub = cli.local_hub.is_some(),
        "Mounting gridapp session"
    );
    let session = MountedSession::mount(&config, connector);

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    gridapp::kiosk::run(session, input, &mut stdout, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, quit with the `quit` command");
        std::future::pending::<()>().await;
    }
}
