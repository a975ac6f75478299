use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use medley_server::{App, ServerConfig, router};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Medley music library server.
#[derive(Debug, Parser)]
#[command(name = "medley-server", version)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Directory holding the server state.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory the `$home` root stands for.
    #[arg(long)]
    home_dir: Option<PathBuf>,

    /// Log filter, e.g. `medley_library=debug`.
    #[arg(long)]
    log_filter: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(home_dir) = self.home_dir {
            config.home_dir = home_dir;
        }
        if self.log_filter.is_some() {
            config.log_filter = self.log_filter;
        }
        Ok(config)
    }
}

fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;
    init_tracing(config.log_filter.as_deref());

    let app = App::start(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(app.handler()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
