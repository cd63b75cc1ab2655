//! reqlog - minimal HTTP request logger

use clap::Parser;
use reqlog::{LoggerServer, ServerConfig, StoreConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "reqlog")]
#[command(version)]
#[command(about = "Log incoming HTTP requests to a JSON file and show them on a dashboard")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Snapshot file holding the logged records
    #[arg(short, long, env = "REQLOG_DATA_FILE", default_value = "data/logs.json")]
    data_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = ServerConfig {
        bind_addr: SocketAddr::new(cli.host, cli.port),
        store: StoreConfig::at(cli.data_file),
    };

    LoggerServer::new(config).serve().await?;
    Ok(())
}
