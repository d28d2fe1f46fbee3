use clap::Parser;
use redis_dispatch::config::tracing_level;
use redis_dispatch::{RedisServer, ServerConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redis-dispatch")]
#[command(about = "Redis-compatible list server with blocking pops")]
struct Args {
    /// Configuration file (redis.conf syntax)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config = config.with_bind(bind);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    // RUST_LOG wins over loglevel from the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level(&config.loglevel)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    info!("redis-dispatch starting...");
    if let Some(path) = &args.config {
        info!("Configuration loaded from {}", path.display());
    }
    info!("Server will bind to {}", config.addr());
    info!("Databases: {}, maxclients: {}", config.databases, config.maxclients);
    if config.use_consensus {
        info!("Consensus gate enabled, role: {}", config.node_role().name());
    }

    let server = RedisServer::new(config);
    server.run().await?;

    Ok(())
}
