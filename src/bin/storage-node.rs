//! Storage node binary
//!
//! Serves one local directory over the storage protocol.

use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::process;
use vidstore::{Config, NodeServer, NodeServerConfig};

#[derive(Parser, Debug)]
#[command(name = "storage-node")]
#[command(about = "Video segment storage node", long_about = None)]
struct Args {
    /// Configuration file; its [node] section overrides the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host address to listen on
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8090)]
    port: u16,

    /// Storage directory
    base_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let config = match args.config.as_ref().map(Config::load).transpose() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let log_level = config
        .as_ref()
        .map(|c| c.server.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let node_config = match config.as_ref().and_then(|c| c.node.as_ref()) {
        Some(node) => node.server_config(),
        None => match args.base_dir {
            Some(base_dir) => NodeServerConfig {
                bind_addr: format!("{}:{}", args.host, args.port),
                storage_root: base_dir,
            },
            None => {
                log::error!("A storage directory is required (BASE_DIR or [node] in --config)");
                process::exit(1);
            }
        },
    };

    log::info!("Starting storage node");
    log::info!("  Bind address: {}", node_config.bind_addr);
    log::info!("  Storage root: {}", node_config.storage_root.display());

    let server = match NodeServer::bind(&node_config) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to create server: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        log::error!("Server error: {}", e);
        process::exit(1);
    }
}
