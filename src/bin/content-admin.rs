//! Admin CLI
//!
//! Lists, adds and removes storage nodes through a router's admin plane.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::time::Duration;
use vidstore::client::{AdminClient, ClientOptions};

#[derive(Parser, Debug)]
#[command(name = "content-admin")]
#[command(about = "Manage the storage nodes behind a content router", long_about = None)]
struct Args {
    /// Router admin address
    #[arg(short, long, default_value = "localhost:8081")]
    admin: String,

    /// Give up on a call after this many seconds (0 waits for migrations to finish)
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show live storage nodes
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a storage node and move the files it now owns onto it
    Add { endpoint: String },
    /// Remove a storage node after moving its files away
    Remove { endpoint: String },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let options = ClientOptions {
        io_timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        max_idle: 1,
        ..ClientOptions::default()
    };
    let admin = AdminClient::new(args.admin.as_str(), options);

    match args.command {
        Command::List { json } => {
            let nodes = admin
                .list_nodes()
                .with_context(|| format!("ListNodes via {}", args.admin))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else {
                for node in &nodes {
                    println!("{}", node);
                }
            }
        }
        Command::Add { endpoint } => {
            let migrated = admin
                .add_node(&endpoint)
                .with_context(|| format!("AddNode {}", endpoint))?;
            println!("Added {}; migrated {} file(s)", endpoint, migrated);
        }
        Command::Remove { endpoint } => {
            let migrated = admin
                .remove_node(&endpoint)
                .with_context(|| format!("RemoveNode {}", endpoint))?;
            println!("Removed {}; migrated {} file(s)", endpoint, migrated);
        }
    }

    Ok(())
}
