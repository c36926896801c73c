use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use cloud_wallet::accounts::ACCOUNTS_KEY;
use cloud_wallet::blockchain::{ChainApi, RpcChainClient};
use cloud_wallet::config::load_config;
use cloud_wallet::fuel::ResourceProviderClient;
use cloud_wallet::observability::logging::init_logging;
use cloud_wallet::session::LOGGED_KEY;
use cloud_wallet::storage::{FileStore, KeyValueStore};

#[derive(Parser)]
#[command(name = "cloud-cli")]
#[command(about = "Inspection CLI for cloud wallet sessions", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "cloud-wallet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate,
    /// Probe the resource provider
    Probe,
    /// List accounts controlled by a public key
    Accounts {
        public_key: String,
    },
    /// Show the session persisted in a store file
    Session {
        store: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Session { store } = &cli.command {
        return print_session(store);
    }

    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    match cli.command {
        Commands::Validate => {
            let strategy = config.login_strategy()?;
            println!(
                "{}: ok (chain {}, login {}, resource provider {})",
                cli.config.display(),
                config.chain.chain_id,
                strategy.name(),
                if config.fuel.is_some() { "on" } else { "off" }
            );
        }
        Commands::Probe => {
            let Some(fuel) = &config.fuel else {
                eprintln!("Error: no [fuel] section in {}", cli.config.display());
                return Ok(());
            };
            let client = ResourceProviderClient::new(&fuel.rpc_endpoint, fuel.request_timeout_secs);
            let available = client.is_available().await;
            println!(
                "{} {}",
                fuel.rpc_endpoint,
                if available { "available" } else { "unavailable" }
            );
        }
        Commands::Accounts { public_key } => {
            let chain = RpcChainClient::new(&config.chain.rpc_endpoint, config.chain.rpc_timeout_secs)?;
            let accounts = chain.get_key_accounts(&public_key).await?;
            println!("{}", serde_json::to_string_pretty(&accounts)?);
        }
        Commands::Session { .. } => {}
    }

    Ok(())
}

fn print_session(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::new(path);
    for key in [LOGGED_KEY, ACCOUNTS_KEY] {
        match store.get(key)? {
            Some(raw) => {
                let json: Value = serde_json::from_str(&raw)?;
                println!("{}:\n{}", key, serde_json::to_string_pretty(&json)?);
            }
            None => println!("{}: (none)", key),
        }
    }
    Ok(())
}
