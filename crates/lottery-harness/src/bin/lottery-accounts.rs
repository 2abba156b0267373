// Named account management for the lottery harness
// Stores deployer keys encrypted on disk for use with `wallets` on live networks

use clap::{Parser, Subcommand};
use lottery_harness::keystore::{AccountStore, AccountStoreConfig, EvmKey};
use lottery_harness::HarnessConfig;
use std::io::{self, Write};
use std::path::Path;

#[derive(Parser)]
#[clap(name = "lottery-accounts")]
#[clap(about = "Lottery harness account management")]
#[clap(version)]
struct Cli {
    /// Configuration file path
    #[clap(short, long, default_value = "config/lottery.toml")]
    config: String,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an existing private key
    Add {
        /// Account id
        id: String,
        /// Hex private key, prompted for when omitted
        #[clap(short, long)]
        private_key: Option<String>,
    },
    /// Create a new random account
    Generate {
        /// Account id
        id: String,
    },
    /// List stored accounts
    List,
    /// Show the address of an account
    Show {
        /// Account id
        id: String,
    },
    /// Remove an account
    Remove {
        /// Account id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let harness_config = if Path::new(&cli.config).exists() {
        HarnessConfig::load(&cli.config)?
    } else {
        HarnessConfig::default()
    };
    let store = AccountStore::new(AccountStoreConfig {
        keystore_dir: harness_config.keystore_dir(),
        ..Default::default()
    })?;

    match cli.command {
        Commands::Add { id, private_key } => {
            let private_key = match private_key {
                Some(pk) => pk,
                None => rpassword::prompt_password("Enter private key (hex): ")?,
            };
            let key = EvmKey::from_hex(&private_key)?;
            store_key(&store, &id, key).await?;
        }
        Commands::Generate { id } => {
            store_key(&store, &id, EvmKey::generate()).await?;
        }
        Commands::List => {
            list_keys(&store).await?;
        }
        Commands::Show { id } => match store.address_of(&id).await {
            Ok(address) => println!("{}: {}", id, address),
            Err(e) => println!("Failed to load account {}: {}", id, e),
        },
        Commands::Remove { id } => {
            remove_key(&store, &id).await?;
        }
    }

    Ok(())
}

async fn store_key(store: &AccountStore, id: &str, key: EvmKey) -> Result<(), Box<dyn std::error::Error>> {
    let password = rpassword::prompt_password("Enter password to encrypt the key: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        return Err("Passwords do not match".into());
    }

    let address = key.address.clone();
    store.store_key(id, key, &password).await?;
    println!("Stored account {} ({})", id, address);
    Ok(())
}

async fn list_keys(store: &AccountStore) -> Result<(), Box<dyn std::error::Error>> {
    let ids = store.list_keys().await?;
    if ids.is_empty() {
        println!("No accounts found in keystore.");
        return Ok(());
    }

    for id in ids {
        let address = store.address_of(&id).await.unwrap_or_else(|_| "?".to_string());
        println!("  {}  {}", id, address);
    }
    Ok(())
}

async fn remove_key(store: &AccountStore, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    print!("Remove account {}? (y/N): ", id);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.trim().to_lowercase() != "y" {
        println!("Cancelled.");
        return Ok(());
    }

    store.remove_key(id).await?;
    println!("Removed account {}", id);
    Ok(())
}
