use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lottery_harness::{Harness, HarnessConfig, NetworkContext};

#[derive(Parser)]
#[command(name = "lottery")]
#[command(about = "Deploy and drive the Lottery contract")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/lottery.toml")]
    pub config: String,

    /// Network to run against
    #[arg(short, long, env = "LOTTERY_NETWORK", default_value = "development")]
    pub network: String,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy a new Lottery
    Deploy,
    /// Open the latest Lottery for entries
    Start,
    /// Enter the latest Lottery from the default account
    Enter,
    /// Close the latest Lottery and wait for its winner
    End,
    /// Deploy, start, enter and end in one go
    Run,
    /// Deploy the price feed, token and coordinator mocks
    DeployMocks,
    /// Send LINK to a contract
    Fund {
        /// Recipient address
        target: String,
        /// Amount in the token's smallest unit
        #[arg(long)]
        amount: Option<String>,
    },
    /// Show the latest Lottery
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lottery_harness={0},lottery={0}", cli.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli.config)?;
    let network = NetworkContext::new(cli.network.as_str());
    let harness = Harness::connect(config, network).await?;
    let driver = harness.driver();

    match cli.command {
        Commands::Deploy => {
            let lottery = driver.deploy().await?;
            println!("{}", lottery.address());
        }
        Commands::Start => {
            driver.start().await?;
        }
        Commands::Enter => {
            driver.enter().await?;
        }
        Commands::End => {
            let winner = driver.end().await?;
            println!("{}", winner);
        }
        Commands::Run => {
            let winner = driver.run().await?;
            println!("{}", winner);
        }
        Commands::DeployMocks => {
            if !harness.network().is_local() {
                warn!("Deploying mocks to {}", harness.network());
            }
            let mocks = harness.locator().deploy_default_mocks().await?;
            println!("price_feed       {}", mocks.price_feed);
            println!("link_token       {}", mocks.link_token);
            println!("vrf_coordinator  {}", mocks.vrf_coordinator);
        }
        Commands::Fund { target, amount } => {
            let target: Address = target.parse()?;
            let amount = amount
                .map(|a| a.parse::<U256>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("Invalid amount: {}", e))?;
            harness.fund_with_token(target, None, None, amount).await?;
            info!("Funded contract!");
        }
        Commands::Status => {
            show_status(&harness).await?;
        }
    }

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<HarnessConfig> {
    if Path::new(path).exists() {
        let config = HarnessConfig::load_layered(path)?;
        info!("Loaded configuration from: {}", path);
        Ok(config)
    } else {
        warn!("{} not found, using built-in defaults", path);
        Ok(HarnessConfig::default())
    }
}

async fn show_status(harness: &Harness) -> anyhow::Result<()> {
    let lottery = harness.driver().current().await?;

    println!("Lottery        {}", lottery.address());
    println!("Network        {}", harness.network());
    println!("State          {}", lottery.state().await?);
    println!("Entrance fee   {} wei", lottery.entrance_fee().await?);
    println!("Balance        {} wei", lottery.balance().await?);
    println!("Recent winner  {}", lottery.recent_winner().await?);
    Ok(())
}
