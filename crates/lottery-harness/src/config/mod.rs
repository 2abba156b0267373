// Harness configuration
// Network-keyed settings loaded from TOML, with optional LOTTERY__* environment overrides

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or reading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Layered configuration error: {0}")]
    Layered(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Network '{0}' is not configured")]
    UnknownNetwork(String),

    #[error("Missing configuration key '{key}' for network '{network}'")]
    MissingKey { network: String, key: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Environment variable in '{key}' could not be expanded: {reason}")]
    Env { key: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub wallets: WalletsConfig,
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
    #[serde(default)]
    pub mocks: MockConfig,
    #[serde(default)]
    pub lottery: LotteryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding compiled contract artifacts (`<Name>.json`)
    pub artifacts_dir: PathBuf,
    /// Directory where per-network deployment maps are persisted
    pub deployments_dir: PathBuf,
    /// Directory of the encrypted named-account keystore
    pub keystore_dir: PathBuf,
    /// Backend for `development` when it has no host
    #[serde(default)]
    pub dev_chain: DevChain,
}

/// How the `development` network is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevChain {
    /// Anvil when every compiled artifact is present, the native stand-in otherwise
    #[default]
    Auto,
    /// Always spawn Anvil; fail if it cannot start
    Anvil,
    /// In-process stand-in contracts, no external node
    Native,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let keystore_dir = dirs::home_dir()
            .map(|home| home.join(".lottery").join("accounts"))
            .unwrap_or_else(|| PathBuf::from("~/.lottery/accounts"));

        Self {
            artifacts_dir: PathBuf::from("build/contracts"),
            deployments_dir: PathBuf::from("build/deployments"),
            keystore_dir,
            dev_chain: DevChain::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletsConfig {
    /// Private key used on live networks, usually `${PRIVATE_KEY}`
    pub from_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint; absent for `development`, which spawns its own chain
    pub host: Option<String>,
    /// LINK fee paid per randomness request
    pub fee: Option<u64>,
    /// VRF key hash identifying the oracle job
    pub keyhash: Option<String>,
    /// Publish contract source to the block explorer after deployment
    #[serde(default)]
    pub verify: bool,
    /// Etherscan-compatible API endpoint used for verification
    pub explorer: Option<String>,
    pub eth_usd_price_feed: Option<String>,
    pub vrf_coordinator: Option<String>,
    pub link_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Decimals reported by the mock price feed
    pub decimals: u8,
    /// Initial mock answer (2000 USD with 8 decimals)
    pub initial_value: i64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            decimals: 8,
            initial_value: 200_000_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LotteryConfig {
    /// Wei added on top of the entrance fee so price drift cannot reject the entry
    pub entry_margin: u64,
    /// LINK sent to the lottery before ending it
    pub fund_amount: u64,
    /// Confirmations awaited after each transaction
    pub confirmations: u64,
    /// Deadline for the oracle callback after `endLottery`
    pub callback_timeout: String,
    /// Interval between callback polls
    pub poll_interval: String,
    /// Deliver the VRF callback from the harness on local networks
    pub simulate_oracle: bool,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            entry_margin: 100_000_000,
            fund_amount: 100_000_000_000_000_000,
            confirmations: 1,
            callback_timeout: "180s".to_string(),
            poll_interval: "5s".to_string(),
            simulate_oracle: true,
        }
    }
}

impl LotteryConfig {
    pub fn callback_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("lottery.callback_timeout", &self.callback_timeout)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration("lottery.poll_interval", &self.poll_interval)
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Expand `${VAR}` and `~` in a configured string
pub fn expand(key: &str, value: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| ConfigError::Env {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

impl NetworkConfig {
    /// RPC endpoint with environment variables expanded
    pub fn host(&self) -> Result<Option<String>, ConfigError> {
        self.host
            .as_deref()
            .map(|host| expand("host", host))
            .transpose()
    }

    pub fn fee(&self, network: &str) -> Result<U256, ConfigError> {
        self.fee
            .map(U256::from)
            .ok_or_else(|| missing(network, "fee"))
    }

    pub fn keyhash(&self, network: &str) -> Result<B256, ConfigError> {
        let raw = self.keyhash.as_deref().ok_or_else(|| missing(network, "keyhash"))?;
        B256::from_str(raw).map_err(|e| ConfigError::InvalidValue {
            key: "keyhash".to_string(),
            reason: e.to_string(),
        })
    }

    /// Address configured under one of the dependency keys
    pub fn address(&self, network: &str, key: &str) -> Result<Address, ConfigError> {
        let raw = match key {
            "eth_usd_price_feed" => self.eth_usd_price_feed.as_deref(),
            "vrf_coordinator" => self.vrf_coordinator.as_deref(),
            "link_token" => self.link_token.as_deref(),
            _ => None,
        }
        .ok_or_else(|| missing(network, key))?;

        Address::from_str(raw).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

fn missing(network: &str, key: &str) -> ConfigError {
    ConfigError::MissingKey {
        network: network.to_string(),
        key: key.to_string(),
    }
}

impl HarnessConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the TOML file and apply `LOTTERY__SECTION__KEY` environment overrides
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let layered = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("LOTTERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(layered.try_deserialize()?)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get network configuration by name
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }

    /// The live-network private key, expanded from the environment
    pub fn from_key(&self) -> Result<Option<String>, ConfigError> {
        match self.wallets.from_key.as_deref() {
            Some(raw) => {
                let key = expand("wallets.from_key", raw)?;
                Ok(Some(key).filter(|k| !k.trim().is_empty()))
            }
            None => Ok(None),
        }
    }

    /// Keystore directory with `~` expanded
    pub fn keystore_dir(&self) -> PathBuf {
        let raw = self.project.keystore_dir.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut networks = HashMap::new();

        // Spawned Anvil or the native stand-in, with auto-deployed mocks
        networks.insert("development".to_string(), NetworkConfig {
            fee: Some(100_000_000_000_000_000),
            keyhash: Some("0x2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311".to_string()),
            ..Default::default()
        });

        // External ganache or anvil node; mocks are deployed from artifacts
        networks.insert("ganache-local".to_string(), NetworkConfig {
            host: Some("http://127.0.0.1:8545".to_string()),
            fee: Some(100_000_000_000_000_000),
            keyhash: Some("0x2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311".to_string()),
            ..Default::default()
        });

        networks.insert("mainnet-fork".to_string(), NetworkConfig {
            host: Some("http://127.0.0.1:8545".to_string()),
            fee: Some(2_000_000_000_000_000_000),
            keyhash: Some("0xAA77729D3466CA35AE8D28B3BBAC7CC36A5031EFDC430821C02BC31A238AF445".to_string()),
            eth_usd_price_feed: Some("0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419".to_string()),
            vrf_coordinator: Some("0xf0d54349aDdcf704F77AE15b96510dEA15cb7952".to_string()),
            link_token: Some("0x514910771AF9Ca656af840dff83E8264EcF986CA".to_string()),
            ..Default::default()
        });

        networks.insert("rinkeby".to_string(), NetworkConfig {
            host: Some("https://rinkeby.infura.io/v3/${WEB3_INFURA_PROJECT_ID}".to_string()),
            fee: Some(100_000_000_000_000_000),
            keyhash: Some("0x2ed0feb3e7fd2022120aa84fab1945545a9f2ffc9076fd6156fa96eaff4c1311".to_string()),
            verify: true,
            explorer: Some("https://api-rinkeby.etherscan.io/api".to_string()),
            eth_usd_price_feed: Some("0x8A753747A1Fa494EC906cE90E9f37563A8AF630e".to_string()),
            vrf_coordinator: Some("0xb3dCcb4Cf7a26f6cf6B120Cf5A73875B7BBc655B".to_string()),
            link_token: Some("0x01BE23585060835E02B77ef475b0Cc51aA1e0709".to_string()),
        });

        Self {
            project: ProjectConfig::default(),
            wallets: WalletsConfig {
                from_key: Some("${PRIVATE_KEY}".to_string()),
            },
            networks,
            mocks: MockConfig::default(),
            lottery: LotteryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_network() {
        let config = HarnessConfig::default();
        let dev = config.network("development").unwrap();

        assert!(dev.host.is_none());
        assert_eq!(dev.fee("development").unwrap(), U256::from(100_000_000_000_000_000u64));
        assert!(!dev.verify);
        assert!(dev.keyhash("development").is_ok());
    }

    #[test]
    fn test_missing_dependency_address() {
        let config = HarnessConfig::default();
        let dev = config.network("development").unwrap();

        match dev.address("development", "eth_usd_price_feed") {
            Err(ConfigError::MissingKey { network, key }) => {
                assert_eq!(network, "development");
                assert_eq!(key, "eth_usd_price_feed");
            }
            other => panic!("Expected MissingKey, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_network() {
        let config = HarnessConfig::default();
        assert!(matches!(config.network("kovan"), Err(ConfigError::UnknownNetwork(_))));
    }

    #[test]
    fn test_lottery_durations() {
        let mut lottery = LotteryConfig::default();
        assert_eq!(lottery.callback_timeout().unwrap(), Duration::from_secs(180));

        lottery.poll_interval = "soon".to_string();
        assert!(lottery.poll_interval().is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_networks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("lottery.toml");

        HarnessConfig::default().save(&path).unwrap();
        let loaded = HarnessConfig::load(&path).unwrap();

        let rinkeby = loaded.network("rinkeby").unwrap();
        assert!(rinkeby.verify);
        assert!(rinkeby.address("rinkeby", "vrf_coordinator").is_ok());
    }
}
