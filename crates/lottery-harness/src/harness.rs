// Wires configuration, ledger, registry, accounts and locator for one network

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::accounts::{AccountError, AccountResolver};
use crate::config::{ConfigError, HarnessConfig};
use crate::contracts::{ArtifactError, ArtifactStore};
use crate::driver::LifecycleDriver;
use crate::keystore::{AccountStoreConfig, KeyError};
use crate::ledger::{DevLedger, Ledger, LedgerError, LedgerFactory};
use crate::locator::{ContractLocator, LocatorError};
use crate::network::NetworkContext;
use crate::registry::{DeploymentRegistry, RegistryError};
use crate::verify::VerifyError;
use crate::wait::WaitError;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Wait error: {0}")]
    Wait(#[from] WaitError<LedgerError>),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("No Lottery deployed on {0}")]
    NoLottery(String),
}

impl HarnessError {
    /// True when the chain rejected a transaction
    pub fn is_revert(&self) -> bool {
        match self {
            HarnessError::Ledger(e) => e.is_revert(),
            HarnessError::Locator(LocatorError::Ledger(e)) => e.is_revert(),
            _ => false,
        }
    }
}

pub struct Harness {
    config: Arc<HarnessConfig>,
    network: NetworkContext,
    ledger: Arc<dyn Ledger>,
    registry: Arc<DeploymentRegistry>,
    accounts: Arc<AccountResolver>,
    locator: ContractLocator,
    artifacts: Arc<ArtifactStore>,
}

impl Harness {
    /// Connect to `network` as described by `config`
    pub async fn connect(config: HarnessConfig, network: NetworkContext) -> Result<Self, HarnessError> {
        let artifacts = Arc::new(ArtifactStore::new(&config.project.artifacts_dir));
        let ledger = LedgerFactory::connect(&network, &config, artifacts.clone()).await?;
        let registry = DeploymentRegistry::for_network(&network, &config.project.deployments_dir)?;
        let store_config = AccountStoreConfig {
            keystore_dir: config.keystore_dir(),
            ..Default::default()
        };

        info!("Active network: {}", network);
        Ok(Self::from_parts(config, network, ledger, registry, store_config, artifacts))
    }

    /// Native stand-in chain with default configuration, no node or artifacts needed.
    /// [`Harness::connect`] runs `development` on Anvil when artifacts are available.
    pub fn development() -> Self {
        Self::development_with(HarnessConfig::default())
    }

    pub fn development_with(config: HarnessConfig) -> Self {
        let network = NetworkContext::development();
        let artifacts = Arc::new(ArtifactStore::new(&config.project.artifacts_dir));
        let ledger: Arc<dyn Ledger> = Arc::new(DevLedger::new(network.name()));
        let store_config = AccountStoreConfig {
            keystore_dir: config.keystore_dir(),
            ..Default::default()
        };
        Self::from_parts(config, network, ledger, DeploymentRegistry::in_memory(), store_config, artifacts)
    }

    pub fn from_parts(
        config: HarnessConfig,
        network: NetworkContext,
        ledger: Arc<dyn Ledger>,
        registry: DeploymentRegistry,
        store_config: AccountStoreConfig,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let accounts = Arc::new(AccountResolver::new(
            network.clone(),
            ledger.clone(),
            config.clone(),
            store_config,
        ));
        let locator = ContractLocator::new(
            network.clone(),
            config.clone(),
            ledger.clone(),
            registry.clone(),
            accounts.clone(),
        );

        Self {
            config,
            network,
            ledger,
            registry,
            accounts,
            locator,
            artifacts,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkContext {
        &self.network
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub fn accounts(&self) -> &AccountResolver {
        &self.accounts
    }

    pub fn locator(&self) -> &ContractLocator {
        &self.locator
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn driver(&self) -> LifecycleDriver<'_> {
        LifecycleDriver::new(self)
    }
}
