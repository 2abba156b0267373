// Contract location
// Local networks get auto-deployed mocks; other networks read addresses from config

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, I256, U256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accounts::{AccountError, AccountResolver};
use crate::config::{ConfigError, HarnessConfig};
use crate::contracts::{Capability, ContractKind, ContractRef, Dependency};
use crate::ledger::values::{address, int};
use crate::ledger::{Ledger, LedgerError, TxOptions};
use crate::network::NetworkContext;
use crate::registry::{DeploymentRegistry, RegistryError};

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("No {kind} instance after deploying mocks")]
    MockMissing { kind: ContractKind },

    #[error("{target} at {address} does not satisfy {capability}; missing {missing:?}")]
    InterfaceMismatch {
        target: String,
        address: Address,
        capability: &'static str,
        missing: Vec<String>,
    },

    #[error("No contract code at {address} for {target}")]
    NoCode { target: String, address: Address },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),
}

/// Addresses produced by one mock deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDeployment {
    pub price_feed: Address,
    pub link_token: Address,
    pub vrf_coordinator: Address,
}

pub struct ContractLocator {
    network: NetworkContext,
    config: Arc<HarnessConfig>,
    ledger: Arc<dyn Ledger>,
    registry: Arc<DeploymentRegistry>,
    accounts: Arc<AccountResolver>,
}

impl ContractLocator {
    pub fn new(
        network: NetworkContext,
        config: Arc<HarnessConfig>,
        ledger: Arc<dyn Ledger>,
        registry: Arc<DeploymentRegistry>,
        accounts: Arc<AccountResolver>,
    ) -> Self {
        Self {
            network,
            config,
            ledger,
            registry,
            accounts,
        }
    }

    /// Reference to the contract standing in for `dependency` on this network
    pub async fn resolve(&self, dependency: Dependency) -> Result<ContractRef, LocatorError> {
        let kind = dependency.mock_kind();

        let address = if self.network.is_local() {
            self.local_mock(kind).await?
        } else {
            self.config
                .network(self.network.name())?
                .address(self.network.name(), dependency.config_key())?
        };

        let contract = self.contract_at(kind, address).await?;
        self.check(&contract, &dependency.to_string(), &dependency.capability()).await?;
        debug!("Resolved {} to {}", dependency, contract);
        Ok(contract)
    }

    /// Registered mock of `kind`, redeploying the set when the chain no longer holds it
    async fn local_mock(&self, kind: ContractKind) -> Result<Address, LocatorError> {
        if let Some(address) = self.registry.latest(kind)? {
            if self.ledger.has_code(address).await? {
                return Ok(address);
            }
            warn!(
                "No code at registered {} {} on {}, chain was reset; clearing deployments",
                kind, address, self.network
            );
            self.registry.clear()?;
        }

        self.deploy_default_mocks().await?;
        self.registry
            .latest(kind)?
            .ok_or(LocatorError::MockMissing { kind })
    }

    /// Pair `address` with the interface of `kind`
    pub async fn contract_at(&self, kind: ContractKind, address: Address) -> Result<ContractRef, LocatorError> {
        let interface = self.ledger.interface_of(kind).await?;
        Ok(ContractRef::new(kind, address, Arc::new(interface)))
    }

    /// Latest registered instance of `kind`, if any
    ///
    /// On local networks an entry without code belongs to an earlier chain and counts as absent.
    pub async fn latest(&self, kind: ContractKind) -> Result<Option<ContractRef>, LocatorError> {
        let Some(address) = self.registry.latest(kind)? else {
            return Ok(None);
        };
        if self.network.is_local() && !self.ledger.has_code(address).await? {
            warn!("Ignoring registered {} {} with no code on {}", kind, address, self.network);
            return Ok(None);
        }
        Ok(Some(self.contract_at(kind, address).await?))
    }

    /// Fail unless `contract` provides `capability` and has code on chain
    pub async fn check(
        &self,
        contract: &ContractRef,
        target: &str,
        capability: &Capability,
    ) -> Result<(), LocatorError> {
        let missing = contract.interface.missing(capability);
        if !missing.is_empty() {
            return Err(LocatorError::InterfaceMismatch {
                target: target.to_string(),
                address: contract.address,
                capability: capability.name,
                missing,
            });
        }

        if !self.ledger.has_code(contract.address).await? {
            return Err(LocatorError::NoCode {
                target: target.to_string(),
                address: contract.address,
            });
        }
        Ok(())
    }

    pub async fn deploy_default_mocks(&self) -> Result<MockDeployment, LocatorError> {
        self.deploy_mocks(self.config.mocks.decimals, self.config.mocks.initial_value)
            .await
    }

    /// Deploy the price feed, token and coordinator mocks, in that order
    pub async fn deploy_mocks(&self, decimals: u8, initial_value: i64) -> Result<MockDeployment, LocatorError> {
        let account = self.accounts.default_account().await?;
        let opts = TxOptions::sender(&account);
        let confirmations = self.config.lottery.confirmations;

        info!("Deploying mocks from {}", account);

        let args = vec![
            DynSolValue::Uint(U256::from(decimals), 8),
            int(I256::try_from(initial_value).map_err(|e| ConfigError::InvalidValue {
                key: "mocks.initial_value".to_string(),
                reason: e.to_string(),
            })?),
        ];
        let price_feed = self.deploy(ContractKind::MockV3Aggregator, args, &opts, confirmations).await?;
        let link_token = self.deploy(ContractKind::LinkToken, vec![], &opts, confirmations).await?;
        let vrf_coordinator = self
            .deploy(ContractKind::VrfCoordinatorMock, vec![address(link_token)], &opts, confirmations)
            .await?;

        info!("Deployed!");
        Ok(MockDeployment {
            price_feed,
            link_token,
            vrf_coordinator,
        })
    }

    async fn deploy(
        &self,
        kind: ContractKind,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
        confirmations: u64,
    ) -> Result<Address, LocatorError> {
        let receipt = self.ledger.deploy(kind, args, opts).await?;
        self.ledger.wait_for_confirmations(&receipt, confirmations).await?;

        let address = receipt
            .contract_address
            .ok_or_else(|| LedgerError::Rpc(format!("{} deployment returned no address", kind)))?;
        self.registry.record(kind, address)?;
        Ok(address)
    }
}
