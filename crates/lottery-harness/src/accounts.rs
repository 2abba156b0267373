// Account resolution: keyring index, named keystore account, or configured key

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::{ConfigError, HarnessConfig};
use crate::keystore::{AccountStore, AccountStoreConfig, EvmKey, KeyError};
use crate::ledger::{Ledger, LedgerError};
use crate::network::NetworkContext;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Keyring has {available} accounts, index {index} is out of range")]
    IndexOutOfRange { index: usize, available: usize },

    #[error("No private key available: set wallets.from_key (e.g. ${{PRIVATE_KEY}})")]
    MissingPrivateKey,

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Where an account came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOrigin {
    /// Unlocked account of the local node, by index
    Keyring(usize),
    /// Named account from the keystore
    Keystore(String),
    /// `wallets.from_key`
    PrivateKey,
}

/// A signing identity. Keyring accounts are signed for by the node.
#[derive(Debug, Clone)]
pub struct Account {
    address: Address,
    signer: Option<PrivateKeySigner>,
    origin: AccountOrigin,
}

impl Account {
    pub fn keyring(index: usize, address: Address) -> Self {
        Self {
            address,
            signer: None,
            origin: AccountOrigin::Keyring(index),
        }
    }

    pub fn from_key(key: &EvmKey, origin: AccountOrigin) -> Result<Self, KeyError> {
        let signer = key.signer()?;
        Ok(Self {
            address: signer.address(),
            signer: Some(signer),
            origin,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> Option<&PrivateKeySigner> {
        self.signer.as_ref()
    }

    pub fn origin(&self) -> &AccountOrigin {
        &self.origin
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Picks the signing account for an operation
pub struct AccountResolver {
    network: NetworkContext,
    ledger: Arc<dyn Ledger>,
    config: Arc<HarnessConfig>,
    store_config: AccountStoreConfig,
    store: OnceCell<AccountStore>,
}

impl AccountResolver {
    pub fn new(
        network: NetworkContext,
        ledger: Arc<dyn Ledger>,
        config: Arc<HarnessConfig>,
        store_config: AccountStoreConfig,
    ) -> Self {
        Self {
            network,
            ledger,
            config,
            store_config,
            store: OnceCell::new(),
        }
    }

    /// Use an already opened account store
    pub fn with_store(mut self, store: AccountStore) -> Self {
        self.store = OnceCell::new_with(Some(store));
        self
    }

    /// Resolve in order: keyring `index`, named `id`, keyring account 0 on
    /// local and forked networks, then `wallets.from_key`
    pub async fn resolve(&self, index: Option<usize>, id: Option<&str>) -> Result<Account, AccountError> {
        if let Some(index) = index {
            return self.keyring(index).await;
        }

        if let Some(id) = id {
            let key = self.store().await?.load_key(id).await?;
            debug!("Using named account '{}'", id);
            return Ok(Account::from_key(&key, AccountOrigin::Keystore(id.to_string()))?);
        }

        if self.network.uses_local_keyring() {
            return self.keyring(0).await;
        }

        let raw = match self.config.from_key() {
            Ok(Some(raw)) => raw,
            Ok(None) | Err(ConfigError::Env { .. }) => return Err(AccountError::MissingPrivateKey),
            Err(e) => return Err(e.into()),
        };
        let key = EvmKey::from_env_string(&raw)?;
        Ok(Account::from_key(&key, AccountOrigin::PrivateKey)?)
    }

    /// The default account
    pub async fn default_account(&self) -> Result<Account, AccountError> {
        self.resolve(None, None).await
    }

    async fn keyring(&self, index: usize) -> Result<Account, AccountError> {
        let accounts = self.ledger.local_accounts().await?;
        let address = accounts.get(index).copied().ok_or(AccountError::IndexOutOfRange {
            index,
            available: accounts.len(),
        })?;
        Ok(Account::keyring(index, address))
    }

    async fn store(&self) -> Result<&AccountStore, AccountError> {
        let store = self
            .store
            .get_or_try_init(|| async { AccountStore::new(self.store_config.clone()) })
            .await?;
        Ok(store)
    }
}
