// Named account management
// Encrypted on-disk keystore with environment variable overrides

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

pub mod evm;
pub mod storage;

pub use evm::EvmKey;
pub use storage::{EncryptedKeystore, KeyStorage, KeystoreError, MemoryKeyStorage};

/// Errors that can occur during key management operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid key format: {0}")]
    InvalidFormat(String),

    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Password unavailable: {0}")]
    Password(String),

    #[error("Key cache lock poisoned")]
    Poisoned,
}

/// Where the password for a named account comes from
#[derive(Debug, Clone)]
pub enum PasswordSource {
    /// Read from an environment variable, falling back to an interactive prompt
    EnvOrPrompt(String),
    /// Fixed password, for tests and scripted use
    Fixed(String),
}

impl Default for PasswordSource {
    fn default() -> Self {
        PasswordSource::EnvOrPrompt("LOTTERY_ACCOUNT_PASSWORD".to_string())
    }
}

impl PasswordSource {
    pub fn password_for(&self, id: &str) -> Result<String, KeyError> {
        match self {
            PasswordSource::Fixed(password) => Ok(password.clone()),
            PasswordSource::EnvOrPrompt(var) => match std::env::var(var) {
                Ok(password) => Ok(password),
                Err(_) => rpassword::prompt_password(format!("Enter password for \"{}\": ", id))
                    .map_err(|e| KeyError::Password(e.to_string())),
            },
        }
    }
}

/// Configuration for the account store
#[derive(Debug, Clone)]
pub struct AccountStoreConfig {
    /// Directory for keystore files
    pub keystore_dir: PathBuf,
    /// Whether to allow environment variable keys
    pub allow_env_keys: bool,
    /// Environment variable prefix, e.g. `LOTTERY_ACCOUNT_DEPLOYER`
    pub env_prefix: String,
    pub password: PasswordSource,
}

impl Default for AccountStoreConfig {
    fn default() -> Self {
        Self {
            keystore_dir: PathBuf::from("~/.lottery/accounts"),
            allow_env_keys: true,
            env_prefix: "LOTTERY_ACCOUNT_".to_string(),
            password: PasswordSource::default(),
        }
    }
}

/// Named accounts persisted across runs
pub struct AccountStore {
    storage: Box<dyn KeyStorage>,
    /// Keys already unlocked in this process (id -> key)
    key_cache: Mutex<HashMap<String, EvmKey>>,
    config: AccountStoreConfig,
}

impl AccountStore {
    /// Open the encrypted keystore described by `config`
    pub fn new(config: AccountStoreConfig) -> Result<Self, KeyError> {
        let keystore_dir = shellexpand::tilde(&config.keystore_dir.to_string_lossy()).to_string();
        let storage = Box::new(EncryptedKeystore::new(PathBuf::from(keystore_dir))?);
        Ok(Self::with_storage(storage, config))
    }

    pub fn with_storage(storage: Box<dyn KeyStorage>, config: AccountStoreConfig) -> Self {
        Self {
            storage,
            key_cache: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Load a named account, unlocking it if necessary
    pub async fn load_key(&self, id: &str) -> Result<EvmKey, KeyError> {
        if let Some(key) = self.cached(id)? {
            return Ok(key);
        }

        if self.config.allow_env_keys {
            if let Ok(key) = self.load_from_env(id) {
                debug!("Loaded account '{}' from environment", id);
                self.cache(id, &key)?;
                return Ok(key);
            }
        }

        // Surface a missing id before asking for a password
        self.storage.address_of(id).await?;

        let password = self.config.password.password_for(id)?;
        let key = self.storage.load_key(id, &password).await?;
        self.cache(id, &key)?;
        Ok(key)
    }

    pub async fn store_key(&self, id: &str, key: EvmKey, password: &str) -> Result<(), KeyError> {
        key.validate()?;
        self.storage.store_key(id, &key, password).await?;
        self.cache(id, &key)
    }

    pub async fn remove_key(&self, id: &str) -> Result<(), KeyError> {
        self.storage.remove_key(id).await?;
        self.key_cache.lock().map_err(|_| KeyError::Poisoned)?.remove(id);
        Ok(())
    }

    pub async fn list_keys(&self) -> Result<Vec<String>, KeyError> {
        self.storage.list_keys().await
    }

    /// Address of a named account without unlocking it
    pub async fn address_of(&self, id: &str) -> Result<String, KeyError> {
        self.storage.address_of(id).await
    }

    fn load_from_env(&self, id: &str) -> Result<EvmKey, KeyError> {
        let env_var = format!(
            "{}{}",
            self.config.env_prefix,
            id.to_uppercase().replace('-', "_")
        );
        let key_data = std::env::var(&env_var)
            .map_err(|_| KeyError::EnvVarNotFound(env_var.clone()))?;
        EvmKey::from_env_string(&key_data)
    }

    fn cached(&self, id: &str) -> Result<Option<EvmKey>, KeyError> {
        let cache = self.key_cache.lock().map_err(|_| KeyError::Poisoned)?;
        Ok(cache.get(id).cloned())
    }

    fn cache(&self, id: &str, key: &EvmKey) -> Result<(), KeyError> {
        let mut cache = self.key_cache.lock().map_err(|_| KeyError::Poisoned)?;
        cache.insert(id.to_string(), key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store(password: &str) -> AccountStore {
        let config = AccountStoreConfig {
            allow_env_keys: false,
            password: PasswordSource::Fixed(password.to_string()),
            ..Default::default()
        };
        AccountStore::with_storage(Box::new(MemoryKeyStorage::new()), config)
    }

    #[tokio::test]
    async fn test_store_and_load_named_account() {
        let store = memory_store("pw");
        let key = EvmKey::generate();

        store.store_key("deployer", key.clone(), "pw").await.unwrap();

        let loaded = store.load_key("deployer").await.unwrap();
        assert_eq!(loaded.address, key.address);
        assert_eq!(store.list_keys().await.unwrap(), vec!["deployer".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_account_fails() {
        let store = memory_store("pw");
        assert!(matches!(store.load_key("ghost").await, Err(KeyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_env_key_takes_precedence() {
        let key = EvmKey::generate();
        std::env::set_var("LOTTERY_TEST_ACCOUNT_ENV_USER", key.private_key_hex());

        let config = AccountStoreConfig {
            env_prefix: "LOTTERY_TEST_ACCOUNT_".to_string(),
            password: PasswordSource::Fixed("unused".to_string()),
            ..Default::default()
        };
        let store = AccountStore::with_storage(Box::new(MemoryKeyStorage::new()), config);

        let loaded = store.load_key("env-user").await.unwrap();
        assert_eq!(loaded.address, key.address);

        std::env::remove_var("LOTTERY_TEST_ACCOUNT_ENV_USER");
    }
}
