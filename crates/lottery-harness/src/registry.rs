// Deployment registry
// Latest deployed address per contract kind, persisted per network outside development

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::contracts::ContractKind;
use crate::network::{NetworkContext, DEVELOPMENT};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Registry lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub address: Address,
    pub deployed_at: DateTime<Utc>,
}

type Entries = BTreeMap<ContractKind, Vec<Deployment>>;

pub struct DeploymentRegistry {
    entries: RwLock<Entries>,
    /// Backing file; `None` keeps the registry in memory
    path: Option<PathBuf>,
}

impl DeploymentRegistry {
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Entries::new()),
            path: None,
        }
    }

    /// Open the registry stored at `path`, starting empty if it does not exist yet
    pub fn persistent<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            Entries::new()
        };
        debug!("Loaded deployment registry from {}", path.display());

        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }

    /// The development chain lives only as long as the process, so its registry does too
    pub fn for_network<P: AsRef<Path>>(network: &NetworkContext, deployments_dir: P) -> Result<Self, RegistryError> {
        if network.name() == DEVELOPMENT {
            Ok(Self::in_memory())
        } else {
            Self::persistent(deployments_dir.as_ref().join(format!("{}.json", network.name())))
        }
    }

    pub fn record(&self, kind: ContractKind, address: Address) -> Result<Deployment, RegistryError> {
        let deployment = Deployment {
            address,
            deployed_at: Utc::now(),
        };

        let mut entries = self.entries.write().map_err(|_| RegistryError::Poisoned)?;
        entries.entry(kind).or_default().push(deployment.clone());
        self.save(&entries)?;

        debug!("Recorded {} at {}", kind, address);
        Ok(deployment)
    }

    /// Most recently recorded address of `kind`
    pub fn latest(&self, kind: ContractKind) -> Result<Option<Address>, RegistryError> {
        let entries = self.entries.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(entries.get(&kind).and_then(|list| list.last()).map(|d| d.address))
    }

    /// Every recorded deployment of `kind`, oldest first
    pub fn all(&self, kind: ContractKind) -> Result<Vec<Deployment>, RegistryError> {
        let entries = self.entries.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(entries.get(&kind).cloned().unwrap_or_default())
    }

    pub fn clear(&self) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().map_err(|_| RegistryError::Poisoned)?;
        entries.clear();
        self.save(&entries)
    }

    fn save(&self, entries: &Entries) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_latest_returns_most_recent() {
        let registry = DeploymentRegistry::in_memory();
        assert_eq!(registry.latest(ContractKind::LinkToken).unwrap(), None);

        registry.record(ContractKind::LinkToken, Address::repeat_byte(1)).unwrap();
        registry.record(ContractKind::LinkToken, Address::repeat_byte(2)).unwrap();

        assert_eq!(registry.latest(ContractKind::LinkToken).unwrap(), Some(Address::repeat_byte(2)));
        assert_eq!(registry.all(ContractKind::LinkToken).unwrap().len(), 2);
        assert_eq!(registry.latest(ContractKind::Lottery).unwrap(), None);
    }

    #[test]
    fn test_persistent_registry_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let network = NetworkContext::new("ganache-local");

        let registry = DeploymentRegistry::for_network(&network, temp_dir.path()).unwrap();
        registry.record(ContractKind::Lottery, Address::repeat_byte(9)).unwrap();
        assert!(temp_dir.path().join("ganache-local.json").exists());

        let reopened = DeploymentRegistry::for_network(&network, temp_dir.path()).unwrap();
        assert_eq!(reopened.latest(ContractKind::Lottery).unwrap(), Some(Address::repeat_byte(9)));

        reopened.clear().unwrap();
        let cleared = DeploymentRegistry::for_network(&network, temp_dir.path()).unwrap();
        assert!(cleared.all(ContractKind::Lottery).unwrap().is_empty());
    }

    #[test]
    fn test_development_registry_is_not_written() {
        let temp_dir = tempdir().unwrap();
        let registry = DeploymentRegistry::for_network(&NetworkContext::development(), temp_dir.path()).unwrap();
        registry.record(ContractKind::Lottery, Address::repeat_byte(3)).unwrap();

        assert!(!temp_dir.path().join("development.json").exists());
    }
}
