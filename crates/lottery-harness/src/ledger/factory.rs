// Chooses the ledger backend for the active network

use std::sync::Arc;
use tracing::{info, warn};

use super::{AnvilLedger, DevLedger, Ledger, LedgerError, RpcLedger};
use crate::config::{ConfigError, DevChain, HarnessConfig};
use crate::contracts::ArtifactStore;
use crate::network::{NetworkContext, DEVELOPMENT};

pub struct LedgerFactory;

impl LedgerFactory {
    /// Anything with a host goes over JSON-RPC; `development` without one follows `[project] dev_chain`
    pub async fn connect(
        network: &NetworkContext,
        config: &HarnessConfig,
        artifacts: Arc<ArtifactStore>,
    ) -> Result<Arc<dyn Ledger>, LedgerError> {
        let host = match config.networks.get(network.name()) {
            Some(net) => net.host()?,
            None if network.name() == DEVELOPMENT => None,
            None => return Err(ConfigError::UnknownNetwork(network.name().to_string()).into()),
        };

        match host {
            Some(url) => Ok(Arc::new(RpcLedger::connect(network.name(), &url, artifacts).await?)),
            None if network.name() == DEVELOPMENT => Self::development(network, config.project.dev_chain, artifacts).await,
            None => Err(ConfigError::MissingKey {
                network: network.name().to_string(),
                key: "host".to_string(),
            }
            .into()),
        }
    }

    async fn development(
        network: &NetworkContext,
        dev_chain: DevChain,
        artifacts: Arc<ArtifactStore>,
    ) -> Result<Arc<dyn Ledger>, LedgerError> {
        match dev_chain {
            DevChain::Anvil => Ok(Arc::new(AnvilLedger::spawn(network.name(), artifacts).await?)),
            DevChain::Native => Ok(Self::native(network)),
            DevChain::Auto => {
                let missing = artifacts.missing();
                if !missing.is_empty() {
                    info!("No compiled artifacts for {:?}", missing);
                    return Ok(Self::native(network));
                }
                match AnvilLedger::spawn(network.name(), artifacts).await {
                    Ok(ledger) => Ok(Arc::new(ledger)),
                    Err(e) => {
                        warn!("Anvil unavailable ({}), falling back", e);
                        Ok(Self::native(network))
                    }
                }
            }
        }
    }

    fn native(network: &NetworkContext) -> Arc<dyn Ledger> {
        info!("Starting in-process stand-in chain");
        Arc::new(DevLedger::new(network.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ArtifactError, ContractKind};
    use crate::ledger::dev::DEV_CHAIN_ID;

    #[tokio::test]
    async fn test_development_without_artifacts_runs_in_process() {
        let temp_dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(temp_dir.path()));
        let ledger = LedgerFactory::connect(&NetworkContext::development(), &HarnessConfig::default(), artifacts)
            .await
            .unwrap();

        assert_eq!(ledger.network(), "development");
        assert_eq!(ledger.chain_id().await.unwrap(), DEV_CHAIN_ID);
        assert_eq!(ledger.local_accounts().await.unwrap().len(), 10);
        assert_eq!(ledger.local_accounts().await.unwrap()[0], DevLedger::dev_address(0));
    }

    #[tokio::test]
    async fn test_native_dev_chain_ignores_artifacts() {
        let mut config = HarnessConfig::default();
        config.project.dev_chain = DevChain::Native;
        let artifacts = Arc::new(ArtifactStore::new("build/contracts"));

        let ledger = LedgerFactory::connect(&NetworkContext::development(), &config, artifacts)
            .await
            .unwrap();
        assert_eq!(ledger.local_accounts().await.unwrap()[0], DevLedger::dev_address(0));
    }

    #[tokio::test]
    async fn test_anvil_dev_chain_requires_artifacts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.project.dev_chain = DevChain::Anvil;
        let artifacts = Arc::new(ArtifactStore::new(temp_dir.path()));

        let result = LedgerFactory::connect(&NetworkContext::development(), &config, artifacts).await;
        assert!(matches!(
            result,
            Err(LedgerError::Artifact(ArtifactError::NotFound { kind: ContractKind::Lottery, .. }))
        ));
    }

    #[tokio::test]
    async fn test_live_network_without_host_fails() {
        let mut config = HarnessConfig::default();
        if let Some(rinkeby) = config.networks.get_mut("rinkeby") {
            rinkeby.host = None;
        }
        let artifacts = Arc::new(ArtifactStore::new("build/contracts"));

        let result = LedgerFactory::connect(&NetworkContext::new("rinkeby"), &config, artifacts).await;
        assert!(matches!(
            result,
            Err(LedgerError::Config(ConfigError::MissingKey { key, .. })) if key == "host"
        ));
    }

    #[tokio::test]
    async fn test_unknown_network_fails() {
        let artifacts = Arc::new(ArtifactStore::new("build/contracts"));
        let result = LedgerFactory::connect(&NetworkContext::new("nowhere"), &HarnessConfig::default(), artifacts).await;

        assert!(matches!(result, Err(LedgerError::Config(ConfigError::UnknownNetwork(_)))));
    }
}
