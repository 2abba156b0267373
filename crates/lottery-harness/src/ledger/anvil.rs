// Development chain on a spawned Anvil node
// Runs the compiled artifacts on a real EVM; the node lives as long as the ledger

use alloy::dyn_abi::DynSolValue;
use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::dev::DEV_CHAIN_ID;
use super::{Ledger, LedgerError, RpcLedger, TransactionReceipt, TxOptions};
use crate::contracts::{ArtifactError, ArtifactStore, ContractKind, ContractRef, Interface};

pub struct AnvilLedger {
    rpc: RpcLedger,
    _instance: AnvilInstance,
}

impl AnvilLedger {
    /// Start a fresh node and connect to it.
    /// Fails without spawning when any compiled artifact is missing.
    pub async fn spawn(network: impl Into<String>, artifacts: Arc<ArtifactStore>) -> Result<Self, LedgerError> {
        if let Some(kind) = artifacts.missing().first().copied() {
            return Err(ArtifactError::NotFound {
                kind,
                path: artifacts.path_for(kind),
            }
            .into());
        }

        let instance = Anvil::new()
            .chain_id(DEV_CHAIN_ID)
            .try_spawn()
            .map_err(|e| LedgerError::Rpc(format!("cannot start anvil: {}", e)))?;
        info!(
            "Started Anvil at {} (chain {}, {} accounts)",
            instance.endpoint(),
            instance.chain_id(),
            instance.addresses().len()
        );

        let rpc = RpcLedger::connect(network, &instance.endpoint(), artifacts).await?;
        Ok(Self {
            rpc,
            _instance: instance,
        })
    }
}

#[async_trait]
impl Ledger for AnvilLedger {
    fn network(&self) -> &str {
        self.rpc.network()
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.rpc.chain_id().await
    }

    async fn local_accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.rpc.local_accounts().await
    }

    async fn interface_of(&self, kind: ContractKind) -> Result<Interface, LedgerError> {
        self.rpc.interface_of(kind).await
    }

    async fn deploy(
        &self,
        kind: ContractKind,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.rpc.deploy(kind, args, opts).await
    }

    async fn transact(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.rpc.transact(contract, method, args, opts).await
    }

    async fn call(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        self.rpc.call(contract, method, args).await
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        self.rpc.balance(address).await
    }

    async fn has_code(&self, address: Address) -> Result<bool, LedgerError> {
        self.rpc.has_code(address).await
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.rpc.block_number().await
    }

    async fn wait_for_confirmations(
        &self,
        receipt: &TransactionReceipt,
        confirmations: u64,
    ) -> Result<(), LedgerError> {
        self.rpc.wait_for_confirmations(receipt, confirmations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_requires_every_artifact() {
        let temp_dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(temp_dir.path()));

        let result = AnvilLedger::spawn("development", artifacts).await;
        assert!(matches!(
            result,
            Err(LedgerError::Artifact(ArtifactError::NotFound { kind: ContractKind::Lottery, .. }))
        ));
    }
}
