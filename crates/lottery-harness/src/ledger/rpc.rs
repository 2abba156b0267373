// JSON-RPC ledger backed by an alloy provider
// Calls are encoded with the compiled artifact's ABI

use alloy::dyn_abi::{DynSolValue, EventExt, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Log, TransactionRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use super::{EventLog, Ledger, LedgerError, TransactionReceipt, TxOptions};
use crate::accounts::Account;
use crate::contracts::{ArtifactStore, ContractKind, ContractRef, Interface};
use crate::wait::{poll_until, WaitConfig, WaitError};

/// Upper bound on waiting for extra confirmations
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(600);
const CONFIRMATION_POLL: Duration = Duration::from_secs(2);

/// Map a transport or node error, recognising reverts by their message
fn rpc_error(err: impl std::fmt::Display) -> LedgerError {
    let message = err.to_string();
    if message.contains("revert") {
        LedgerError::Reverted { reason: message }
    } else {
        LedgerError::Rpc(message)
    }
}

fn decode_output(function: &Function, output: &[u8]) -> Result<Vec<DynSolValue>, LedgerError> {
    function
        .abi_decode_output(output)
        .map_err(|e| LedgerError::Rpc(format!("cannot decode {} output: {}", function.name, e)))
}

pub struct RpcLedger {
    network: String,
    url: String,
    /// Provider without a wallet; the node signs for its unlocked accounts
    provider: DynProvider,
    /// Wallet-filled providers for accounts holding a key
    signing: RwLock<HashMap<Address, DynProvider>>,
    artifacts: Arc<ArtifactStore>,
}

impl RpcLedger {
    pub async fn connect(
        network: impl Into<String>,
        url: &str,
        artifacts: Arc<ArtifactStore>,
    ) -> Result<Self, LedgerError> {
        let provider = ProviderBuilder::new().connect(url).await.map_err(rpc_error)?.erased();
        let network = network.into();
        info!("Connected to {} at {}", network, url);

        Ok(Self {
            network,
            url: url.to_string(),
            provider,
            signing: RwLock::new(HashMap::new()),
            artifacts,
        })
    }

    async fn provider_for(&self, account: &Account) -> Result<DynProvider, LedgerError> {
        let Some(signer) = account.signer() else {
            return Ok(self.provider.clone());
        };

        if let Some(provider) = self
            .signing
            .read()
            .map_err(|_| LedgerError::Poisoned)?
            .get(&account.address())
        {
            return Ok(provider.clone());
        }

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect(&self.url)
            .await
            .map_err(rpc_error)?
            .erased();
        self.signing
            .write()
            .map_err(|_| LedgerError::Poisoned)?
            .insert(account.address(), provider.clone());
        Ok(provider)
    }

    fn abi(&self, kind: ContractKind) -> Result<JsonAbi, LedgerError> {
        Ok(self.artifacts.load(kind)?.abi.clone())
    }

    fn function(abi: &JsonAbi, contract: &ContractRef, method: &str, arity: usize) -> Result<Function, LedgerError> {
        abi.function(method)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .cloned()
            .ok_or_else(|| LedgerError::UnknownMethod {
                contract: contract.kind.contract_name().to_string(),
                method: method.to_string(),
            })
    }

    /// Decode logs emitted by any contract whose artifact is available
    fn decode_logs(&self, logs: &[Log]) -> Vec<EventLog> {
        let artifacts = self.artifacts.load_all();
        logs.iter()
            .filter_map(|log| {
                let topic0 = *log.topics().first()?;
                let event = artifacts
                    .iter()
                    .flat_map(|artifact| artifact.abi.events())
                    .find(|event| !event.anonymous && event.selector() == topic0)?;
                let decoded = event.decode_log(log.data()).ok()?;

                let mut indexed = decoded.indexed.into_iter();
                let mut body = decoded.body.into_iter();
                let fields = event
                    .inputs
                    .iter()
                    .filter_map(|param| {
                        let value = if param.indexed { indexed.next() } else { body.next() }?;
                        Some((param.name.clone(), value))
                    })
                    .collect();

                Some(EventLog {
                    address: log.address(),
                    name: event.name.clone(),
                    fields,
                })
            })
            .collect()
    }

    async fn submit(
        &self,
        from: &Account,
        request: TransactionRequest,
    ) -> Result<TransactionReceipt, LedgerError> {
        let provider = self.provider_for(from).await?;
        let receipt = provider
            .send_transaction(request.with_from(from.address()))
            .await
            .map_err(rpc_error)?
            .get_receipt()
            .await
            .map_err(rpc_error)?;

        if !receipt.status() {
            return Err(LedgerError::revert(format!(
                "transaction {} failed",
                receipt.transaction_hash
            )));
        }

        Ok(TransactionReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            events: self.decode_logs(receipt.inner.logs()),
        })
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    fn network(&self) -> &str {
        &self.network
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn local_accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.provider.get_accounts().await.map_err(rpc_error)
    }

    async fn interface_of(&self, kind: ContractKind) -> Result<Interface, LedgerError> {
        Ok(self.artifacts.load(kind)?.interface())
    }

    async fn deploy(
        &self,
        kind: ContractKind,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError> {
        let artifact = self.artifacts.load(kind)?;
        if artifact.bytecode.is_empty() {
            return Err(LedgerError::InvalidArguments(format!("{} artifact has no bytecode", kind)));
        }

        let mut code = artifact.bytecode.to_vec();
        if let Some(constructor) = artifact.abi.constructor() {
            let encoded = constructor
                .abi_encode_input(&args)
                .map_err(|e| LedgerError::InvalidArguments(e.to_string()))?;
            code.extend_from_slice(&encoded);
        } else if !args.is_empty() {
            return Err(LedgerError::InvalidArguments(format!("{} takes no constructor arguments", kind)));
        }

        let request = TransactionRequest::default()
            .with_deploy_code(Bytes::from(code))
            .with_value(opts.value);
        let receipt = self.submit(opts.from, request).await?;

        if let Some(address) = receipt.contract_address {
            info!("Deployed {} at {} (block {})", kind, address, receipt.block_number);
        }
        Ok(receipt)
    }

    async fn transact(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError> {
        let abi = self.abi(contract.kind)?;
        let function = Self::function(&abi, contract, method, args.len())?;
        let input = function
            .abi_encode_input(&args)
            .map_err(|e| LedgerError::InvalidArguments(e.to_string()))?;

        let request = TransactionRequest::default()
            .with_to(contract.address)
            .with_input(Bytes::from(input))
            .with_value(opts.value);
        let receipt = self.submit(opts.from, request).await?;

        debug!("{}.{} mined in block {}", contract, method, receipt.block_number);
        Ok(receipt)
    }

    async fn call(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        let abi = self.abi(contract.kind)?;
        let function = Self::function(&abi, contract, method, args.len())?;
        let input = function
            .abi_encode_input(&args)
            .map_err(|e| LedgerError::InvalidArguments(e.to_string()))?;

        let request = TransactionRequest::default()
            .with_to(contract.address)
            .with_input(Bytes::from(input));
        let output = self.provider.call(request).await.map_err(rpc_error)?;
        decode_output(&function, &output)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        self.provider.get_balance(address).await.map_err(rpc_error)
    }

    async fn has_code(&self, address: Address) -> Result<bool, LedgerError> {
        let code = self.provider.get_code_at(address).await.map_err(rpc_error)?;
        Ok(!code.is_empty())
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn wait_for_confirmations(
        &self,
        receipt: &TransactionReceipt,
        confirmations: u64,
    ) -> Result<(), LedgerError> {
        // The receipt itself is the first confirmation
        let target = receipt.block_number + confirmations.saturating_sub(1);
        let wait = WaitConfig {
            timeout: CONFIRMATION_TIMEOUT,
            poll_interval: CONFIRMATION_POLL,
        };

        let provider = &self.provider;
        poll_until(&format!("{} confirmations of {}", confirmations, receipt.tx_hash), &wait, || async move {
            let current = provider.get_block_number().await.map_err(rpc_error)?;
            Ok::<_, LedgerError>((current >= target).then_some(()))
        })
        .await
        .map_err(|e| match e {
            WaitError::Check(inner) => inner,
            timeout => LedgerError::Timeout(timeout.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_output_is_decoded_with_the_abi() {
        let abi: JsonAbi = serde_json::from_str(
            r#"[{"type":"function","name":"getEntranceFee","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"}]"#,
        )
        .unwrap();
        let function = &abi.function("getEntranceFee").unwrap()[0];

        let fee = U256::from(25_000_000_000_000_000u64);
        let decoded = decode_output(function, &fee.to_be_bytes::<32>()).unwrap();
        assert_eq!(decoded, vec![DynSolValue::Uint(fee, 256)]);

        assert!(matches!(decode_output(function, &[0u8; 4]), Err(LedgerError::Rpc(msg)) if msg.contains("getEntranceFee")));
    }

    #[test]
    fn test_revert_messages_are_classified() {
        assert!(rpc_error("server returned an error response: execution reverted: Not enough ETH!").is_revert());
        assert!(matches!(rpc_error("connection refused"), LedgerError::Rpc(_)));
    }
}
