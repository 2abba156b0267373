// Ledger abstraction
// One interface over JSON-RPC nodes (spawned Anvil included) and the in-process stand-in chain

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::accounts::Account;
use crate::config::ConfigError;
use crate::contracts::{ArtifactError, ContractKind, ContractRef, Interface};

pub mod anvil;
pub mod dev;
pub mod factory;
pub mod rpc;
pub mod values;

pub use anvil::AnvilLedger;
pub use dev::DevLedger;
pub use factory::LedgerFactory;
pub use rpc::RpcLedger;

/// Errors surfaced by a ledger backend
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The virtual machine rejected the transaction or call
    #[error("Transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("No contract deployed at {0}")]
    UnknownContract(Address),

    #[error("{contract} has no method '{method}'")]
    UnknownMethod { contract: String, method: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Account {0} cannot sign on this network")]
    UnknownAccount(Address),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Ledger state lock poisoned")]
    Poisoned,
}

impl LedgerError {
    pub fn revert(reason: impl Into<String>) -> Self {
        LedgerError::Reverted { reason: reason.into() }
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, LedgerError::Reverted { .. })
    }
}

/// Sender and attached value for a state-changing call
#[derive(Debug, Clone)]
pub struct TxOptions<'a> {
    pub from: &'a Account,
    pub value: U256,
}

impl<'a> TxOptions<'a> {
    pub fn sender(from: &'a Account) -> Self {
        Self { from, value: U256::ZERO }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A decoded event emitted during a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    pub address: Address,
    pub name: String,
    pub fields: Vec<(String, DynSolValue)>,
}

impl EventLog {
    pub fn field(&self, name: &str) -> Option<&DynSolValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// Result of a mined transaction
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub events: Vec<EventLog>,
}

impl TransactionReceipt {
    /// First event with the given name
    pub fn event(&self, name: &str) -> Option<&EventLog> {
        self.events.iter().find(|event| event.name == name)
    }
}

/// Generic ledger interface used by every harness component
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Name of the network this ledger is connected to
    fn network(&self) -> &str;

    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Unlocked accounts provided by the node (the local keyring)
    async fn local_accounts(&self) -> Result<Vec<Address>, LedgerError>;

    /// Interface a contract of this kind exposes on this ledger
    async fn interface_of(&self, kind: ContractKind) -> Result<Interface, LedgerError>;

    /// Deploy a contract and wait for its receipt
    async fn deploy(
        &self,
        kind: ContractKind,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError>;

    /// Submit a state-changing call and wait for its receipt
    async fn transact(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError>;

    /// Read-only call against the latest state
    async fn call(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Vec<DynSolValue>, LedgerError>;

    async fn balance(&self, address: Address) -> Result<U256, LedgerError>;

    /// Whether any contract code lives at `address`
    async fn has_code(&self, address: Address) -> Result<bool, LedgerError>;

    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Block until `receipt` has at least `confirmations` confirmations
    async fn wait_for_confirmations(
        &self,
        receipt: &TransactionReceipt,
        confirmations: u64,
    ) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_event_lookup() {
        let request_id = B256::repeat_byte(7);
        let receipt = TransactionReceipt {
            tx_hash: B256::ZERO,
            block_number: 3,
            from: Address::ZERO,
            to: None,
            contract_address: None,
            events: vec![EventLog {
                address: Address::ZERO,
                name: "RequestedRandomness".to_string(),
                fields: vec![("requestId".to_string(), DynSolValue::FixedBytes(request_id, 32))],
            }],
        };

        let event = receipt.event("RequestedRandomness").unwrap();
        assert_eq!(event.field("requestId"), Some(&DynSolValue::FixedBytes(request_id, 32)));
        assert!(receipt.event("Transfer").is_none());
    }

    #[test]
    fn test_revert_classification() {
        assert!(LedgerError::revert("Not enough ETH!").is_revert());
        assert!(!LedgerError::Rpc("connection refused".to_string()).is_revert());
    }
}
