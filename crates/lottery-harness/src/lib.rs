// Lottery deployment and test harness
// Exposes the harness components for the CLI and integration tests

pub mod accounts;
pub mod config;
pub mod contracts;
pub mod driver;
pub mod funding;
pub mod harness;
pub mod keystore;
pub mod ledger;
pub mod locator;
pub mod lottery;
pub mod network;
pub mod registry;
pub mod verify;
pub mod wait;

// Re-export commonly used types for convenience
pub use accounts::{Account, AccountError, AccountOrigin, AccountResolver};
pub use config::{ConfigError, DevChain, HarnessConfig, LotteryConfig, NetworkConfig};
pub use contracts::{ContractKind, ContractRef, Dependency, Interface};
pub use driver::LifecycleDriver;
pub use harness::{Harness, HarnessError};
pub use keystore::{AccountStore, AccountStoreConfig, EvmKey, KeyError};
pub use ledger::{AnvilLedger, DevLedger, Ledger, LedgerError, TransactionReceipt, TxOptions};
pub use locator::{ContractLocator, LocatorError, MockDeployment};
pub use lottery::{LotteryHandle, LotteryState};
pub use network::{NetworkContext, NetworkKind};
pub use registry::DeploymentRegistry;
pub use wait::{poll_until, WaitConfig, WaitError};
