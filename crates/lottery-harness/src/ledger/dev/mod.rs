// Native stand-in chain: a test double for when Anvil or the compiled artifacts are unavailable
// Ten funded accounts, one block per transaction, no gas

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{Ledger, LedgerError, TransactionReceipt, TxOptions};
use crate::contracts::{ContractKind, ContractRef, Interface};

mod aggregator;
mod link_token;
mod lottery;
mod state;
mod vrf_coordinator;

pub use link_token::LinkToken;
pub use state::DevContract;
use state::WorldState;

pub const DEV_CHAIN_ID: u64 = 1337;
pub const DEV_ACCOUNT_COUNT: usize = 10;

/// Starting balance of every keyring account: 100 ether
pub fn dev_account_balance() -> U256 {
    U256::from(100u64) * U256::from(10u64).pow(U256::from(18))
}

/// Test double for a development node: contracts run as native Rust, not EVM bytecode
pub struct DevLedger {
    network: String,
    accounts: Vec<Address>,
    state: Mutex<WorldState>,
}

impl DevLedger {
    pub fn new(network: impl Into<String>) -> Self {
        let accounts: Vec<Address> = (0..DEV_ACCOUNT_COUNT).map(Self::dev_address).collect();
        let genesis = chrono::Utc::now().timestamp().max(0) as u64;
        let state = WorldState::new(&accounts, dev_account_balance(), genesis);

        Self {
            network: network.into(),
            accounts,
            state: Mutex::new(state),
        }
    }

    /// Deterministic address of keyring account `index`
    pub fn dev_address(index: usize) -> Address {
        let digest = keccak256(format!("lottery-harness/dev-account/{}", index));
        Address::from_slice(&digest[12..])
    }

    fn state(&self) -> Result<MutexGuard<'_, WorldState>, LedgerError> {
        self.state.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Apply `execute` atomically and mine it, or roll everything back
    fn commit<F>(&self, from: Address, to: Option<Address>, execute: F) -> Result<TransactionReceipt, LedgerError>
    where
        F: FnOnce(&mut WorldState) -> Result<Option<Address>, LedgerError>,
    {
        let mut state = self.state()?;
        let snapshot = state.clone();

        let contract_address = match execute(&mut state) {
            Ok(created) => created,
            Err(e) => {
                *state = snapshot;
                return Err(e);
            }
        };

        let events = state.take_logs();
        let (block_number, tx_hash) = state.mine(from);
        Ok(TransactionReceipt {
            tx_hash,
            block_number,
            from,
            to,
            contract_address,
            events,
        })
    }
}

#[async_trait]
impl Ledger for DevLedger {
    fn network(&self) -> &str {
        &self.network
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(DEV_CHAIN_ID)
    }

    async fn local_accounts(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self.accounts.clone())
    }

    async fn interface_of(&self, kind: ContractKind) -> Result<Interface, LedgerError> {
        Ok(DevContract::interface(kind))
    }

    async fn deploy(
        &self,
        kind: ContractKind,
        args: Vec<DynSolValue>,
        opts: &TxOptions<'_>,
    ) -> Result<TransactionReceipt, LedgerError> {
        let from = opts.from.address();
        let receipt = self.commit(from, None, |state| {
            state.create(from, kind, opts.value, &args).map(Some)
        })?;

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
        let from = opts.from.address();
        let to = contract.address;
        let receipt = self.commit(from, Some(to), |state| {
            state.message_call(from, to, opts.value, method, &args).map(|_| None)
        })?;

        debug!("{}.{} mined in block {}", contract, method, receipt.block_number);
        Ok(receipt)
    }

    async fn call(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        // Views run against a scratch copy
        let mut scratch = self.state()?.clone();
        scratch.message_call(Address::ZERO, contract.address, U256::ZERO, method, &args)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        Ok(self.state()?.balance(address))
    }

    async fn has_code(&self, address: Address) -> Result<bool, LedgerError> {
        Ok(self.state()?.has_code(address))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.state()?.block_number())
    }

    async fn wait_for_confirmations(
        &self,
        receipt: &TransactionReceipt,
        confirmations: u64,
    ) -> Result<(), LedgerError> {
        let mut state = self.state()?;
        while state.block_number() + 1 < receipt.block_number + confirmations {
            state.mine_empty();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Account;
    use crate::ledger::values::{address, as_address, as_uint, uint};
    use std::sync::Arc;

    fn keyring(index: usize) -> Account {
        Account::keyring(index, DevLedger::dev_address(index))
    }

    async fn deploy_link(ledger: &DevLedger, owner: &Account) -> ContractRef {
        let receipt = ledger
            .deploy(ContractKind::LinkToken, vec![], &TxOptions::sender(owner))
            .await
            .unwrap();
        let interface = ledger.interface_of(ContractKind::LinkToken).await.unwrap();
        ContractRef::new(ContractKind::LinkToken, receipt.contract_address.unwrap(), Arc::new(interface))
    }

    #[tokio::test]
    async fn test_accounts_are_funded() {
        let ledger = DevLedger::new("development");
        let accounts = ledger.local_accounts().await.unwrap();

        assert_eq!(accounts.len(), DEV_ACCOUNT_COUNT);
        assert_eq!(ledger.balance(accounts[0]).await.unwrap(), dev_account_balance());
        assert_ne!(accounts[0], accounts[1]);
    }

    #[tokio::test]
    async fn test_deploy_uses_create_address_and_mines() {
        let ledger = DevLedger::new("development");
        let owner = keyring(0);

        let link = deploy_link(&ledger, &owner).await;

        assert_eq!(link.address, owner.address().create(0));
        assert!(ledger.has_code(link.address).await.unwrap());
        assert_eq!(ledger.block_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revert_restores_state_and_is_not_mined() {
        let ledger = DevLedger::new("development");
        let owner = keyring(0);
        let stranger = keyring(1);
        let link = deploy_link(&ledger, &owner).await;

        let result = ledger
            .transact(
                &link,
                "transfer",
                vec![address(owner.address()), uint(U256::from(1))],
                &TxOptions::sender(&stranger),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::Reverted { .. })));
        assert_eq!(ledger.block_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_token_transfer_emits_event() {
        let ledger = DevLedger::new("development");
        let owner = keyring(0);
        let recipient = DevLedger::dev_address(3);
        let link = deploy_link(&ledger, &owner).await;

        let receipt = ledger
            .transact(
                &link,
                "transfer",
                vec![address(recipient), uint(U256::from(500))],
                &TxOptions::sender(&owner),
            )
            .await
            .unwrap();

        let event = receipt.event("Transfer").unwrap();
        assert_eq!(as_address(event.field("to").unwrap()).unwrap(), recipient);

        let balance = ledger.call(&link, "balanceOf", vec![address(recipient)]).await.unwrap();
        assert_eq!(as_uint(&balance[0]).unwrap(), U256::from(500));
    }

    #[tokio::test]
    async fn test_non_payable_rejects_value() {
        let ledger = DevLedger::new("development");
        let owner = keyring(0);
        let link = deploy_link(&ledger, &owner).await;

        let result = ledger
            .transact(
                &link,
                "transfer",
                vec![address(owner.address()), uint(U256::ZERO)],
                &TxOptions::sender(&owner).value(U256::from(1)),
            )
            .await;

        assert!(result.unwrap_err().is_revert());
        assert_eq!(ledger.balance(owner.address()).await.unwrap(), dev_account_balance());
    }

    #[tokio::test]
    async fn test_wait_for_confirmations_mines_blocks() {
        let ledger = DevLedger::new("development");
        let owner = keyring(0);
        let link = deploy_link(&ledger, &owner).await;
        let receipt = ledger
            .transact(
                &link,
                "approve",
                vec![address(owner.address()), uint(U256::from(1))],
                &TxOptions::sender(&owner),
            )
            .await
            .unwrap();

        ledger.wait_for_confirmations(&receipt, 1).await.unwrap();
        assert_eq!(ledger.block_number().await.unwrap(), receipt.block_number);

        ledger.wait_for_confirmations(&receipt, 3).await.unwrap();
        assert_eq!(ledger.block_number().await.unwrap(), receipt.block_number + 2);
    }
}
