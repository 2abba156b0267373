// Typed handle over a deployed Lottery contract

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, B256, U256};
use std::fmt;
use std::sync::Arc;

use crate::accounts::Account;
use crate::contracts::ContractRef;
use crate::ledger::values::{as_address, as_uint, as_word, uint};
use crate::ledger::{Ledger, LedgerError, TransactionReceipt, TxOptions};

/// Lifecycle state as reported by `lottery_state()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotteryState {
    Open,
    Closed,
    CalculatingWinner,
}

impl LotteryState {
    pub fn code(&self) -> u8 {
        match self {
            LotteryState::Open => 0,
            LotteryState::Closed => 1,
            LotteryState::CalculatingWinner => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LotteryState::Open),
            1 => Some(LotteryState::Closed),
            2 => Some(LotteryState::CalculatingWinner),
            _ => None,
        }
    }
}

impl fmt::Display for LotteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LotteryState::Open => "OPEN",
            LotteryState::Closed => "CLOSED",
            LotteryState::CalculatingWinner => "CALCULATING_WINNER",
        };
        f.write_str(name)
    }
}

fn single(method: &str, values: Vec<DynSolValue>) -> Result<DynSolValue, LedgerError> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::Rpc(format!("{} returned nothing", method)))
}

/// Request id carried by the `RequestedRandomness` event of an `endLottery` receipt
pub fn request_id(receipt: &TransactionReceipt) -> Result<B256, LedgerError> {
    let value = receipt
        .event("RequestedRandomness")
        .and_then(|event| event.field("requestId"))
        .ok_or_else(|| LedgerError::Rpc(format!("no RequestedRandomness event in {}", receipt.tx_hash)))?;
    as_word(value)
}

#[derive(Clone)]
pub struct LotteryHandle {
    ledger: Arc<dyn Ledger>,
    contract: ContractRef,
}

impl LotteryHandle {
    pub fn new(ledger: Arc<dyn Ledger>, contract: ContractRef) -> Self {
        Self { ledger, contract }
    }

    pub fn address(&self) -> Address {
        self.contract.address
    }

    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    async fn view(&self, method: &str, args: Vec<DynSolValue>) -> Result<DynSolValue, LedgerError> {
        single(method, self.ledger.call(&self.contract, method, args).await?)
    }

    async fn send(
        &self,
        method: &str,
        from: &Account,
        value: U256,
    ) -> Result<TransactionReceipt, LedgerError> {
        let opts = TxOptions::sender(from).value(value);
        self.ledger.transact(&self.contract, method, vec![], &opts).await
    }

    /// Wei required to enter at the current feed price
    pub async fn entrance_fee(&self) -> Result<U256, LedgerError> {
        as_uint(&self.view("getEntranceFee", vec![]).await?)
    }

    pub async fn state_code(&self) -> Result<u8, LedgerError> {
        let code = as_uint(&self.view("lottery_state", vec![]).await?)?;
        u8::try_from(code).map_err(|_| LedgerError::Rpc(format!("invalid lottery state {}", code)))
    }

    pub async fn state(&self) -> Result<LotteryState, LedgerError> {
        let code = self.state_code().await?;
        LotteryState::from_code(code).ok_or_else(|| LedgerError::Rpc(format!("invalid lottery state {}", code)))
    }

    pub async fn player(&self, index: usize) -> Result<Address, LedgerError> {
        as_address(&self.view("players", vec![uint(U256::from(index))]).await?)
    }

    pub async fn recent_winner(&self) -> Result<Address, LedgerError> {
        as_address(&self.view("recentWinner", vec![]).await?)
    }

    pub async fn balance(&self) -> Result<U256, LedgerError> {
        self.ledger.balance(self.contract.address).await
    }

    pub async fn start(&self, from: &Account) -> Result<TransactionReceipt, LedgerError> {
        self.send("startLottery", from, U256::ZERO).await
    }

    pub async fn enter(&self, from: &Account, value: U256) -> Result<TransactionReceipt, LedgerError> {
        self.send("enter", from, value).await
    }

    pub async fn end(&self, from: &Account) -> Result<TransactionReceipt, LedgerError> {
        self.send("endLottery", from, U256::ZERO).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(LotteryState::Open.code(), 0);
        assert_eq!(LotteryState::Closed.code(), 1);
        assert_eq!(LotteryState::CalculatingWinner.code(), 2);
        assert_eq!(LotteryState::from_code(2), Some(LotteryState::CalculatingWinner));
        assert_eq!(LotteryState::from_code(3), None);
        assert_eq!(LotteryState::CalculatingWinner.to_string(), "CALCULATING_WINNER");
    }
}
