// Token funding for contracts that pay for randomness

use alloy::primitives::{Address, U256};
use tracing::info;

use crate::accounts::Account;
use crate::contracts::{ContractRef, Dependency};
use crate::harness::{Harness, HarnessError};
use crate::ledger::values::{address, uint};
use crate::ledger::{TransactionReceipt, TxOptions};

impl Harness {
    /// Send `amount` of the token to `target` and wait one confirmation.
    ///
    /// Missing arguments fall back to the default account, the network's
    /// token and `[lottery] fund_amount` (0.1 token).
    pub async fn fund_with_token(
        &self,
        target: Address,
        account: Option<&Account>,
        token: Option<&ContractRef>,
        amount: Option<U256>,
    ) -> Result<TransactionReceipt, HarnessError> {
        let account = match account {
            Some(account) => account.clone(),
            None => self.accounts().default_account().await?,
        };
        let token = match token {
            Some(token) => token.clone(),
            None => self.locator().resolve(Dependency::LinkToken).await?,
        };
        let amount = amount.unwrap_or_else(|| U256::from(self.config().lottery.fund_amount));

        let receipt = self
            .ledger()
            .transact(
                &token,
                "transfer",
                vec![address(target), uint(amount)],
                &TxOptions::sender(&account),
            )
            .await?;
        self.ledger().wait_for_confirmations(&receipt, 1).await?;

        info!("Funded contract {} with {} of {}", target, amount, token);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::values::as_uint;

    #[tokio::test]
    async fn test_fund_defaults_to_point_one_token() {
        let harness = Harness::development();
        let target = Address::repeat_byte(0x42);

        let receipt = harness.fund_with_token(target, None, None, None).await.unwrap();
        assert!(receipt.event("Transfer").is_some());

        let link = harness.locator().resolve(Dependency::LinkToken).await.unwrap();
        let balance = harness.ledger().call(&link, "balanceOf", vec![address(target)]).await.unwrap();
        assert_eq!(as_uint(&balance[0]).unwrap(), U256::from(100_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_fund_without_tokens_reverts() {
        let harness = Harness::development();
        let poor = harness.accounts().resolve(Some(5), None).await.unwrap();

        let result = harness
            .fund_with_token(Address::repeat_byte(0x42), Some(&poor), None, Some(U256::from(1)))
            .await;
        assert!(result.unwrap_err().is_revert());
    }
}
