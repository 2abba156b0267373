// Lottery lifecycle: deploy, start, enter, end

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::Account;
use crate::contracts::{
    ContractKind, ContractRef, Dependency, COORDINATOR_MOCK_CAPABILITY, LOTTERY_CAPABILITY,
};
use crate::harness::{Harness, HarnessError};
use crate::ledger::values::{address, uint, word};
use crate::ledger::{LedgerError, TransactionReceipt, TxOptions};
use crate::lottery::{request_id, LotteryHandle, LotteryState};
use crate::verify::SourceVerifier;
use crate::wait::{poll_until, WaitConfig};

/// Drives the most recently deployed Lottery through its lifecycle
pub struct LifecycleDriver<'a> {
    harness: &'a Harness,
}

impl<'a> LifecycleDriver<'a> {
    pub fn new(harness: &'a Harness) -> Self {
        Self { harness }
    }

    /// Deploy a Lottery wired to this network's price feed, coordinator and token
    pub async fn deploy(&self) -> Result<LotteryHandle, HarnessError> {
        let harness = self.harness;
        let network = harness.network();
        let account = harness.accounts().default_account().await?;

        let price_feed = harness.locator().resolve(Dependency::EthUsdPriceFeed).await?;
        let coordinator = harness.locator().resolve(Dependency::VrfCoordinator).await?;
        let link = harness.locator().resolve(Dependency::LinkToken).await?;

        let net = harness.config().network(network.name())?;
        let args = vec![
            address(price_feed.address),
            address(coordinator.address),
            address(link.address),
            uint(net.fee(network.name())?),
            word(net.keyhash(network.name())?),
        ];

        let receipt = harness
            .ledger()
            .deploy(ContractKind::Lottery, args.clone(), &TxOptions::sender(&account))
            .await?;
        harness
            .ledger()
            .wait_for_confirmations(&receipt, harness.config().lottery.confirmations)
            .await?;
        let lottery_address = receipt
            .contract_address
            .ok_or_else(|| LedgerError::Rpc("Lottery deployment returned no address".to_string()))?;
        harness.registry().record(ContractKind::Lottery, lottery_address)?;

        let contract = harness.locator().contract_at(ContractKind::Lottery, lottery_address).await?;
        harness.locator().check(&contract, "Lottery", &LOTTERY_CAPABILITY).await?;

        if net.verify {
            if network.is_local() {
                warn!("Source verification is not available on {}; skipping", network);
            } else {
                let artifact = harness.artifacts().load(ContractKind::Lottery)?;
                SourceVerifier::for_network(network.name(), net)?
                    .verify(&artifact, lottery_address, &args)
                    .await?;
            }
        }

        info!("Deployed lottery!");
        Ok(self.handle(contract))
    }

    /// Most recently deployed Lottery on this network
    pub async fn current(&self) -> Result<LotteryHandle, HarnessError> {
        let contract = self
            .harness
            .locator()
            .latest(ContractKind::Lottery)
            .await?
            .ok_or_else(|| HarnessError::NoLottery(self.harness.network().to_string()))?;
        Ok(self.handle(contract))
    }

    pub async fn start(&self) -> Result<TransactionReceipt, HarnessError> {
        let lottery = self.current().await?;
        let account = self.harness.accounts().default_account().await?;

        let receipt = lottery.start(&account).await?;
        self.confirm(&receipt).await?;
        info!("Lottery has been activated.");
        Ok(receipt)
    }

    /// Enter with the entrance fee plus `[lottery] entry_margin`
    pub async fn enter(&self) -> Result<TransactionReceipt, HarnessError> {
        let lottery = self.current().await?;
        let account = self.harness.accounts().default_account().await?;

        let value = lottery.entrance_fee().await? + U256::from(self.harness.config().lottery.entry_margin);
        let receipt = lottery.enter(&account, value).await?;
        self.confirm(&receipt).await?;
        info!("You entered the lottery.");
        Ok(receipt)
    }

    /// Fund, end, then wait for the randomness callback to close the round.
    /// Returns the winner.
    pub async fn end(&self) -> Result<Address, HarnessError> {
        let harness = self.harness;
        let lottery = self.current().await?;
        let account = harness.accounts().default_account().await?;

        harness.fund_with_token(lottery.address(), Some(&account), None, None).await?;

        let receipt = lottery.end(&account).await?;
        self.confirm(&receipt).await?;
        let request = request_id(&receipt)?;
        info!("Requested randomness {}", request);

        if harness.network().is_local() && harness.config().lottery.simulate_oracle {
            let randomness = U256::from(fastrand::u64(1..));
            self.fulfill(request, randomness, &lottery).await?;
        }

        let winner = self.await_winner(&lottery).await?;
        info!("{} is the new winner!", winner);
        Ok(winner)
    }

    /// Deploy, start, enter and end in sequence
    pub async fn run(&self) -> Result<Address, HarnessError> {
        self.deploy().await?;
        self.start().await?;
        self.enter().await?;
        self.end().await
    }

    /// Answer `request` through the coordinator mock, standing in for the oracle
    pub async fn fulfill(
        &self,
        request: B256,
        randomness: U256,
        lottery: &LotteryHandle,
    ) -> Result<TransactionReceipt, HarnessError> {
        let account = self.harness.accounts().default_account().await?;
        self.fulfill_from(&account, request, randomness, lottery).await
    }

    /// Same as [`fulfill`](Self::fulfill) with the callback sent by `from`
    pub async fn fulfill_from(
        &self,
        from: &Account,
        request: B256,
        randomness: U256,
        lottery: &LotteryHandle,
    ) -> Result<TransactionReceipt, HarnessError> {
        let harness = self.harness;
        let coordinator = harness.locator().resolve(Dependency::VrfCoordinator).await?;
        harness
            .locator()
            .check(&coordinator, "vrf_coordinator", &COORDINATOR_MOCK_CAPABILITY)
            .await?;

        let receipt = harness
            .ledger()
            .transact(
                &coordinator,
                "callBackWithRandomness",
                vec![word(request), uint(randomness), address(lottery.address())],
                &TxOptions::sender(from),
            )
            .await?;
        self.confirm(&receipt).await?;
        Ok(receipt)
    }

    /// Poll until the lottery is CLOSED again, bounded by `[lottery] callback_timeout`
    pub async fn await_winner(&self, lottery: &LotteryHandle) -> Result<Address, HarnessError> {
        let settings = &self.harness.config().lottery;
        let wait = WaitConfig {
            timeout: settings.callback_timeout()?,
            poll_interval: settings.poll_interval()?,
        };

        poll_until("the randomness callback", &wait, || async move {
            Ok::<_, LedgerError>((lottery.state().await? == LotteryState::Closed).then_some(()))
        })
        .await?;

        Ok(lottery.recent_winner().await?)
    }

    fn handle(&self, contract: ContractRef) -> LotteryHandle {
        LotteryHandle::new(Arc::clone(self.harness.ledger()), contract)
    }

    async fn confirm(&self, receipt: &TransactionReceipt) -> Result<(), HarnessError> {
        self.harness
            .ledger()
            .wait_for_confirmations(receipt, self.harness.config().lottery.confirmations)
            .await?;
        Ok(())
    }
}
