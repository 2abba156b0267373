// Lottery behaviour on the active local network (LOTTERY_NETWORK, default development)
use alloy::primitives::{B256, U256};
use std::path::PathBuf;

use lottery_harness::lottery::request_id;
use lottery_harness::{Harness, HarnessConfig, LotteryHandle, LotteryState, NetworkContext};

/// Harness for the active network, or `None` when it is not local
async fn local_harness() -> Option<Harness> {
    let network = NetworkContext::from_env();
    if !network.is_local() {
        eprintln!("Skipping: {} is not a local network", network);
        return None;
    }

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
    let mut config = HarnessConfig::load_layered(root.join("config/lottery.toml")).expect("config/lottery.toml");
    config.project.artifacts_dir = root.join(&config.project.artifacts_dir);
    config.project.deployments_dir = root.join(&config.project.deployments_dir);

    let harness = Harness::connect(config, network).await.expect("cannot connect to the local network");
    Some(harness)
}

async fn deployed(harness: &Harness) -> LotteryHandle {
    harness.driver().deploy().await.expect("Lottery deployment failed")
}

#[tokio::test]
async fn test_get_entrance_fee() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let lottery = deployed(&harness).await;

    // 2000 USD/ETH feed, 50 USD entry
    let expected = U256::from(25_000_000_000_000_000u64);
    assert_eq!(lottery.entrance_fee().await.unwrap(), expected);
}

#[tokio::test]
async fn test_cant_enter_unless_started() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let lottery = deployed(&harness).await;
    let account = harness.accounts().default_account().await.unwrap();

    let fee = lottery.entrance_fee().await.unwrap();
    let err = lottery.enter(&account, fee).await.unwrap_err();
    assert!(err.is_revert(), "expected a revert, got {:?}", err);
    assert_eq!(lottery.balance().await.unwrap(), U256::ZERO);
}

#[tokio::test]
async fn test_can_start_and_enter_lottery() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let lottery = deployed(&harness).await;
    let account = harness.accounts().default_account().await.unwrap();

    lottery.start(&account).await.unwrap();
    let fee = lottery.entrance_fee().await.unwrap();
    lottery.enter(&account, fee).await.unwrap();

    assert_eq!(lottery.player(0).await.unwrap(), account.address());
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Open);
}

#[tokio::test]
async fn test_can_end_lottery() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let lottery = deployed(&harness).await;
    let account = harness.accounts().default_account().await.unwrap();

    lottery.start(&account).await.unwrap();
    let fee = lottery.entrance_fee().await.unwrap();
    lottery.enter(&account, fee).await.unwrap();
    harness
        .fund_with_token(lottery.address(), None, None, None)
        .await
        .unwrap();
    lottery.end(&account).await.unwrap();

    assert_eq!(lottery.state_code().await.unwrap(), 2);
}

/// Three entrants, ended by the owner; returns the lottery, its request id and the fee paid
async fn ended_with_three_players(harness: &Harness) -> (LotteryHandle, B256, U256) {
    let lottery = deployed(harness).await;
    let owner = harness.accounts().default_account().await.unwrap();

    lottery.start(&owner).await.unwrap();
    let fee = lottery.entrance_fee().await.unwrap();
    for index in 0..3 {
        let player = harness.accounts().resolve(Some(index), None).await.unwrap();
        lottery.enter(&player, fee).await.unwrap();
    }
    harness
        .fund_with_token(lottery.address(), None, None, None)
        .await
        .unwrap();
    let receipt = lottery.end(&owner).await.unwrap();
    (lottery, request_id(&receipt).unwrap(), fee)
}

#[tokio::test]
async fn test_can_pick_winner_correctly() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let (lottery, request, fee) = ended_with_three_players(&harness).await;
    let owner = harness.accounts().default_account().await.unwrap();
    let oracle = harness.accounts().resolve(Some(2), None).await.unwrap();

    let starting_balance = harness.ledger().balance(owner.address()).await.unwrap();
    let prize = lottery.balance().await.unwrap();
    assert_eq!(prize, fee * U256::from(3));

    harness
        .driver()
        .fulfill_from(&oracle, request, U256::from(777), &lottery)
        .await
        .unwrap();

    // 777 % 3 == 0
    assert_eq!(lottery.recent_winner().await.unwrap(), owner.address());
    assert_eq!(lottery.balance().await.unwrap(), U256::ZERO);
    assert_eq!(
        harness.ledger().balance(owner.address()).await.unwrap(),
        starting_balance + prize
    );
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Closed);
}

#[tokio::test]
async fn test_can_pick_second_player_as_winner() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let (lottery, request, _) = ended_with_three_players(&harness).await;
    let second = harness.accounts().resolve(Some(1), None).await.unwrap();

    let starting_balance = harness.ledger().balance(second.address()).await.unwrap();
    let prize = lottery.balance().await.unwrap();

    harness
        .driver()
        .fulfill(request, U256::from(778), &lottery)
        .await
        .unwrap();

    // 778 % 3 == 1
    assert_eq!(lottery.recent_winner().await.unwrap(), second.address());
    assert_eq!(lottery.balance().await.unwrap(), U256::ZERO);
    assert_eq!(
        harness.ledger().balance(second.address()).await.unwrap(),
        starting_balance + prize
    );
}

#[tokio::test]
async fn test_cant_start_twice() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let lottery = deployed(&harness).await;
    let account = harness.accounts().default_account().await.unwrap();

    lottery.start(&account).await.unwrap();
    let err = lottery.start(&account).await.unwrap_err();
    assert!(err.is_revert(), "expected a revert, got {:?}", err);
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Open);
}

#[tokio::test]
async fn test_only_owner_can_end() {
    let Some(harness) = local_harness().await else {
        return;
    };
    let lottery = deployed(&harness).await;
    let owner = harness.accounts().default_account().await.unwrap();
    let stranger = harness.accounts().resolve(Some(1), None).await.unwrap();

    lottery.start(&owner).await.unwrap();
    let err = lottery.end(&stranger).await.unwrap_err();
    assert!(err.is_revert());
    assert_eq!(lottery.state().await.unwrap(), LotteryState::Open);
}
