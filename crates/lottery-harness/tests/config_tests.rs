// Configuration file loading
use std::path::PathBuf;

use lottery_harness::{DevChain, HarnessConfig, NetworkContext};
use tempfile::TempDir;

fn sample_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/lottery.toml")
}

#[test]
fn test_sample_config_matches_defaults() {
    let loaded = HarnessConfig::load(sample_config()).unwrap();
    let defaults = HarnessConfig::default();

    for name in ["development", "ganache-local", "mainnet-fork", "rinkeby"] {
        let file = loaded.network(name).unwrap();
        let builtin = defaults.network(name).unwrap();
        assert_eq!(file.fee, builtin.fee, "fee differs for {}", name);
        assert_eq!(file.keyhash, builtin.keyhash, "keyhash differs for {}", name);
        assert_eq!(file.link_token, builtin.link_token, "link_token differs for {}", name);
        assert_eq!(file.verify, builtin.verify, "verify differs for {}", name);
    }
    assert_eq!(loaded.lottery.entry_margin, 100_000_000);
    assert_eq!(loaded.mocks.initial_value, 200_000_000_000);
    assert_eq!(loaded.project.dev_chain, DevChain::Auto);
}

#[test]
fn test_config_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lottery.toml");

    let mut config = HarnessConfig::default();
    config.lottery.confirmations = 3;
    config.lottery.simulate_oracle = false;
    config.save(&path).unwrap();

    let loaded = HarnessConfig::load(&path).unwrap();
    assert_eq!(loaded.lottery.confirmations, 3);
    assert!(!loaded.lottery.simulate_oracle);
    assert!(loaded.network("rinkeby").unwrap().verify);
}

#[test]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lottery.toml");
    HarnessConfig::default().save(&path).unwrap();

    std::env::set_var("LOTTERY__LOTTERY__CALLBACK_TIMEOUT", "30s");
    let loaded = HarnessConfig::load_layered(&path);
    std::env::remove_var("LOTTERY__LOTTERY__CALLBACK_TIMEOUT");

    let loaded = loaded.unwrap();
    assert_eq!(loaded.lottery.callback_timeout().unwrap().as_secs(), 30);
    assert_eq!(loaded.lottery.poll_interval().unwrap().as_secs(), 5);
}

#[test]
fn test_unknown_network_is_live() {
    let network = NetworkContext::new("kovan");
    assert!(!network.is_local());
    assert!(!network.uses_local_keyring());
    assert!(HarnessConfig::default().network("kovan").is_err());
}
