// Contract kinds, logical dependency names and interface checks

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub mod artifacts;

pub use artifacts::{Artifact, ArtifactError, ArtifactStore, OptimizerSettings};

/// Every contract type the harness deploys or talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractKind {
    Lottery,
    MockV3Aggregator,
    VrfCoordinatorMock,
    LinkToken,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [
        ContractKind::Lottery,
        ContractKind::MockV3Aggregator,
        ContractKind::VrfCoordinatorMock,
        ContractKind::LinkToken,
    ];

    /// Artifact and contract name as compiled
    pub fn contract_name(&self) -> &'static str {
        match self {
            ContractKind::Lottery => "Lottery",
            ContractKind::MockV3Aggregator => "MockV3Aggregator",
            ContractKind::VrfCoordinatorMock => "VRFCoordinatorMock",
            ContractKind::LinkToken => "LinkToken",
        }
    }

    pub fn is_mock(&self) -> bool {
        !matches!(self, ContractKind::Lottery)
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.contract_name())
    }
}

/// Logical names of the Lottery's external dependencies, as used in network configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    EthUsdPriceFeed,
    VrfCoordinator,
    LinkToken,
}

impl Dependency {
    pub const ALL: [Dependency; 3] = [
        Dependency::EthUsdPriceFeed,
        Dependency::VrfCoordinator,
        Dependency::LinkToken,
    ];

    /// Key under `[networks.<name>]`
    pub fn config_key(&self) -> &'static str {
        match self {
            Dependency::EthUsdPriceFeed => "eth_usd_price_feed",
            Dependency::VrfCoordinator => "vrf_coordinator",
            Dependency::LinkToken => "link_token",
        }
    }

    /// Mock standing in for this dependency on local networks
    pub fn mock_kind(&self) -> ContractKind {
        match self {
            Dependency::EthUsdPriceFeed => ContractKind::MockV3Aggregator,
            Dependency::VrfCoordinator => ContractKind::VrfCoordinatorMock,
            Dependency::LinkToken => ContractKind::LinkToken,
        }
    }

    /// What the harness and the Lottery need from any implementation
    pub fn capability(&self) -> Capability {
        match self {
            Dependency::EthUsdPriceFeed => Capability {
                name: "AggregatorV3Interface",
                functions: &["decimals", "latestRoundData"],
                events: &[],
            },
            Dependency::VrfCoordinator => Capability {
                name: "VRFCoordinator",
                functions: &["onTokenTransfer"],
                events: &[],
            },
            Dependency::LinkToken => Capability {
                name: "LinkTokenInterface",
                functions: &["balanceOf", "transfer", "transferAndCall"],
                events: &[],
            },
        }
    }
}

impl std::str::FromStr for Dependency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dependency::ALL
            .into_iter()
            .find(|dep| dep.config_key() == s)
            .ok_or_else(|| format!("unknown contract name '{}'", s))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Operations the Lottery must expose for the lifecycle driver and tests
pub const LOTTERY_CAPABILITY: Capability = Capability {
    name: "Lottery",
    functions: &[
        "startLottery",
        "enter",
        "endLottery",
        "getEntranceFee",
        "recentWinner",
        "players",
        "lottery_state",
    ],
    events: &["RequestedRandomness"],
};

/// Only available on the coordinator mock; used to stand in for the oracle
pub const COORDINATOR_MOCK_CAPABILITY: Capability = Capability {
    name: "VRFCoordinatorMock",
    functions: &["callBackWithRandomness"],
    events: &[],
};

/// A named set of functions and events a contract must provide
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub name: &'static str,
    pub functions: &'static [&'static str],
    pub events: &'static [&'static str],
}

/// Function and event names a deployed contract exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub contract_name: String,
    pub functions: BTreeSet<String>,
    pub events: BTreeSet<String>,
}

impl Interface {
    pub fn new<F, E>(contract_name: &str, functions: F, events: E) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            contract_name: contract_name.to_string(),
            functions: functions.into_iter().map(Into::into).collect(),
            events: events.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// Names from `capability` this interface lacks
    pub fn missing(&self, capability: &Capability) -> Vec<String> {
        let functions = capability
            .functions
            .iter()
            .filter(|f| !self.functions.contains(**f));
        let events = capability
            .events
            .iter()
            .filter(|e| !self.events.contains(**e));
        functions.chain(events).map(|name| name.to_string()).collect()
    }

    pub fn satisfies(&self, capability: &Capability) -> bool {
        self.missing(capability).is_empty()
    }
}

/// Address + interface of a deployed contract
#[derive(Debug, Clone)]
pub struct ContractRef {
    pub kind: ContractKind,
    pub address: Address,
    pub interface: Arc<Interface>,
}

impl ContractRef {
    pub fn new(kind: ContractKind, address: Address, interface: Arc<Interface>) -> Self {
        Self { kind, address, interface }
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_mapping() {
        assert_eq!(Dependency::EthUsdPriceFeed.mock_kind(), ContractKind::MockV3Aggregator);
        assert_eq!(Dependency::VrfCoordinator.mock_kind(), ContractKind::VrfCoordinatorMock);
        assert_eq!("link_token".parse::<Dependency>().unwrap(), Dependency::LinkToken);
        assert!("weth".parse::<Dependency>().is_err());
    }

    #[test]
    fn test_interface_reports_missing_capability() {
        let interface = Interface::new("Partial", ["decimals"], Vec::<String>::new());
        let missing = interface.missing(&Dependency::EthUsdPriceFeed.capability());

        assert_eq!(missing, vec!["latestRoundData".to_string()]);
        assert!(!interface.satisfies(&Dependency::EthUsdPriceFeed.capability()));
    }

    #[test]
    fn test_lottery_capability_includes_event() {
        let interface = Interface::new("Lottery", LOTTERY_CAPABILITY.functions.iter().copied(), Vec::<String>::new());
        assert_eq!(interface.missing(&LOTTERY_CAPABILITY), vec!["RequestedRandomness".to_string()]);
    }
}
