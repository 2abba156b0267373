// Active network context

use std::fmt;

/// Networks where the harness deploys its own mocks
pub const LOCAL_BLOCKCHAIN_ENVIRONMENTS: &[&str] = &["development", "ganache-local"];

/// Local nodes forked from a public chain; they use keyring accounts but live addresses
pub const FORKED_LOCAL_ENVIRONMENTS: &[&str] = &["mainnet-fork", "mainnet-fork-dev"];

/// Name of the per-process development chain
pub const DEVELOPMENT: &str = "development";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// Development chain with auto-deployed mocks
    Local,
    /// Local fork of a public chain
    ForkedLocal,
    /// Public test or main network
    Live,
}

/// The network selected for this run. Fixed once the harness is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    name: String,
    kind: NetworkKind,
}

impl NetworkContext {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = if LOCAL_BLOCKCHAIN_ENVIRONMENTS.contains(&name.as_str()) {
            NetworkKind::Local
        } else if FORKED_LOCAL_ENVIRONMENTS.contains(&name.as_str()) {
            NetworkKind::ForkedLocal
        } else {
            NetworkKind::Live
        };
        Self { name, kind }
    }

    pub fn development() -> Self {
        Self::new(DEVELOPMENT)
    }

    /// Network from `LOTTERY_NETWORK`, defaulting to `development`
    pub fn from_env() -> Self {
        match std::env::var("LOTTERY_NETWORK") {
            Ok(name) if !name.trim().is_empty() => Self::new(name.trim()),
            _ => Self::development(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    /// True when mocks are deployed instead of reading live addresses
    pub fn is_local(&self) -> bool {
        self.kind == NetworkKind::Local
    }

    /// True when the local keyring supplies the default account
    pub fn uses_local_keyring(&self) -> bool {
        matches!(self.kind, NetworkKind::Local | NetworkKind::ForkedLocal)
    }
}

impl fmt::Display for NetworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_classification() {
        assert_eq!(NetworkContext::new("development").kind(), NetworkKind::Local);
        assert_eq!(NetworkContext::new("ganache-local").kind(), NetworkKind::Local);
        assert_eq!(NetworkContext::new("mainnet-fork").kind(), NetworkKind::ForkedLocal);
        assert_eq!(NetworkContext::new("rinkeby").kind(), NetworkKind::Live);
    }

    #[test]
    fn test_forked_networks_use_keyring_but_not_mocks() {
        let fork = NetworkContext::new("mainnet-fork-dev");
        assert!(fork.uses_local_keyring());
        assert!(!fork.is_local());
    }
}
