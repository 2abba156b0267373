// Ethereum account key (secp256k1)
use super::KeyError;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An externally owned account key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmKey {
    /// Checksummed 0x address derived from the key
    pub address: String,
    /// Private key bytes (32 bytes for secp256k1)
    pub private_key: Vec<u8>,
    /// Key type (always "secp256k1")
    pub key_type: String,
}

impl EvmKey {
    /// Create a key from raw private key bytes
    pub fn from_private_key(private_key: Vec<u8>) -> Result<Self, KeyError> {
        if private_key.len() != 32 {
            return Err(KeyError::InvalidFormat(
                "Private key must be 32 bytes".to_string()
            ));
        }

        let signer = PrivateKeySigner::from_slice(&private_key)
            .map_err(|e| KeyError::Crypto(format!("Invalid private key: {}", e)))?;

        Ok(Self {
            address: signer.address().to_checksum(None),
            private_key,
            key_type: "secp256k1".to_string(),
        })
    }

    /// Parse a hex private key, with or without the 0x prefix
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let trimmed = hex_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let private_key = hex::decode(trimmed)
            .map_err(|e| KeyError::InvalidFormat(format!("Invalid hex key: {}", e)))?;
        Self::from_private_key(private_key)
    }

    /// Create from environment variable string format
    /// Format: "0xAddress:hexPrivateKey" or just "hexPrivateKey"
    pub fn from_env_string(env_str: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = env_str.split(':').collect();

        let (address, hex_key) = match parts.as_slice() {
            [address, key] => (Some(*address), *key),
            [key] => (None, *key),
            _ => {
                return Err(KeyError::InvalidFormat(
                    "Expected format: 'address:privateKey' or 'privateKey'".to_string()
                ))
            }
        };

        let key = Self::from_hex(hex_key)?;

        // A supplied address must match the one derived from the key
        if let Some(address) = address {
            let expected = Address::from_str(address)
                .map_err(|e| KeyError::InvalidFormat(format!("Invalid address: {}", e)))?;
            if expected != key.address()? {
                return Err(KeyError::InvalidFormat(
                    "Address does not match private key".to_string()
                ));
            }
        }

        Ok(key)
    }

    /// Generate a fresh random key
    pub fn generate() -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            address: signer.address().to_checksum(None),
            private_key: signer.to_bytes().to_vec(),
            key_type: "secp256k1".to_string(),
        }
    }

    pub fn address(&self) -> Result<Address, KeyError> {
        Address::from_str(&self.address)
            .map_err(|e| KeyError::InvalidFormat(format!("Invalid address: {}", e)))
    }

    /// Local signer for this key
    pub fn signer(&self) -> Result<PrivateKeySigner, KeyError> {
        PrivateKeySigner::from_slice(&self.private_key)
            .map_err(|e| KeyError::Crypto(format!("Invalid private key: {}", e)))
    }

    /// Export key as string (for display/backup)
    pub fn to_export_string(&self) -> String {
        format!("{}:{}", self.address, self.private_key_hex())
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(&self.private_key)
    }

    /// Validate the key structure
    pub fn validate(&self) -> Result<(), KeyError> {
        if self.private_key.len() != 32 {
            return Err(KeyError::InvalidFormat(
                "Private key must be 32 bytes".to_string()
            ));
        }

        let derived = self.signer()?.address();
        if derived != self.address()? {
            return Err(KeyError::InvalidFormat(
                "Address does not match private key".to_string()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known first anvil/hardhat development key
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_evm_key_from_hex() {
        let key = EvmKey::from_hex(&format!("0x{}", DEV_KEY)).unwrap();

        assert_eq!(key.address, DEV_ADDRESS);
        assert_eq!(key.private_key.len(), 32);
        assert_eq!(key.key_type, "secp256k1");
        assert!(key.validate().is_ok());
    }

    #[test]
    fn test_evm_key_from_env_string() {
        let key = EvmKey::from_env_string(&format!("{}:{}", DEV_ADDRESS, DEV_KEY)).unwrap();
        assert_eq!(key.address, DEV_ADDRESS);

        let key = EvmKey::from_env_string(DEV_KEY).unwrap();
        assert_eq!(key.address, DEV_ADDRESS);

        let mismatched = format!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8:{}", DEV_KEY);
        assert!(EvmKey::from_env_string(&mismatched).is_err());
    }

    #[test]
    fn test_evm_key_validation() {
        let mut key = EvmKey::generate();
        assert!(key.validate().is_ok());

        key.address = DEV_ADDRESS.to_string();
        assert!(key.validate().is_err());

        key.private_key = vec![1; 31];
        assert!(key.validate().is_err());
    }
}
