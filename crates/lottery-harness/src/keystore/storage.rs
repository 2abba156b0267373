// Encrypted key storage implementation
use super::{EvmKey, KeyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use rand::RngCore;

/// Errors specific to keystore operations
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Corrupted keystore file")]
    CorruptedFile,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for named-account storage backends
#[async_trait]
pub trait KeyStorage: Send + Sync {
    /// Load and decrypt a key by account id
    async fn load_key(&self, id: &str, password: &str) -> Result<EvmKey, KeyError>;

    /// Public address of a stored key, readable without the password
    async fn address_of(&self, id: &str) -> Result<String, KeyError>;

    /// Store a key with encryption
    async fn store_key(&self, id: &str, key: &EvmKey, password: &str) -> Result<(), KeyError>;

    /// Remove a key
    async fn remove_key(&self, id: &str) -> Result<(), KeyError>;

    /// List all available account ids
    async fn list_keys(&self) -> Result<Vec<String>, KeyError>;
}

/// Encrypted keystore file format
#[derive(Debug, Serialize, Deserialize)]
struct KeystoreFile {
    /// Version of the keystore format
    version: u32,
    /// Account id this key is stored under
    id: String,
    /// Plaintext address so accounts can be listed without unlocking
    address: String,
    /// Key type ("secp256k1")
    key_type: String,
    /// Encrypted key data
    ciphertext: Vec<u8>,
    /// Nonce used for encryption
    nonce: Vec<u8>,
    /// Salt for key derivation
    salt: String,
    /// KDF parameters
    kdf: KdfParams,
}

/// Key derivation function parameters
#[derive(Debug, Serialize, Deserialize)]
struct KdfParams {
    iterations: u32,
    memory: u32,
    parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 3,      // Argon2 iterations
            memory: 65536,      // 64 MB
            parallelism: 4,
        }
    }
}

/// Encrypted keystore implementation
pub struct EncryptedKeystore {
    keystore_dir: PathBuf,
}

impl EncryptedKeystore {
    pub fn new<P: AsRef<Path>>(keystore_dir: P) -> Result<Self, KeystoreError> {
        let keystore_dir = keystore_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&keystore_dir)?;

        Ok(Self { keystore_dir })
    }

    fn get_keystore_path(&self, id: &str) -> PathBuf {
        self.keystore_dir.join(format!("{}.json", id))
    }

    async fn read_file(&self, id: &str) -> Result<KeystoreFile, KeyError> {
        let data = tokio::fs::read_to_string(self.get_keystore_path(id))
            .await
            .map_err(|_| KeyError::NotFound(id.to_string()))?;

        serde_json::from_str(&data)
            .map_err(|e| KeyError::Keystore(KeystoreError::Serialization(e.to_string())))
    }

    /// Derive encryption key from password
    fn derive_key(password: &str, salt: &str) -> Result<[u8; 32], KeystoreError> {
        let argon2 = Argon2::default();

        let salt = SaltString::from_b64(salt)
            .map_err(|e| KeystoreError::Encryption(format!("Invalid salt: {}", e)))?;

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| KeystoreError::Encryption(format!("Key derivation failed: {}", e)))?;

        let hash = password_hash.hash.ok_or(KeystoreError::CorruptedFile)?;
        let hash_bytes = hash.as_bytes();
        if hash_bytes.len() < 32 {
            return Err(KeystoreError::Encryption("Derived key too short".to_string()));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&hash_bytes[..32]);
        Ok(key)
    }

    fn encrypt_key(key_data: &[u8], password: &str) -> Result<KeystoreFile, KeystoreError> {
        let salt = SaltString::generate(&mut OsRng);

        let key = Self::derive_key(password, salt.as_str())?;
        let key = Key::<Aes256Gcm>::from_slice(&key);

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new(key);
        let ciphertext = cipher
            .encrypt(nonce, key_data)
            .map_err(|e| KeystoreError::Encryption(format!("Encryption failed: {}", e)))?;

        Ok(KeystoreFile {
            version: 1,
            id: String::new(),      // Set by caller
            address: String::new(), // Set by caller
            key_type: "secp256k1".to_string(),
            ciphertext,
            nonce: nonce_bytes.to_vec(),
            salt: salt.to_string(),
            kdf: KdfParams::default(),
        })
    }

    fn decrypt_key(keystore: &KeystoreFile, password: &str) -> Result<Vec<u8>, KeystoreError> {
        let key = Self::derive_key(password, &keystore.salt)?;
        let key = Key::<Aes256Gcm>::from_slice(&key);

        if keystore.nonce.len() != 12 {
            return Err(KeystoreError::CorruptedFile);
        }
        let nonce = Nonce::from_slice(&keystore.nonce);

        let cipher = Aes256Gcm::new(key);
        cipher
            .decrypt(nonce, keystore.ciphertext.as_ref())
            .map_err(|_| KeystoreError::InvalidPassword)
    }
}

#[async_trait]
impl KeyStorage for EncryptedKeystore {
    async fn load_key(&self, id: &str, password: &str) -> Result<EvmKey, KeyError> {
        let keystore = self.read_file(id).await?;
        let plaintext = Self::decrypt_key(&keystore, password)?;

        let key: EvmKey = serde_json::from_slice(&plaintext)
            .map_err(|e| KeyError::Serialization(e.to_string()))?;
        key.validate()?;
        Ok(key)
    }

    async fn address_of(&self, id: &str) -> Result<String, KeyError> {
        Ok(self.read_file(id).await?.address)
    }

    async fn store_key(&self, id: &str, key: &EvmKey, password: &str) -> Result<(), KeyError> {
        let key_data = serde_json::to_vec(key)
            .map_err(|e| KeyError::Serialization(e.to_string()))?;

        let mut keystore = Self::encrypt_key(&key_data, password)?;
        keystore.id = id.to_string();
        keystore.address = key.address.clone();

        let data = serde_json::to_string_pretty(&keystore)
            .map_err(|e| KeyError::Serialization(e.to_string()))?;

        tokio::fs::write(self.get_keystore_path(id), data).await?;
        Ok(())
    }

    async fn remove_key(&self, id: &str) -> Result<(), KeyError> {
        tokio::fs::remove_file(self.get_keystore_path(id))
            .await
            .map_err(|_| KeyError::NotFound(id.to_string()))?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, KeyError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.keystore_dir).await?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(".json") {
                    keys.push(id.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// In-memory storage for testing
#[derive(Default)]
pub struct MemoryKeyStorage {
    keys: std::sync::Mutex<std::collections::HashMap<String, (EvmKey, String)>>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStorage for MemoryKeyStorage {
    async fn load_key(&self, id: &str, password: &str) -> Result<EvmKey, KeyError> {
        let keys = self.keys.lock().map_err(|_| KeyError::Poisoned)?;
        match keys.get(id) {
            Some((key, stored)) if stored == password => Ok(key.clone()),
            Some(_) => Err(KeyError::Keystore(KeystoreError::InvalidPassword)),
            None => Err(KeyError::NotFound(id.to_string())),
        }
    }

    async fn address_of(&self, id: &str) -> Result<String, KeyError> {
        let keys = self.keys.lock().map_err(|_| KeyError::Poisoned)?;
        keys.get(id)
            .map(|(key, _)| key.address.clone())
            .ok_or_else(|| KeyError::NotFound(id.to_string()))
    }

    async fn store_key(&self, id: &str, key: &EvmKey, password: &str) -> Result<(), KeyError> {
        let mut keys = self.keys.lock().map_err(|_| KeyError::Poisoned)?;
        keys.insert(id.to_string(), (key.clone(), password.to_string()));
        Ok(())
    }

    async fn remove_key(&self, id: &str) -> Result<(), KeyError> {
        let mut keys = self.keys.lock().map_err(|_| KeyError::Poisoned)?;
        keys.remove(id)
            .ok_or_else(|| KeyError::NotFound(id.to_string()))?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, KeyError> {
        let keys = self.keys.lock().map_err(|_| KeyError::Poisoned)?;
        let mut ids: Vec<String> = keys.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_encrypted_keystore_round_trip() {
        let temp_dir = tempdir().unwrap();
        let keystore = EncryptedKeystore::new(temp_dir.path()).unwrap();
        let key = EvmKey::generate();

        keystore.store_key("deployer", &key, "test_password").await.unwrap();

        let keys = keystore.list_keys().await.unwrap();
        assert_eq!(keys, vec!["deployer".to_string()]);
        assert_eq!(keystore.address_of("deployer").await.unwrap(), key.address);

        let loaded = keystore.load_key("deployer", "test_password").await.unwrap();
        assert_eq!(loaded.address, key.address);
        assert_eq!(loaded.private_key, key.private_key);

        keystore.remove_key("deployer").await.unwrap();
        assert!(keystore.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let keystore = EncryptedKeystore::new(temp_dir.path()).unwrap();
        keystore.store_key("deployer", &EvmKey::generate(), "right").await.unwrap();

        let result = keystore.load_key("deployer", "wrong").await;
        assert!(matches!(result, Err(KeyError::Keystore(KeystoreError::InvalidPassword))));
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let keystore = EncryptedKeystore::new(temp_dir.path()).unwrap();

        let result = keystore.load_key("nobody", "pw").await;
        assert!(matches!(result, Err(KeyError::NotFound(id)) if id == "nobody"));
    }

    #[test]
    fn test_encryption_decryption() {
        let data = b"test key data";

        let keystore_file = EncryptedKeystore::encrypt_key(data, "secure_password").unwrap();
        let decrypted = EncryptedKeystore::decrypt_key(&keystore_file, "secure_password").unwrap();
        assert_eq!(decrypted, data);

        assert!(EncryptedKeystore::decrypt_key(&keystore_file, "wrong_password").is_err());
    }
}
