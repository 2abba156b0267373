// Compiled contract artifacts (ABI, bytecode, source) read from the build directory

use super::{ContractKind, Interface};
use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("No artifact for {kind} at {}", path.display())]
    NotFound { kind: ContractKind, path: PathBuf },

    #[error("Malformed artifact {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Artifact cache lock poisoned")]
    Poisoned,
}

/// Bytecode as written by brownie (plain hex) or foundry (`{ "object": "0x..." }`)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

/// Solc optimizer settings the bytecode was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self { enabled: true, runs: 200 }
    }
}

#[derive(Debug, Deserialize)]
struct RawCompiler {
    version: Option<String>,
    optimizer: Option<OptimizerSettings>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    optimizer: Option<OptimizerSettings>,
}

/// Foundry keeps solc settings in the embedded metadata
#[derive(Debug, Deserialize)]
struct RawMetadata {
    compiler: Option<RawCompiler>,
    settings: Option<RawSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: Option<RawBytecode>,
    source: Option<String>,
    compiler: Option<RawCompiler>,
    metadata: Option<serde_json::Value>,
}

/// A compiled contract
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ContractKind,
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    pub source: Option<String>,
    pub compiler_version: Option<String>,
    /// `None` when the artifact does not record optimizer settings
    pub optimizer: Option<OptimizerSettings>,
}

impl Artifact {
    /// Function and event names declared by the ABI
    pub fn interface(&self) -> Interface {
        Interface::new(
            &self.contract_name,
            self.abi.functions().map(|f| f.name.clone()),
            self.abi.events().map(|e| e.name.clone()),
        )
    }

    fn parse(kind: ContractKind, path: &Path, content: &str) -> Result<Self, ArtifactError> {
        let malformed = |reason: String| ArtifactError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let raw: RawArtifact = serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;

        let hex_code = match raw.bytecode {
            Some(RawBytecode::Hex(code)) => code,
            Some(RawBytecode::Object { object }) => object,
            None => String::new(),
        };
        let hex_code = hex_code.trim();
        let bytecode = if hex_code.is_empty() || hex_code == "0x" {
            Bytes::new()
        } else {
            let prefixed = if hex_code.starts_with("0x") {
                hex_code.to_string()
            } else {
                format!("0x{}", hex_code)
            };
            Bytes::from_str(&prefixed).map_err(|e| malformed(format!("bytecode: {}", e)))?
        };

        let (mut compiler_version, mut optimizer) = match raw.compiler {
            Some(compiler) => (compiler.version, compiler.optimizer),
            None => (None, None),
        };
        if let Some(metadata) = raw.metadata.and_then(|m| serde_json::from_value::<RawMetadata>(m).ok()) {
            compiler_version = compiler_version.or(metadata.compiler.and_then(|c| c.version));
            optimizer = optimizer.or(metadata.settings.and_then(|s| s.optimizer));
        }

        Ok(Self {
            kind,
            contract_name: raw.contract_name.unwrap_or_else(|| kind.contract_name().to_string()),
            abi: raw.abi,
            bytecode,
            source: raw.source,
            compiler_version,
            optimizer,
        })
    }
}

/// Lazily loaded, cached artifacts from `<artifacts_dir>/<ContractName>.json`
pub struct ArtifactStore {
    dir: PathBuf,
    cache: RwLock<HashMap<ContractKind, Arc<Artifact>>>,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, kind: ContractKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.contract_name()))
    }

    pub fn load(&self, kind: ContractKind) -> Result<Arc<Artifact>, ArtifactError> {
        if let Some(artifact) = self.cache.read().map_err(|_| ArtifactError::Poisoned)?.get(&kind) {
            return Ok(artifact.clone());
        }

        let path = self.path_for(kind);
        let content = std::fs::read_to_string(&path).map_err(|_| ArtifactError::NotFound {
            kind,
            path: path.clone(),
        })?;
        let artifact = Arc::new(Artifact::parse(kind, &path, &content)?);

        self.cache
            .write()
            .map_err(|_| ArtifactError::Poisoned)?
            .insert(kind, artifact.clone());
        Ok(artifact)
    }

    /// Every artifact that could be loaded, used to decode logs from any known contract
    pub fn load_all(&self) -> Vec<Arc<Artifact>> {
        ContractKind::ALL
            .into_iter()
            .filter_map(|kind| self.load(kind).ok())
            .collect()
    }

    /// Kinds with no artifact file on disk
    pub fn missing(&self) -> Vec<ContractKind> {
        ContractKind::ALL
            .into_iter()
            .filter(|kind| !self.path_for(*kind).exists())
            .collect()
    }
}
