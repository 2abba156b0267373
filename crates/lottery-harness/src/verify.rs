// Source verification against an Etherscan-compatible explorer API

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Address;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::contracts::{Artifact, ArtifactError};
use crate::wait::{poll_until, WaitConfig, WaitError};

pub const API_KEY_VAR: &str = "ETHERSCAN_TOKEN";

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("No explorer API configured for {0}")]
    NoExplorer(String),

    #[error("ETHERSCAN_TOKEN is not set")]
    MissingApiKey,

    #[error("{0} artifact has no source or compiler version")]
    NoSource(String),

    #[error("Explorer rejected verification: {0}")]
    Rejected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl ExplorerResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn already_verified(&self) -> bool {
        self.result.to_lowercase().contains("already verified")
    }
}

pub struct SourceVerifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    wait: WaitConfig,
}

impl SourceVerifier {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            wait: WaitConfig {
                timeout: Duration::from_secs(120),
                poll_interval: Duration::from_secs(5),
            },
        }
    }

    /// Explorer from the network config, API key from `ETHERSCAN_TOKEN`
    pub fn for_network(network: &str, config: &NetworkConfig) -> Result<Self, VerifyError> {
        let api_url = config
            .explorer
            .clone()
            .ok_or_else(|| VerifyError::NoExplorer(network.to_string()))?;
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| VerifyError::MissingApiKey)?;
        Ok(Self::new(api_url, api_key))
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Submit the flattened source of `artifact` deployed at `address` and wait for the verdict
    pub async fn verify(
        &self,
        artifact: &Artifact,
        address: Address,
        constructor_args: &[DynSolValue],
    ) -> Result<(), VerifyError> {
        let (Some(source), Some(version)) = (&artifact.source, &artifact.compiler_version) else {
            return Err(VerifyError::NoSource(artifact.contract_name.clone()));
        };
        let version = if version.starts_with('v') {
            version.clone()
        } else {
            format!("v{}", version)
        };
        let encoded_args = hex::encode(DynSolValue::Tuple(constructor_args.to_vec()).abi_encode_params());
        let address = address.to_checksum(None);
        let optimizer = artifact.optimizer.unwrap_or_default();
        let optimization_used = if optimizer.enabled { "1" } else { "0" };
        let runs = optimizer.runs.to_string();

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", "solidity-single-file"),
            ("contractname", artifact.contract_name.as_str()),
            ("compilerversion", version.as_str()),
            ("optimizationUsed", optimization_used),
            ("runs", runs.as_str()),
            ("constructorArguements", encoded_args.as_str()),
        ];

        info!("Submitting {} at {} for verification", artifact.contract_name, address);
        let submitted: ExplorerResponse = self
            .client
            .post(&self.api_url)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if submitted.already_verified() {
            info!("{} is already verified", address);
            return Ok(());
        }
        if !submitted.is_ok() {
            return Err(VerifyError::Rejected(format!("{}: {}", submitted.message, submitted.result)));
        }

        let guid = submitted.result;
        poll_until(&format!("verification of {}", address), &self.wait, || self.check_status(&guid))
            .await
            .map_err(|e| match e {
                WaitError::Check(inner) => inner,
                timeout => VerifyError::Timeout(timeout.to_string()),
            })?;

        info!("Verification complete: {}", address);
        Ok(())
    }

    async fn check_status(&self, guid: &str) -> Result<Option<()>, VerifyError> {
        let status: ExplorerResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await?
            .json()
            .await?;

        if status.result.contains("Pass - Verified") || status.already_verified() {
            return Ok(Some(()));
        }
        if status.result.to_lowercase().contains("pending") {
            return Ok(None);
        }

        warn!("Verification failed: {}", status.result);
        Err(VerifyError::Rejected(status.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContractKind, OptimizerSettings};
    use alloy::json_abi::JsonAbi;
    use alloy::primitives::{Bytes, U256};
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn artifact() -> Artifact {
        Artifact {
            kind: ContractKind::Lottery,
            contract_name: "Lottery".to_string(),
            abi: JsonAbi::default(),
            bytecode: Bytes::new(),
            source: Some("contract Lottery {}".to_string()),
            compiler_version: Some("0.6.6+commit.6c089d02".to_string()),
            optimizer: None,
        }
    }

    fn fast() -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_verification_passes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(body_string_contains("action=verifysourcecode"))
            .and(body_string_contains("contractname=Lottery"))
            .and(body_string_contains("compilerversion=v0.6.6"))
            .and(body_string_contains("optimizationUsed=1"))
            .and(body_string_contains("runs=200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1", "message": "OK", "result": "guid-123"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("action", "checkverifystatus"))
            .and(query_param("guid", "guid-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1", "message": "OK", "result": "Pass - Verified"
            })))
            .mount(&server)
            .await;

        let verifier = SourceVerifier::new(format!("{}/api", server.uri()), "key").with_wait(fast());
        verifier
            .verify(&artifact(), Address::repeat_byte(1), &[DynSolValue::Uint(U256::from(1), 256)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submits_recorded_optimizer_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("optimizationUsed=0"))
            .and(body_string_contains("runs=1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "0", "message": "NOTOK", "result": "Contract source code already verified"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut artifact = artifact();
        artifact.optimizer = Some(OptimizerSettings { enabled: false, runs: 1000 });

        let verifier = SourceVerifier::new(server.uri(), "key").with_wait(fast());
        verifier.verify(&artifact, Address::ZERO, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_already_verified_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "0", "message": "NOTOK", "result": "Contract source code already verified"
            })))
            .mount(&server)
            .await;

        let verifier = SourceVerifier::new(server.uri(), "key").with_wait(fast());
        assert!(verifier.verify(&artifact(), Address::ZERO, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_verification_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1", "message": "OK", "result": "guid-9"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "0", "message": "NOTOK", "result": "Fail - Unable to verify"
            })))
            .mount(&server)
            .await;

        let verifier = SourceVerifier::new(server.uri(), "key").with_wait(fast());
        let result = verifier.verify(&artifact(), Address::ZERO, &[]).await;
        assert!(matches!(result, Err(VerifyError::Rejected(msg)) if msg.contains("Unable to verify")));
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected_locally() {
        let mut artifact = artifact();
        artifact.source = None;

        let verifier = SourceVerifier::new("http://127.0.0.1:9", "key");
        let result = verifier.verify(&artifact, Address::ZERO, &[]).await;
        assert!(matches!(result, Err(VerifyError::NoSource(name)) if name == "Lottery"));
    }
}
