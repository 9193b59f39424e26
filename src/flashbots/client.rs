use std::time::Duration;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::keccak256;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::bundle::{sign_bundle, BundleSubmission, BundledTransaction, SignedBundle, SimulationResponse};
use super::{BundleRelay, RelayError};

pub const DEFAULT_RELAY_URL: &str = "https://relay.flashbots.net";

/// JSON-RPC 응답
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBundleResult {
    bundle_hash: String,
}

/// Flashbots 릴레이 클라이언트 - 번들 서명/시뮬레이션/제출
#[derive(Debug, Clone)]
pub struct FlashbotsClient {
    http_client: HttpClient,
    relay_url: String,
    /// 릴레이 인증용 서명 키 (평판 키, 자금 없음)
    auth_signer: LocalWallet,
    chain_id: u64,
    /// true면 eth_sendBundle을 보내지 않는다
    simulation_mode: bool,
}

impl FlashbotsClient {
    pub fn new(relay_url: &str, auth_signer: LocalWallet, chain_id: u64, timeout: Duration) -> Result<Self, RelayError> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        info!("🔗 Flashbots 클라이언트 초기화: {} (인증 주소 {:?})", relay_url, auth_signer.address());
        Ok(Self {
            http_client,
            relay_url: relay_url.to_string(),
            auth_signer,
            chain_id,
            simulation_mode: false,
        })
    }

    pub fn with_simulation_mode(mut self, simulation_mode: bool) -> Self {
        self.simulation_mode = simulation_mode;
        self
    }

    /// X-Flashbots-Signature 헤더 값: `address:signature(keccak(body))`
    async fn create_flashbots_signature(&self, body: &str) -> Result<String, RelayError> {
        let message = format!("0x{}", hex::encode(keccak256(body.as_bytes())));
        let signature = self
            .auth_signer
            .sign_message(message)
            .await
            .map_err(|e| RelayError::Signing(e.to_string()))?;
        Ok(format!("{:?}:0x{}", self.auth_signer.address(), hex::encode(signature.to_vec())))
    }

    /// 서명된 JSON-RPC 요청
    async fn request(&self, method: &str, params: Value) -> Result<Value, RelayError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [params],
        });
        let body = serde_json::to_string(&request_body)?;
        let signature = self.create_flashbots_signature(&body).await?;

        let response = self
            .http_client
            .post(&self.relay_url)
            .header("Content-Type", "application/json")
            .header("X-Flashbots-Signature", signature)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Flashbots API 오류: {} - {}", status, body);
            return Err(RelayError::Status { status: status.as_u16(), body });
        }

        let response: JsonRpcResponse = response.json().await?;
        if let Some(error) = response.error {
            return Err(RelayError::Rpc { code: error.code, message: error.message });
        }
        response
            .result
            .ok_or_else(|| RelayError::InvalidResponse(format!("{} response has no result", method)))
    }
}

#[async_trait]
impl BundleRelay for FlashbotsClient {
    async fn sign_bundle(&self, transactions: Vec<BundledTransaction>) -> Result<SignedBundle, RelayError> {
        sign_bundle(transactions, self.chain_id).await
    }

    async fn simulate(&self, bundle: &SignedBundle, block_number: u64) -> Result<SimulationResponse, RelayError> {
        info!("🔬 Flashbots 번들 시뮬레이션: {}개 트랜잭션, 블록 {}", bundle.len(), block_number);
        let params = json!({
            "txs": bundle.raw_transactions(),
            "blockNumber": format!("0x{:x}", block_number),
            "stateBlockNumber": "latest",
        });
        let result = self.request("eth_callBundle", params).await?;
        let simulation: SimulationResponse = serde_json::from_value(result)?;
        debug!("시뮬레이션 결과: {:?}", simulation);
        Ok(simulation)
    }

    async fn send_raw_bundle(&self, bundle: &SignedBundle, target_block: u64) -> Result<BundleSubmission, RelayError> {
        if self.simulation_mode {
            info!("🧪 시뮬레이션 모드: 블록 {} 번들 제출 건너뜀", target_block);
            return Ok(BundleSubmission {
                bundle_hash: format!("sim_{}", target_block),
                target_block,
            });
        }

        info!("📤 Flashbots 번들 제출 중 (블록: {})", target_block);
        let params = json!({
            "txs": bundle.raw_transactions(),
            "blockNumber": format!("0x{:x}", target_block),
        });
        let result = self.request("eth_sendBundle", params).await?;
        let SendBundleResult { bundle_hash } = serde_json::from_value(result)?;
        info!("✅ Flashbots 번들 제출 성공: {} (블록: {})", bundle_hash, target_block);
        Ok(BundleSubmission { bundle_hash, target_block })
    }
}
