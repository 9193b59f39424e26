pub mod bundle;
pub mod client;

use async_trait::async_trait;

pub use bundle::{sign_bundle, BundleSubmission, BundledTransaction, SignedBundle, SimulationResponse, TransactionSimulation};
pub use client::FlashbotsClient;

/// 릴레이 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Relay JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid relay response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// 프라이빗 번들 릴레이
#[async_trait]
pub trait BundleRelay: Send + Sync {
    async fn sign_bundle(&self, transactions: Vec<BundledTransaction>) -> Result<SignedBundle, RelayError>;

    /// `block_number` 블록에서의 번들 실행 결과
    async fn simulate(&self, bundle: &SignedBundle, block_number: u64) -> Result<SimulationResponse, RelayError>;

    /// `target_block` 블록 포함을 노리고 번들 제출
    async fn send_raw_bundle(&self, bundle: &SignedBundle, target_block: u64) -> Result<BundleSubmission, RelayError>;
}
