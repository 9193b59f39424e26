pub mod rpc;
pub mod contracts;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, U256};

pub use contracts::BundleExecutorContract;
pub use rpc::EthersChainClient;

/// 체인 RPC 에러 타입
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Gas estimation failed: {0}")]
    Estimate(String),

    #[error("ABI error: {0}")]
    Abi(String),
}

/// 번들 제출기가 사용하는 체인 클라이언트
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ChainError>;

    /// 다음 nonce
    async fn transaction_count(&self, address: Address) -> Result<U256, ChainError>;
}
