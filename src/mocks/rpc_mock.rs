use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, U256};
use tracing::debug;

use crate::blockchain::{ChainClient, ChainError};

/// 가스 추정 결과를 고정한 체인 클라이언트
#[derive(Debug)]
pub struct MockChainClient {
    estimate: Result<U256, String>,
    nonce: U256,
    estimate_calls: AtomicUsize,
    nonce_calls: AtomicUsize,
}

impl MockChainClient {
    pub fn new(estimate: u64) -> Self {
        Self {
            estimate: Ok(U256::from(estimate)),
            nonce: U256::zero(),
            estimate_calls: AtomicUsize::new(0),
            nonce_calls: AtomicUsize::new(0),
        }
    }

    /// 모든 가스 추정이 실패
    pub fn failing_estimate(message: &str) -> Self {
        Self {
            estimate: Err(message.to_string()),
            ..Self::new(0)
        }
    }

    pub fn estimate_calls(&self) -> usize {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub fn nonce_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, ChainError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        debug!("🎭 [MOCK] estimate_gas -> {:?}", self.estimate);
        self.estimate.clone().map_err(ChainError::Estimate)
    }

    async fn transaction_count(&self, _address: Address) -> Result<U256, ChainError> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce)
    }
}
