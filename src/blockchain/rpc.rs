use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, Ws};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, U256};
use tracing::{debug, info};

use super::{ChainClient, ChainError};

/// ethers `Middleware` 기반 체인 클라이언트
#[derive(Debug)]
pub struct EthersChainClient<M> {
    provider: Arc<M>,
}

impl<M> Clone for EthersChainClient<M> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider) }
    }
}

impl<M: Middleware + 'static> EthersChainClient<M> {
    pub fn new(provider: Arc<M>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> Arc<M> {
        Arc::clone(&self.provider)
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for EthersChainClient<M> {
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ChainError> {
        let estimate = self
            .provider
            .estimate_gas(tx, None)
            .await
            .map_err(|e| ChainError::Estimate(e.to_string()))?;
        debug!("⛽ 가스 추정: {}", estimate);
        Ok(estimate)
    }

    async fn transaction_count(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_transaction_count(address, None)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}

/// HTTP provider 연결
pub fn connect_http(url: &str) -> Result<Arc<Provider<Http>>> {
    info!("🔌 HTTP RPC 연결: {}", url);
    let provider = Provider::<Http>::try_from(url)
        .with_context(|| format!("Invalid RPC url: {}", url))?;
    Ok(Arc::new(provider))
}

/// WebSocket provider 연결 (블록 구독용)
pub async fn connect_ws(url: &str) -> Result<Arc<Provider<Ws>>> {
    info!("🔌 WebSocket RPC 연결: {}", url);
    let provider = Provider::<Ws>::connect(url)
        .await
        .with_context(|| format!("WebSocket connection failed: {}", url))?;
    let block = provider.get_block_number().await?;
    info!("✅ WebSocket 연결 성공, 현재 블록: {}", block);
    Ok(Arc::new(provider))
}
