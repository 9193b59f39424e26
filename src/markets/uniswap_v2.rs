use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ethers::abi::{parse_abi, Abi};
use ethers::contract::{BaseContract, Contract};
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, U256};
use futures::future::join_all;
use tracing::{debug, warn};

use super::{EthMarket, MarketError, MultipleCallData, ReserveSync};
use crate::constants::{UNISWAP_V2_FEE_DENOMINATOR, UNISWAP_V2_FEE_NUMERATOR};

const PAIR_ABI: &[&str] = &[
    "function swap(uint256 amount0Out, uint256 amount1Out, address to, bytes data) external",
    "function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)",
];

fn pair_abi() -> Result<Abi, MarketError> {
    parse_abi(PAIR_ABI).map_err(|e| MarketError::Encoding(e.to_string()))
}

/// Uniswap V2 스타일 상수곱 페어 (uniswap, sushiswap, ...)
#[derive(Debug)]
pub struct UniswapV2Pair {
    protocol: String,
    address: Address,
    tokens: [Address; 2],
    reserves: RwLock<(U256, U256)>,
}

impl UniswapV2Pair {
    pub fn new(protocol: &str, address: Address, tokens: [Address; 2], reserve0: U256, reserve1: U256) -> Self {
        Self {
            protocol: protocol.to_string(),
            address,
            tokens,
            reserves: RwLock::new((reserve0, reserve1)),
        }
    }

    /// 현재 리저브 스냅샷 (reserve0, reserve1)
    pub fn reserves(&self) -> (U256, U256) {
        *self.reserves.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_reserves(&self, reserve0: U256, reserve1: U256) {
        *self.reserves.write().unwrap_or_else(|e| e.into_inner()) = (reserve0, reserve1);
    }

    /// (reserve_in, reserve_out) 순서로 정렬된 리저브
    fn oriented_reserves(&self, token_in: Address, token_out: Address) -> Result<(U256, U256), MarketError> {
        let (reserve0, reserve1) = self.reserves();
        let [token0, token1] = self.tokens;
        if token_in == token0 && token_out == token1 {
            Ok((reserve0, reserve1))
        } else if token_in == token1 && token_out == token0 {
            Ok((reserve1, reserve0))
        } else {
            let token = if self.trades_token(token_in) { token_out } else { token_in };
            Err(MarketError::UnsupportedToken { market: self.address, token })
        }
    }

    fn other_token(&self, token: Address) -> Result<Address, MarketError> {
        let [token0, token1] = self.tokens;
        if token == token0 {
            Ok(token1)
        } else if token == token1 {
            Ok(token0)
        } else {
            Err(MarketError::UnsupportedToken { market: self.address, token })
        }
    }

    fn overflow(&self) -> MarketError {
        MarketError::Overflow { market: self.address }
    }

    /// getAmountOut: (in·997·R_out) / (R_in·1000 + in·997)
    fn amount_out(&self, amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256, MarketError> {
        let amount_in_with_fee = amount_in
            .checked_mul(U256::from(UNISWAP_V2_FEE_NUMERATOR))
            .ok_or_else(|| self.overflow())?;
        let numerator = amount_in_with_fee
            .checked_mul(reserve_out)
            .ok_or_else(|| self.overflow())?;
        let denominator = reserve_in
            .checked_mul(U256::from(UNISWAP_V2_FEE_DENOMINATOR))
            .and_then(|scaled| scaled.checked_add(amount_in_with_fee))
            .ok_or_else(|| self.overflow())?;
        if denominator.is_zero() {
            return Err(MarketError::InsufficientLiquidity { market: self.address });
        }
        Ok(numerator / denominator)
    }

    /// getAmountIn: R_in·out·1000 / ((R_out − out)·997) + 1
    fn amount_in(&self, amount_out: U256, reserve_in: U256, reserve_out: U256) -> Result<U256, MarketError> {
        if amount_out >= reserve_out {
            return Err(MarketError::InsufficientLiquidity { market: self.address });
        }
        let numerator = reserve_in
            .checked_mul(amount_out)
            .and_then(|n| n.checked_mul(U256::from(UNISWAP_V2_FEE_DENOMINATOR)))
            .ok_or_else(|| self.overflow())?;
        let denominator = (reserve_out - amount_out)
            .checked_mul(U256::from(UNISWAP_V2_FEE_NUMERATOR))
            .ok_or_else(|| self.overflow())?;
        Ok(numerator / denominator + 1)
    }

    /// getReserves 호출로 리저브 갱신
    pub async fn refresh_reserves<M>(&self, client: Arc<M>) -> Result<(), MarketError>
    where
        M: Middleware + 'static,
    {
        let contract = Contract::<M>::new(self.address, pair_abi()?, client);
        let (reserve0, reserve1, _): (u128, u128, u32) = contract
            .method::<_, (u128, u128, u32)>("getReserves", ())
            .map_err(|e| MarketError::Encoding(e.to_string()))?
            .call()
            .await
            .map_err(|e| MarketError::ReserveQuery(e.to_string()))?;

        self.set_reserves(U256::from(reserve0), U256::from(reserve1));
        Ok(())
    }
}

#[async_trait]
impl EthMarket for UniswapV2Pair {
    fn market_address(&self) -> Address {
        self.address
    }

    fn tokens(&self) -> [Address; 2] {
        self.tokens
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn tokens_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256, MarketError> {
        let (reserve_in, reserve_out) = self.oriented_reserves(token_in, token_out)?;
        self.amount_out(amount_in, reserve_in, reserve_out)
    }

    fn tokens_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256, MarketError> {
        let (reserve_in, reserve_out) = self.oriented_reserves(token_in, token_out)?;
        self.amount_in(amount_out, reserve_in, reserve_out)
    }

    async fn sell_tokens_to_next_market(
        &self,
        token_in: Address,
        amount_in: U256,
        next_market: &dyn EthMarket,
    ) -> Result<MultipleCallData, MarketError> {
        // 페어는 출력 토큰을 다음 페어로 바로 보낼 수 있다
        let payload = self.sell_tokens(token_in, amount_in, next_market.market_address()).await?;
        Ok(MultipleCallData::single(self.address, payload))
    }

    async fn sell_tokens(&self, token_in: Address, amount_in: U256, recipient: Address) -> Result<Bytes, MarketError> {
        let token_out = self.other_token(token_in)?;
        let amount_out = self.tokens_out(token_in, token_out, amount_in)?;

        // 출력량은 반대쪽 토큰 인덱스에 들어간다
        let (amount0_out, amount1_out) = if token_in == self.tokens[0] {
            (U256::zero(), amount_out)
        } else {
            (amount_out, U256::zero())
        };

        BaseContract::from(pair_abi()?)
            .encode("swap", (amount0_out, amount1_out, recipient, Bytes::new()))
            .map_err(|e| MarketError::Encoding(e.to_string()))
    }
}

/// 설정된 모든 페어의 리저브를 동시에 갱신하고 성공 개수를 반환
///
/// 갱신에 실패한 페어는 이전 리저브를 유지한다.
pub async fn update_reserves<M>(client: Arc<M>, markets: &[Arc<UniswapV2Pair>]) -> usize
where
    M: Middleware + 'static,
{
    let results = join_all(
        markets
            .iter()
            .map(|market| market.refresh_reserves(Arc::clone(&client))),
    )
    .await;

    let mut refreshed = 0;
    for (market, result) in markets.iter().zip(results) {
        match result {
            Ok(()) => refreshed += 1,
            Err(e) => warn!("⚠️ 리저브 갱신 실패 {:?}: {}", market.market_address(), e),
        }
    }
    debug!("🔄 리저브 갱신: {}/{}", refreshed, markets.len());
    refreshed
}

/// `getReserves` 기반 리저브 수집기
pub struct UniswapV2ReserveSync<M> {
    client: Arc<M>,
    pairs: Vec<Arc<UniswapV2Pair>>,
}

impl<M: Middleware + 'static> UniswapV2ReserveSync<M> {
    pub fn new(client: Arc<M>, pairs: Vec<Arc<UniswapV2Pair>>) -> Self {
        Self { client, pairs }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ReserveSync for UniswapV2ReserveSync<M> {
    async fn sync_reserves(&self) -> usize {
        update_reserves(Arc::clone(&self.client), &self.pairs).await
    }
}
