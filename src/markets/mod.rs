//! 거래소 마켓 추상화
//!
//! 탐지기와 번들 제출기는 `EthMarket` 트레이트만 본다. 견적은 현재 리저브에 대한
//! 순수 함수이고, 호출 데이터 생성은 베뉴별 인코딩을 담당한다.

pub mod uniswap_v2;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};

pub use uniswap_v2::{UniswapV2Pair, UniswapV2ReserveSync};

/// 마켓 에러 타입
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Unsupported token {token:?} for market {market:?}")]
    UnsupportedToken { market: Address, token: Address },

    #[error("Insufficient liquidity on {market:?}")]
    InsufficientLiquidity { market: Address },

    #[error("Arithmetic overflow while quoting {market:?}")]
    Overflow { market: Address },

    #[error("Calldata generation failed: {0}")]
    Encoding(String),

    #[error("Reserve query failed: {0}")]
    ReserveQuery(String),
}

/// 순서대로 실행될 호출 목록 (targets[i] ↔ data[i])
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipleCallData {
    pub targets: Vec<Address>,
    pub data: Vec<Bytes>,
}

impl MultipleCallData {
    pub fn single(target: Address, data: Bytes) -> Self {
        Self {
            targets: vec![target],
            data: vec![data],
        }
    }

    /// 호출 하나를 뒤에 붙인다
    pub fn push(&mut self, target: Address, data: Bytes) {
        self.targets.push(target);
        self.data.push(data);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// 두 토큰을 거래하는 베뉴
#[async_trait]
pub trait EthMarket: Send + Sync + fmt::Debug {
    /// 마켓 컨트랙트 주소
    fn market_address(&self) -> Address;

    /// 마켓 수명 동안 고정된 토큰 쌍
    fn tokens(&self) -> [Address; 2];

    /// 베뉴 이름 (uniswap_v2, sushiswap, ...)
    fn protocol(&self) -> &str;

    /// `amount_in`의 `token_in`을 넣었을 때 받는 `token_out` 수량
    fn tokens_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256, MarketError>;

    /// `amount_out`의 `token_out`을 받기 위해 필요한 `token_in` 수량
    fn tokens_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256, MarketError>;

    /// 이 마켓에서 판 결과물을 다음 마켓으로 바로 보내는 호출들
    async fn sell_tokens_to_next_market(
        &self,
        token_in: Address,
        amount_in: U256,
        next_market: &dyn EthMarket,
    ) -> Result<MultipleCallData, MarketError>;

    /// `amount_in`을 팔고 결과물을 `recipient`에게 보내는 호출 데이터
    async fn sell_tokens(&self, token_in: Address, amount_in: U256, recipient: Address) -> Result<Bytes, MarketError>;

    fn trades_token(&self, token: Address) -> bool {
        self.tokens().contains(&token)
    }
}

/// 블록마다 마켓 리저브를 갱신하는 수집기
#[async_trait]
pub trait ReserveSync: Send + Sync {
    /// 갱신에 성공한 마켓 수
    async fn sync_reserves(&self) -> usize;
}

/// 토큰 주소 → 그 토큰을 기준 자산과 거래하는 마켓들
pub type MarketsByToken = BTreeMap<Address, Vec<Arc<dyn EthMarket>>>;

/// 기준 자산을 포함하는 마켓만 상대 토큰별로 묶는다
pub fn group_markets_by_token<M>(markets: &[Arc<M>], base_token: Address) -> MarketsByToken
where
    M: EthMarket + 'static,
{
    let mut grouped = MarketsByToken::new();
    for market in markets {
        let [token0, token1] = market.tokens();
        let token = if token0 == base_token {
            token1
        } else if token1 == base_token {
            token0
        } else {
            continue;
        };
        grouped
            .entry(token)
            .or_default()
            .push(Arc::clone(market) as Arc<dyn EthMarket>);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ether, WETH_ADDRESS};

    fn pair(address: u64, token: Address) -> Arc<UniswapV2Pair> {
        Arc::new(UniswapV2Pair::new(
            "uniswap_v2",
            Address::from_low_u64_be(address),
            [WETH_ADDRESS, token],
            ether() * 100,
            ether() * 100,
        ))
    }

    #[test]
    fn test_group_markets_by_token() {
        let token_a = Address::from_low_u64_be(0xa);
        let token_b = Address::from_low_u64_be(0xb);
        let markets = vec![
            pair(1, token_a),
            pair(2, token_a),
            pair(3, token_b),
            // 기준 자산이 없는 쌍은 무시
            Arc::new(UniswapV2Pair::new(
                "sushiswap",
                Address::from_low_u64_be(4),
                [token_a, token_b],
                ether(),
                ether(),
            )),
        ];

        let grouped = group_markets_by_token(&markets, WETH_ADDRESS);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&token_a].len(), 2);
        assert_eq!(grouped[&token_b].len(), 1);
        assert_eq!(grouped[&token_b][0].market_address(), Address::from_low_u64_be(3));
    }

    #[test]
    fn test_multiple_call_data_push() {
        let mut calls = MultipleCallData::single(Address::from_low_u64_be(1), Bytes::from(vec![0x01]));
        calls.push(Address::from_low_u64_be(2), Bytes::from(vec![0x02]));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls.targets.len(), calls.data.len());
        assert!(!calls.is_empty());
    }
}
