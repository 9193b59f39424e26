use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};

use crate::constants::{ether, WETH_ADDRESS};
use crate::markets::{EthMarket, MarketError, MultipleCallData};

/// 선형 가격 마켓
///
/// 토큰 1개(1e18)당 매수가 `buy_price`, 매도가 `sell_price` (기준 자산 wei).
#[derive(Debug, Clone)]
pub struct MockMarket {
    address: Address,
    token: Address,
    buy_price: U256,
    sell_price: U256,
    failing: bool,
    /// 이 수량을 넘는 견적은 유동성 부족
    max_amount: Option<U256>,
}

impl MockMarket {
    pub fn new(address: u64, token: Address, buy_price: U256, sell_price: U256) -> Self {
        Self {
            address: Address::from_low_u64_be(address),
            token,
            buy_price,
            sell_price,
            failing: false,
            max_amount: None,
        }
    }

    /// 모든 견적이 실패하는 마켓
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// 탐침은 통과하지만 큰 수량은 실패하는 마켓
    pub fn with_max_amount(mut self, max_amount: U256) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    fn check(&self, token_in: Address, token_out: Address, amount: U256) -> Result<(), MarketError> {
        if self.failing || self.max_amount.map_or(false, |max| amount > max) {
            return Err(MarketError::InsufficientLiquidity { market: self.address });
        }
        let valid = (token_in == WETH_ADDRESS && token_out == self.token)
            || (token_in == self.token && token_out == WETH_ADDRESS);
        if valid {
            Ok(())
        } else {
            Err(MarketError::UnsupportedToken { market: self.address, token: token_in })
        }
    }
}

#[async_trait]
impl EthMarket for MockMarket {
    fn market_address(&self) -> Address {
        self.address
    }

    fn tokens(&self) -> [Address; 2] {
        [WETH_ADDRESS, self.token]
    }

    fn protocol(&self) -> &str {
        "mock"
    }

    fn tokens_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256, MarketError> {
        self.check(token_in, token_out, amount_in)?;
        if token_in == WETH_ADDRESS {
            Ok(amount_in * ether() / self.buy_price)
        } else {
            Ok(amount_in * self.sell_price / ether())
        }
    }

    fn tokens_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256, MarketError> {
        self.check(token_in, token_out, amount_out)?;
        if token_in == WETH_ADDRESS {
            Ok(amount_out * self.buy_price / ether())
        } else {
            Ok(amount_out * ether() / self.sell_price)
        }
    }

    async fn sell_tokens_to_next_market(
        &self,
        token_in: Address,
        amount_in: U256,
        next_market: &dyn EthMarket,
    ) -> Result<MultipleCallData, MarketError> {
        let payload = self.sell_tokens(token_in, amount_in, next_market.market_address()).await?;
        Ok(MultipleCallData::single(self.address, payload))
    }

    async fn sell_tokens(&self, token_in: Address, amount_in: U256, recipient: Address) -> Result<Bytes, MarketError> {
        if self.failing {
            return Err(MarketError::Encoding("mock market is failing".to_string()));
        }
        // token_in(20) ++ amount_in(32) ++ recipient(20)
        let mut payload = token_in.as_bytes().to_vec();
        let mut amount = [0u8; 32];
        amount_in.to_big_endian(&mut amount);
        payload.extend_from_slice(&amount);
        payload.extend_from_slice(recipient.as_bytes());
        Ok(Bytes::from(payload))
    }
}
