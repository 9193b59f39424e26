use std::fmt;
use std::sync::Arc;

use ethers::types::{Address, U256};

use crate::markets::EthMarket;
use crate::utils::format_eth;

/// 한 사이클 동안만 유효한 교차 마켓 기회
///
/// profit = sell 마켓에서의 회수액 − volume, 항상 0보다 크다.
#[derive(Debug, Clone)]
pub struct CrossedMarketOpportunity {
    pub token_address: Address,
    pub buy_from_market: Arc<dyn EthMarket>,
    pub sell_to_market: Arc<dyn EthMarket>,
    pub volume: U256,
    pub profit: U256,
}

impl CrossedMarketOpportunity {
    /// 사용자에게 보여주는 여러 줄 요약
    pub fn summary(&self) -> String {
        let buy_tokens = self.buy_from_market.tokens();
        let sell_tokens = self.sell_to_market.tokens();
        format!(
            "Profit: {} ETH  Volume: {} ETH\n\
             {} ({:?})\n  {:?} => {:?}\n\
             {} ({:?})\n  {:?} => {:?}",
            format_eth(self.profit),
            format_eth(self.volume),
            self.buy_from_market.protocol(),
            self.buy_from_market.market_address(),
            buy_tokens[0],
            buy_tokens[1],
            self.sell_to_market.protocol(),
            self.sell_to_market.market_address(),
            sell_tokens[0],
            sell_tokens[1],
        )
    }
}

impl fmt::Display for CrossedMarketOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: buy {} {:?} -> sell {} {:?} | volume {} ETH | profit {} ETH",
            self.token_address,
            self.buy_from_market.protocol(),
            self.buy_from_market.market_address(),
            self.sell_to_market.protocol(),
            self.sell_to_market.market_address(),
            format_eth(self.volume),
            format_eth(self.profit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ether, WETH_ADDRESS};
    use crate::markets::UniswapV2Pair;

    #[test]
    fn test_opportunity_display() {
        let token = Address::from_low_u64_be(0xa);
        let buy: Arc<dyn EthMarket> = Arc::new(UniswapV2Pair::new(
            "uniswap_v2",
            Address::from_low_u64_be(1),
            [WETH_ADDRESS, token],
            ether(),
            ether(),
        ));
        let sell: Arc<dyn EthMarket> = Arc::new(UniswapV2Pair::new(
            "sushiswap",
            Address::from_low_u64_be(2),
            [WETH_ADDRESS, token],
            ether(),
            ether(),
        ));
        let opportunity = CrossedMarketOpportunity {
            token_address: token,
            buy_from_market: buy,
            sell_to_market: sell,
            volume: ether() / 2,
            profit: ether() / 100,
        };

        let line = opportunity.to_string();
        assert!(line.contains("uniswap_v2"));
        assert!(line.contains("sushiswap"));
        assert!(line.contains("volume 0.500000 ETH"));
        assert!(line.contains("profit 0.010000 ETH"));
        assert!(opportunity.summary().starts_with("Profit: 0.010000 ETH"));
    }

    #[test]
    fn test_summary_prints_pair_order_for_both_markets() {
        let token = Address::from_low_u64_be(0xa);
        let market = |address: u64| -> Arc<dyn EthMarket> {
            Arc::new(UniswapV2Pair::new(
                "uniswap_v2",
                Address::from_low_u64_be(address),
                [WETH_ADDRESS, token],
                ether(),
                ether(),
            ))
        };
        let opportunity = CrossedMarketOpportunity {
            token_address: token,
            buy_from_market: market(1),
            sell_to_market: market(2),
            volume: ether(),
            profit: ether() / 100,
        };

        let summary = opportunity.summary();
        let flow = format!("{:?} => {:?}", WETH_ADDRESS, token);
        assert_eq!(summary.matches(&flow).count(), 2);
        assert!(!summary.contains(&format!("{:?} => {:?}", token, WETH_ADDRESS)));
    }
}
