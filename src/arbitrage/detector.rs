use std::sync::Arc;

use ethers::types::{Address, I256, U256};
use tracing::{debug, info};

use super::sizing::{ArbRoute, LadderBisectSearch, VolumeSearch};
use crate::constants::{default_min_profit, default_probe_volume, WETH_ADDRESS};
use crate::markets::{EthMarket, MarketsByToken};
use crate::types::CrossedMarketOpportunity;

/// 탐지기 설정
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub base_token: Address,
    /// 가격 탐침 크기 (wei)
    pub probe_volume: U256,
    /// 이 값을 초과해야 기회로 인정 (wei)
    pub min_profit: U256,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_token: WETH_ADDRESS,
            probe_volume: default_probe_volume(),
            min_profit: default_min_profit(),
        }
    }
}

/// 탐침 크기로 가격을 매긴 마켓
///
/// 사이클마다 새로 계산되고 캐시되지 않는다.
#[derive(Debug, Clone)]
pub struct PricedMarket {
    pub market: Arc<dyn EthMarket>,
    /// 탐침만큼의 토큰을 사는 데 드는 기준 자산
    pub buy_token_price: U256,
    /// 탐침만큼의 토큰을 팔아 받는 기준 자산
    pub sell_token_price: U256,
}

/// 교차 마켓 탐지기
#[derive(Debug, Clone)]
pub struct CrossedMarketDetector {
    config: DetectorConfig,
    search: Arc<dyn VolumeSearch>,
}

impl CrossedMarketDetector {
    pub fn new(config: DetectorConfig, search: Arc<dyn VolumeSearch>) -> Self {
        Self { config, search }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn search(&self) -> &dyn VolumeSearch {
        self.search.as_ref()
    }

    /// 탐침 견적. 견적이 실패한 마켓은 제외한다.
    pub fn price_markets(&self, token: Address, markets: &[Arc<dyn EthMarket>]) -> Vec<PricedMarket> {
        let base = self.config.base_token;
        let probe = self.config.probe_volume;

        markets
            .iter()
            .filter_map(|market| {
                let buy = market.tokens_in(base, token, probe);
                let sell = market.tokens_out(token, base, probe);
                match (buy, sell) {
                    (Ok(buy_token_price), Ok(sell_token_price)) => Some(PricedMarket {
                        market: Arc::clone(market),
                        buy_token_price,
                        sell_token_price,
                    }),
                    (Err(e), _) | (_, Err(e)) => {
                        debug!("가격 탐침 실패 {:?}: {}", market.market_address(), e);
                        None
                    }
                }
            })
            .collect()
    }

    /// sell 가격이 다른 마켓의 buy 가격보다 엄격히 큰 (buy, sell) 순서쌍
    pub fn crossed_pairs<'a>(priced: &'a [PricedMarket]) -> Vec<(&'a PricedMarket, &'a PricedMarket)> {
        let mut pairs = Vec::new();
        for (i, buy) in priced.iter().enumerate() {
            for (j, sell) in priced.iter().enumerate() {
                // 같은 마켓끼리는 차익이 없다
                if i == j {
                    continue;
                }
                if sell.sell_token_price > buy.buy_token_price {
                    pairs.push((buy, sell));
                }
            }
        }
        pairs
    }

    /// 토큰 하나에 대해 사이징된 최고 수익 쌍
    fn best_for_token(&self, token: Address, markets: &[Arc<dyn EthMarket>]) -> Option<CrossedMarketOpportunity> {
        if markets.len() < 2 {
            return None;
        }

        let priced = self.price_markets(token, markets);
        let mut best: Option<(I256, CrossedMarketOpportunity)> = None;

        for (buy, sell) in Self::crossed_pairs(&priced) {
            let route = ArbRoute::new(buy.market.as_ref(), sell.market.as_ref(), self.config.base_token, token);
            let trade = match self.search.best_volume(&route) {
                Ok(Some(trade)) => trade,
                Ok(None) => continue,
                Err(e) => {
                    debug!("사이징 실패 {:?}: {}", route, e);
                    continue;
                }
            };
            if trade.profit <= I256::zero() {
                continue;
            }
            // 동률이면 먼저 찾은 쌍 유지
            if best.as_ref().map_or(true, |(profit, _)| trade.profit > *profit) {
                best = Some((
                    trade.profit,
                    CrossedMarketOpportunity {
                        token_address: token,
                        buy_from_market: Arc::clone(&buy.market),
                        sell_to_market: Arc::clone(&sell.market),
                        volume: trade.volume,
                        profit: trade.profit.into_raw(),
                    },
                ));
            }
        }

        best.map(|(_, opportunity)| opportunity)
    }

    /// 마켓 스냅샷 → 수익 내림차순 기회 목록 (순수 함수)
    pub fn evaluate_markets(&self, markets_by_token: &MarketsByToken) -> Vec<CrossedMarketOpportunity> {
        let mut opportunities: Vec<CrossedMarketOpportunity> = markets_by_token
            .iter()
            .filter_map(|(token, markets)| self.best_for_token(*token, markets))
            .filter(|opportunity| opportunity.profit > self.config.min_profit)
            .collect();

        // 안정 정렬: 동률은 토큰 순서 유지
        opportunities.sort_by(|a, b| b.profit.cmp(&a.profit));
        opportunities
    }
}

impl Default for CrossedMarketDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), Arc::new(LadderBisectSearch::default()))
    }
}

/// 기회 요약 출력
pub fn print_crossed_market(opportunity: &CrossedMarketOpportunity) {
    info!("💡 {}", opportunity.summary());
}
