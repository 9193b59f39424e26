//! 거래 크기 탐색 전략
//!
//! 두 전략 모두 수익 곡선이 단봉(unimodal)이라고 가정하고, 엄격히 더 큰 수익만
//! 최적값으로 채택한다.

use std::fmt;

use ethers::types::{Address, I256, U256};

use crate::constants::default_trial_volumes;
use crate::markets::{EthMarket, MarketError};

/// base → token (buy 마켓) → base (sell 마켓) 경로
#[derive(Clone, Copy)]
pub struct ArbRoute<'a> {
    pub buy: &'a dyn EthMarket,
    pub sell: &'a dyn EthMarket,
    pub base_token: Address,
    pub token: Address,
}

impl<'a> ArbRoute<'a> {
    pub fn new(buy: &'a dyn EthMarket, sell: &'a dyn EthMarket, base_token: Address, token: Address) -> Self {
        Self { buy, sell, base_token, token }
    }

    /// volume을 넣었을 때의 순수익 (음수 가능)
    pub fn profit_at(&self, volume: U256) -> Result<I256, MarketError> {
        let tokens_bought = self.buy.tokens_out(self.base_token, self.token, volume)?;
        let proceeds = self.sell.tokens_out(self.token, self.base_token, tokens_bought)?;
        I256::from_raw(proceeds)
            .checked_sub(I256::from_raw(volume))
            .ok_or(MarketError::Overflow { market: self.sell.market_address() })
    }
}

impl fmt::Debug for ArbRoute<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbRoute")
            .field("buy", &self.buy.market_address())
            .field("sell", &self.sell.market_address())
            .field("token", &self.token)
            .finish()
    }
}

/// 탐색 결과 (volume, profit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizedTrade {
    pub volume: U256,
    pub profit: I256,
}

/// 경로의 최적 거래 크기를 찾는 전략
pub trait VolumeSearch: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// 견적 실패는 에러로 전파되고, 호출자는 해당 쌍을 기회 없음으로 처리한다
    fn best_volume(&self, route: &ArbRoute<'_>) -> Result<Option<SizedTrade>, MarketError>;
}

/// 고정 사다리를 오름차순으로 시도하고, 수익이 꺾이는 지점에서 한 번 이분한다
#[derive(Debug, Clone)]
pub struct LadderBisectSearch {
    trial_volumes: Vec<U256>,
}

impl LadderBisectSearch {
    pub fn new(trial_volumes: Vec<U256>) -> Self {
        Self { trial_volumes }
    }

    pub fn trial_volumes(&self) -> &[U256] {
        &self.trial_volumes
    }
}

impl Default for LadderBisectSearch {
    fn default() -> Self {
        Self::new(default_trial_volumes())
    }
}

impl VolumeSearch for LadderBisectSearch {
    fn name(&self) -> &str {
        "ladder"
    }

    fn best_volume(&self, route: &ArbRoute<'_>) -> Result<Option<SizedTrade>, MarketError> {
        let mut best: Option<SizedTrade> = None;

        for &size in &self.trial_volumes {
            let profit = route.profit_at(size)?;
            match best {
                Some(current) if profit < current.profit => {
                    let try_size = (size + current.volume) / 2;
                    let try_profit = route.profit_at(try_size)?;
                    if try_profit > current.profit {
                        best = Some(SizedTrade { volume: try_size, profit: try_profit });
                    }
                    break;
                }
                _ => best = Some(SizedTrade { volume: size, profit }),
            }
        }

        Ok(best)
    }
}

/// [lower, upper] 구간 삼분 탐색
#[derive(Debug, Clone)]
pub struct TernarySearch {
    lower: U256,
    upper: U256,
    min_step: U256,
    max_iterations: usize,
}

impl TernarySearch {
    pub fn new(lower: U256, upper: U256, min_step: U256, max_iterations: usize) -> Self {
        let (lower, upper) = if lower <= upper { (lower, upper) } else { (upper, lower) };
        Self {
            lower,
            upper,
            // 구간을 3등분할 수 있어야 진행된다
            min_step: min_step.max(U256::from(2u64)),
            max_iterations,
        }
    }

    /// 사다리와 같은 범위 (가장 작은 시도 ~ 가장 큰 시도)
    pub fn over_ladder(trial_volumes: &[U256]) -> Self {
        let lower = trial_volumes.iter().min().copied().unwrap_or_default();
        let upper = trial_volumes.iter().max().copied().unwrap_or_default();
        Self::new(lower, upper, U256::exp10(12), 64)
    }
}

impl VolumeSearch for TernarySearch {
    fn name(&self) -> &str {
        "ternary"
    }

    fn best_volume(&self, route: &ArbRoute<'_>) -> Result<Option<SizedTrade>, MarketError> {
        let mut low = self.lower;
        let mut high = self.upper;
        let mut best = SizedTrade { volume: low, profit: route.profit_at(low)? };

        fn consider(volume: U256, profit: I256, best: &mut SizedTrade) {
            if profit > best.profit {
                *best = SizedTrade { volume, profit };
            }
        }

        for _ in 0..self.max_iterations {
            if high - low <= self.min_step {
                break;
            }
            let third = (high - low) / 3;
            let mid1 = low + third;
            let mid2 = high - third;
            let profit1 = route.profit_at(mid1)?;
            let profit2 = route.profit_at(mid2)?;
            consider(mid1, profit1, &mut best);
            consider(mid2, profit2, &mut best);

            if profit1 > profit2 {
                high = mid2;
            } else {
                low = mid1;
            }
        }

        // 남은 구간의 양 끝과 중간점 확인
        for volume in [low, (low + high) / 2, high] {
            let profit = route.profit_at(volume)?;
            consider(volume, profit, &mut best);
        }

        Ok(Some(best))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ether, WETH_ADDRESS};
    use crate::markets::UniswapV2Pair;
    use crate::mocks::MockMarket;

    fn token() -> Address {
        Address::from_low_u64_be(0xabc)
    }

    fn pools() -> (UniswapV2Pair, UniswapV2Pair) {
        // buy 마켓은 token이 싸고, sell 마켓은 token이 비싸다
        let buy = UniswapV2Pair::new(
            "uniswap_v2",
            Address::from_low_u64_be(1),
            [WETH_ADDRESS, token()],
            ether() * 100,
            ether() * 220,
        );
        let sell = UniswapV2Pair::new(
            "sushiswap",
            Address::from_low_u64_be(2),
            [WETH_ADDRESS, token()],
            ether() * 100,
            ether() * 180,
        );
        (buy, sell)
    }

    #[test]
    fn test_profit_at_matches_two_leg_quote() {
        let (buy, sell) = pools();
        let route = ArbRoute::new(&buy, &sell, WETH_ADDRESS, token());
        let volume = ether();
        let bought = buy.tokens_out(WETH_ADDRESS, token(), volume).unwrap();
        let proceeds = sell.tokens_out(token(), WETH_ADDRESS, bought).unwrap();
        assert_eq!(
            route.profit_at(volume).unwrap(),
            I256::from_raw(proceeds) - I256::from_raw(volume)
        );
    }

    #[test]
    fn test_ladder_result_within_extended_range() {
        let (buy, sell) = pools();
        let route = ArbRoute::new(&buy, &sell, WETH_ADDRESS, token());
        let search = LadderBisectSearch::default();

        let best = search.best_volume(&route).unwrap().unwrap();
        let ladder = search.trial_volumes();
        assert!(best.volume >= ladder[0]);
        assert!(best.volume <= ladder[ladder.len() - 1]);
        assert!(best.profit >= route.profit_at(ladder[0]).unwrap());
        assert!(best.profit > I256::zero());
    }

    #[test]
    fn test_ladder_bisects_after_downturn() {
        // 수익 정점이 2~10 ETH 사이에 있어 10 ETH에서 처음 꺾인다
        let (buy, sell) = pools();
        let route = ArbRoute::new(&buy, &sell, WETH_ADDRESS, token());
        let search = LadderBisectSearch::default();
        let best = search.best_volume(&route).unwrap().unwrap();

        let ladder = search.trial_volumes();
        let evaluated: Vec<I256> = ladder.iter().map(|v| route.profit_at(*v).unwrap()).collect();
        let peak = evaluated.iter().max().copied().unwrap();
        assert!(best.profit >= peak);
    }

    #[test]
    fn test_ladder_propagates_quote_failure() {
        let buy = MockMarket::new(1, token(), ether(), ether()).failing();
        let sell = MockMarket::new(2, token(), ether(), ether());
        let route = ArbRoute::new(&buy, &sell, WETH_ADDRESS, token());
        assert!(LadderBisectSearch::default().best_volume(&route).is_err());
    }

    #[test]
    fn test_ternary_agrees_with_ladder() {
        let (buy, sell) = pools();
        let route = ArbRoute::new(&buy, &sell, WETH_ADDRESS, token());
        let ladder = LadderBisectSearch::default();
        let ternary = TernarySearch::over_ladder(ladder.trial_volumes());

        let from_ladder = ladder.best_volume(&route).unwrap().unwrap();
        let from_ternary = ternary.best_volume(&route).unwrap().unwrap();
        // 삼분 탐색은 더 세밀하므로 사다리보다 나쁘지 않다
        assert!(from_ternary.profit >= from_ladder.profit);
        assert!(from_ternary.volume >= ladder.trial_volumes()[0]);
        assert!(from_ternary.volume <= ether() * 10);
    }

    #[test]
    fn test_ternary_normalizes_bounds() {
        let search = TernarySearch::new(ether(), ether() / 10, U256::zero(), 8);
        assert_eq!(search.lower, ether() / 10);
        assert_eq!(search.upper, ether());
        assert_eq!(search.min_step, U256::from(2u64));
    }
}
