//! 번들 제출기
//!
//! 순위가 매겨진 기회를 하나씩 시도한다. 각 시도는 명시적인 상태 값으로 진행되며
//! (`Built → CostChecked → Simulated → Submitted`), 어느 관문에서든 실패하면
//! `Skipped`로 끝나고 다음 기회로 넘어간다. 첫 성공에서 멈춘다.

use std::fmt;
use std::sync::Arc;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::blockchain::{BundleExecutorContract, ChainClient};
use crate::constants::{
    DEFAULT_GAS_LIMIT, GAS_LIMIT_MULTIPLIER, MAX_GAS_ESTIMATE, SIMULATION_BLOCK_OFFSET, TARGET_BLOCK_OFFSETS,
    WETH_ADDRESS,
};
use crate::flashbots::{BundleRelay, BundleSubmission, BundledTransaction, RelayError, SignedBundle, SimulationResponse};
use crate::types::CrossedMarketOpportunity;
use crate::utils::{format_eth, format_gwei};

/// 사이클 결과 에러
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("No arbitrage submitted to relay ({attempted} opportunities attempted)")]
    NoArbitrageSubmitted { attempted: usize },

    #[error("Bundle broadcast for block {target_block} failed: {source}")]
    Broadcast { target_block: u64, source: RelayError },
}

/// 제출기 설정
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub base_token: Address,
    /// 추정 전 트랜잭션에 채우는 가스 한도
    pub default_gas_limit: U256,
    /// 추정치가 이 값을 넘으면 건너뜀
    pub max_gas_estimate: U256,
    pub gas_limit_multiplier: U256,
    pub simulation_block_offset: u64,
    pub target_block_offsets: Vec<u64>,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            base_token: WETH_ADDRESS,
            default_gas_limit: U256::from(DEFAULT_GAS_LIMIT),
            max_gas_estimate: U256::from(MAX_GAS_ESTIMATE),
            gas_limit_multiplier: U256::from(GAS_LIMIT_MULTIPLIER),
            simulation_block_offset: SIMULATION_BLOCK_OFFSET,
            target_block_offsets: TARGET_BLOCK_OFFSETS.to_vec(),
        }
    }
}

/// 시도가 건너뛰어진 이유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BuildFailed(String),
    EstimateFailed(String),
    GasEstimateTooHigh(U256),
    SigningFailed(String),
    SimulationError(String),
    SimulationReverted { index: usize, reason: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BuildFailed(e) => write!(f, "call construction failed: {}", e),
            SkipReason::EstimateFailed(e) => write!(f, "gas estimation failed: {}", e),
            SkipReason::GasEstimateTooHigh(gas) => write!(f, "gas estimate too high: {}", gas),
            SkipReason::SigningFailed(e) => write!(f, "signing failed: {}", e),
            SkipReason::SimulationError(e) => write!(f, "simulation error: {}", e),
            SkipReason::SimulationReverted { index, reason } => {
                write!(f, "simulation reverted at tx {}: {}", index, reason)
            }
        }
    }
}

/// 성공한 제출 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub token_address: Address,
    pub volume: U256,
    pub profit: U256,
    pub miner_reward: U256,
    pub gas_limit: U256,
    pub simulated_block: u64,
    /// eth_callBundle이 돌려준 번들 해시
    pub simulated_bundle_hash: Option<H256>,
    pub submissions: Vec<BundleSubmission>,
}

/// 기회 하나에 대한 시도 상태
#[derive(Debug, Clone)]
pub enum AttemptState {
    Built {
        transaction: TypedTransaction,
        miner_reward: U256,
    },
    CostChecked {
        transaction: TypedTransaction,
        miner_reward: U256,
    },
    Simulated {
        bundle: SignedBundle,
        simulation: SimulationResponse,
        miner_reward: U256,
        gas_limit: U256,
    },
    Submitted(SubmissionReceipt),
    Skipped(SkipReason),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Submitted(_) | AttemptState::Skipped(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttemptState::Built { .. } => "built",
            AttemptState::CostChecked { .. } => "cost_checked",
            AttemptState::Simulated { .. } => "simulated",
            AttemptState::Submitted(_) => "submitted",
            AttemptState::Skipped(_) => "skipped",
        }
    }
}

/// 번들 제출기
pub struct BundleSubmitter {
    chain: Arc<dyn ChainClient>,
    relay: Arc<dyn BundleRelay>,
    executor: BundleExecutorContract,
    signer: LocalWallet,
    config: SubmitterConfig,
    /// 검색자 트랜잭션 앞에 놓일 서명 완료 트랜잭션들
    leading_transactions: Vec<Bytes>,
}

impl BundleSubmitter {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        relay: Arc<dyn BundleRelay>,
        executor: BundleExecutorContract,
        signer: LocalWallet,
        config: SubmitterConfig,
    ) -> Self {
        Self {
            chain,
            relay,
            executor,
            signer,
            config,
            leading_transactions: Vec::new(),
        }
    }

    pub fn with_leading_transactions(mut self, transactions: Vec<Bytes>) -> Self {
        self.leading_transactions = transactions;
        self
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// 호출 목록을 만들고 실행 컨트랙트 트랜잭션을 채운다
    pub async fn build(&self, opportunity: &CrossedMarketOpportunity, miner_reward: U256) -> AttemptState {
        match self.build_transaction(opportunity, miner_reward).await {
            Ok(transaction) => AttemptState::Built { transaction, miner_reward },
            Err(reason) => AttemptState::Skipped(reason),
        }
    }

    async fn build_transaction(
        &self,
        opportunity: &CrossedMarketOpportunity,
        miner_reward: U256,
    ) -> Result<TypedTransaction, SkipReason> {
        let base = self.config.base_token;
        let buy = &opportunity.buy_from_market;
        let sell = &opportunity.sell_to_market;
        let failed = |e: &dyn fmt::Display| SkipReason::BuildFailed(e.to_string());

        let mut calls = buy
            .sell_tokens_to_next_market(base, opportunity.volume, sell.as_ref())
            .await
            .map_err(|e| failed(&e))?;
        let intermediate = buy
            .tokens_out(base, opportunity.token_address, opportunity.volume)
            .map_err(|e| failed(&e))?;
        let sell_payload = sell
            .sell_tokens(opportunity.token_address, intermediate, self.executor.address())
            .await
            .map_err(|e| failed(&e))?;
        calls.push(sell.market_address(), sell_payload);

        debug!("📦 {}개 호출 구성: {:?}", calls.len(), calls.targets);
        self.executor
            .populate_uniswap_weth(
                opportunity.volume,
                miner_reward,
                calls.targets,
                calls.data,
                self.signer.address(),
                self.config.default_gas_limit,
            )
            .map_err(|e| failed(&e))
    }

    /// 상태를 한 단계 진행한다. 방송 실패만 에러로 사이클을 끝낸다.
    pub async fn advance(
        &self,
        opportunity: &CrossedMarketOpportunity,
        block_number: u64,
        state: AttemptState,
    ) -> Result<AttemptState, SubmitError> {
        let next = match state {
            AttemptState::Built { transaction, miner_reward } => self.check_cost(transaction, miner_reward).await,
            AttemptState::CostChecked { transaction, miner_reward } => {
                self.sign_and_simulate(transaction, miner_reward, block_number).await
            }
            AttemptState::Simulated { bundle, simulation, miner_reward, gas_limit } => {
                let submissions = self.broadcast(&bundle, block_number).await?;
                if let Some(bundle_hash) = simulation.bundle_hash {
                    info!("📦 번들 {:?} 제출 완료 ({}개 블록)", bundle_hash, submissions.len());
                }
                AttemptState::Submitted(SubmissionReceipt {
                    token_address: opportunity.token_address,
                    volume: opportunity.volume,
                    profit: opportunity.profit,
                    miner_reward,
                    gas_limit,
                    simulated_block: block_number + self.config.simulation_block_offset,
                    simulated_bundle_hash: simulation.bundle_hash,
                    submissions,
                })
            }
            terminal => terminal,
        };
        Ok(next)
    }

    async fn check_cost(&self, mut transaction: TypedTransaction, miner_reward: U256) -> AttemptState {
        let estimate = match self.chain.estimate_gas(&transaction).await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!("⚠️ 가스 추정 실패, 다음 기회로: {}", e);
                return AttemptState::Skipped(SkipReason::EstimateFailed(e.to_string()));
            }
        };
        if estimate > self.config.max_gas_estimate {
            warn!("⚠️ 가스 추정치 과다 ({} > {}), 다음 기회로", estimate, self.config.max_gas_estimate);
            return AttemptState::Skipped(SkipReason::GasEstimateTooHigh(estimate));
        }

        transaction.set_gas(estimate * self.config.gas_limit_multiplier);
        AttemptState::CostChecked { transaction, miner_reward }
    }

    async fn sign_and_simulate(
        &self,
        mut transaction: TypedTransaction,
        miner_reward: U256,
        block_number: u64,
    ) -> AttemptState {
        let nonce = match self.chain.transaction_count(self.signer.address()).await {
            Ok(nonce) => nonce,
            Err(e) => return AttemptState::Skipped(SkipReason::SigningFailed(e.to_string())),
        };
        transaction.set_nonce(nonce);
        let gas_limit = transaction.gas().copied().unwrap_or(self.config.default_gas_limit);

        let mut items: Vec<BundledTransaction> = self
            .leading_transactions
            .iter()
            .cloned()
            .map(BundledTransaction::Signed)
            .collect();
        items.push(BundledTransaction::Signer { signer: self.signer.clone(), transaction });

        let bundle = match self.relay.sign_bundle(items).await {
            Ok(bundle) => bundle,
            Err(e) => return AttemptState::Skipped(SkipReason::SigningFailed(e.to_string())),
        };

        let simulation_block = block_number + self.config.simulation_block_offset;
        let simulation = match self.relay.simulate(&bundle, simulation_block).await {
            Ok(simulation) => simulation,
            Err(e) => {
                warn!("❌ 번들 시뮬레이션 오류: {}", e);
                return AttemptState::Skipped(SkipReason::SimulationError(e.to_string()));
            }
        };
        if let Some(error) = &simulation.error {
            warn!("❌ 번들 시뮬레이션 실패: {}", error);
            return AttemptState::Skipped(SkipReason::SimulationError(error.clone()));
        }
        if let Some((index, result)) = simulation.first_revert() {
            let reason = result
                .revert
                .clone()
                .or_else(|| result.error.clone())
                .unwrap_or_default();
            warn!("❌ 시뮬레이션 revert (tx {}): {}", index, reason);
            return AttemptState::Skipped(SkipReason::SimulationReverted { index, reason });
        }

        info!(
            "🔬 시뮬레이션 성공: coinbase diff {} ETH, 유효 가스 가격 {} gwei ({} gas)",
            format_eth(simulation.coinbase_diff),
            format_gwei(simulation.effective_gas_price()),
            simulation.total_gas_used
        );
        AttemptState::Simulated { bundle, simulation, miner_reward, gas_limit }
    }

    /// 같은 번들을 목표 블록들에 동시에 제출, 모두 수락되어야 완료
    async fn broadcast(&self, bundle: &SignedBundle, block_number: u64) -> Result<Vec<BundleSubmission>, SubmitError> {
        let sends = self.config.target_block_offsets.iter().map(|offset| {
            let target_block = block_number + offset;
            async move {
                self.relay
                    .send_raw_bundle(bundle, target_block)
                    .await
                    .map_err(|source| SubmitError::Broadcast { target_block, source })
            }
        });
        try_join_all(sends).await
    }

    /// 기회 하나를 끝까지 진행
    pub async fn attempt(
        &self,
        opportunity: &CrossedMarketOpportunity,
        block_number: u64,
        miner_reward: U256,
    ) -> Result<AttemptState, SubmitError> {
        let mut state = self.build(opportunity, miner_reward).await;
        while !state.is_terminal() {
            debug!("시도 상태: {}", state.name());
            state = self.advance(opportunity, block_number, state).await?;
        }
        Ok(state)
    }

    /// 순위대로 시도하고 첫 성공에서 멈춘다
    pub async fn take_crossed_markets(
        &self,
        opportunities: &[CrossedMarketOpportunity],
        block_number: u64,
        miner_reward_percentage: u8,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let percentage = U256::from(miner_reward_percentage.min(100));

        for (rank, opportunity) in opportunities.iter().enumerate() {
            let miner_reward = opportunity.profit * percentage / U256::from(100u64);
            info!(
                "📦 기회 #{} 시도: {} (채굴자 보상 {} ETH)",
                rank + 1,
                opportunity,
                format_eth(miner_reward)
            );

            match self.attempt(opportunity, block_number, miner_reward).await? {
                AttemptState::Submitted(receipt) => {
                    info!(
                        "✅ 번들 제출 완료: 블록 {:?}",
                        receipt.submissions.iter().map(|s| s.target_block).collect::<Vec<_>>()
                    );
                    return Ok(receipt);
                }
                AttemptState::Skipped(reason) => info!("⏭️ 기회 #{} 건너뜀: {}", rank + 1, reason),
                other => debug!("예상치 못한 종료 상태: {}", other.name()),
            }
        }

        Err(SubmitError::NoArbitrageSubmitted { attempted: opportunities.len() })
    }
}
