use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::arbitrage::{DetectorConfig, LadderBisectSearch, SubmitterConfig, TernarySearch, VolumeSearch};
use crate::constants::{
    default_trial_volumes, DEFAULT_GAS_LIMIT, DEFAULT_MINER_REWARD_PERCENTAGE, GAS_LIMIT_MULTIPLIER,
    MAX_GAS_ESTIMATE, SIMULATION_BLOCK_OFFSET, TARGET_BLOCK_OFFSETS, WETH_ADDRESS,
};
use crate::flashbots::client::DEFAULT_RELAY_URL;
use crate::markets::UniswapV2Pair;
use crate::utils::parse_eth_amount;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// 블록 구독용 WebSocket
    pub ws_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashbotsConfig {
    pub relay_url: String,
    /// 릴레이 평판용 키. 비어 있으면 실행마다 임의 생성
    #[serde(default)]
    pub relay_signing_key: String,
    #[serde(default)]
    pub simulation_mode: bool,
    #[serde(default = "default_relay_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_relay_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// 검색자 트랜잭션 서명 키
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub bundle_executor_address: Option<Address>,
    /// 수익 중 코인베이스로 보내는 비율 (0-100)
    pub miner_reward_percentage: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Ladder,
    Ternary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageConfig {
    pub base_token: Address,
    pub probe_volume_eth: String,
    pub min_profit_eth: String,
    pub search: SearchStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub default_gas_limit: u64,
    pub max_gas_estimate: u64,
    pub gas_limit_multiplier: u64,
    pub simulation_block_offset: u64,
    pub target_block_offsets: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default)]
    pub healthcheck_url: Option<String>,
}

/// 감시할 페어 컨트랙트
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketConfig {
    pub protocol: String,
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub flashbots: FlashbotsConfig,
    pub executor: ExecutorConfig,
    pub arbitrage: ArbitrageConfig,
    pub submission: SubmissionConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// 프로세스 환경 변수로 비밀값 덮어쓰기
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(rpc_url) = lookup("ETHEREUM_RPC_URL") {
            self.network.rpc_url = rpc_url;
        }
        if let Some(ws_url) = lookup("WS_URL") {
            self.network.ws_url = ws_url;
        }
        if let Some(private_key) = lookup("PRIVATE_KEY") {
            self.executor.private_key = private_key;
        }
        if let Some(address) = lookup("BUNDLE_EXECUTOR_ADDRESS") {
            let address = address
                .trim()
                .parse::<Address>()
                .map_err(|e| anyhow!("Invalid BUNDLE_EXECUTOR_ADDRESS: {}", e))?;
            self.executor.bundle_executor_address = Some(address);
        }
        if let Some(signing_key) = lookup("FLASHBOTS_RELAY_SIGNING_KEY") {
            self.flashbots.relay_signing_key = signing_key;
        }
        if let Some(percentage) = lookup("MINER_REWARD_PERCENTAGE") {
            self.executor.miner_reward_percentage = percentage
                .trim()
                .parse()
                .with_context(|| format!("Invalid MINER_REWARD_PERCENTAGE: {}", percentage))?;
        }
        if let Some(url) = lookup("HEALTHCHECK_URL") {
            self.monitoring.healthcheck_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            return Err(anyhow!("Network RPC URL cannot be empty"));
        }
        if self.network.ws_url.is_empty() {
            return Err(anyhow!("Network WebSocket URL cannot be empty"));
        }

        if self.executor.private_key.is_empty() {
            return Err(anyhow!("PRIVATE_KEY must be configured"));
        }
        self.searcher_wallet()?;
        if self.executor.bundle_executor_address.is_none() {
            return Err(anyhow!("BUNDLE_EXECUTOR_ADDRESS must be configured"));
        }
        if self.executor.miner_reward_percentage > 100 {
            return Err(anyhow!(
                "Miner reward percentage must be between 0 and 100, got {}",
                self.executor.miner_reward_percentage
            ));
        }

        if !self.flashbots.relay_signing_key.is_empty() {
            self.relay_signer()?;
        }

        if self.probe_volume()?.is_zero() {
            return Err(anyhow!("Probe volume must be positive"));
        }
        self.min_profit()?;

        let submission = &self.submission;
        if submission.default_gas_limit == 0 || submission.max_gas_estimate == 0 {
            return Err(anyhow!("Gas limits must be positive"));
        }
        if submission.gas_limit_multiplier == 0 {
            return Err(anyhow!("Gas limit multiplier must be at least 1"));
        }
        if submission.target_block_offsets.is_empty() || submission.target_block_offsets.contains(&0) {
            return Err(anyhow!("Target block offsets must be non-empty and point at future blocks"));
        }

        for market in &self.markets {
            if market.token0 == market.token1 {
                return Err(anyhow!("Market {:?} has identical tokens", market.address));
            }
        }

        Ok(())
    }

    pub fn probe_volume(&self) -> Result<U256> {
        parse_eth_amount(&self.arbitrage.probe_volume_eth)
    }

    pub fn min_profit(&self) -> Result<U256> {
        parse_eth_amount(&self.arbitrage.min_profit_eth)
    }

    pub fn detector_config(&self) -> Result<DetectorConfig> {
        Ok(DetectorConfig {
            base_token: self.arbitrage.base_token,
            probe_volume: self.probe_volume()?,
            min_profit: self.min_profit()?,
        })
    }

    pub fn volume_search(&self) -> Arc<dyn VolumeSearch> {
        match self.arbitrage.search {
            SearchStrategy::Ladder => Arc::new(LadderBisectSearch::default()),
            SearchStrategy::Ternary => Arc::new(TernarySearch::over_ladder(&default_trial_volumes())),
        }
    }

    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            base_token: self.arbitrage.base_token,
            default_gas_limit: U256::from(self.submission.default_gas_limit),
            max_gas_estimate: U256::from(self.submission.max_gas_estimate),
            gas_limit_multiplier: U256::from(self.submission.gas_limit_multiplier),
            simulation_block_offset: self.submission.simulation_block_offset,
            target_block_offsets: self.submission.target_block_offsets.clone(),
        }
    }

    pub fn searcher_wallet(&self) -> Result<LocalWallet> {
        let wallet = self
            .executor
            .private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| anyhow!("Invalid PRIVATE_KEY: {}", e))?;
        Ok(wallet.with_chain_id(self.network.chain_id))
    }

    /// 릴레이 서명 키. 설정이 없으면 임의 키를 만들고 true를 돌려준다
    pub fn relay_signer(&self) -> Result<(LocalWallet, bool)> {
        if self.flashbots.relay_signing_key.is_empty() {
            return Ok((LocalWallet::new(&mut rand::thread_rng()), true));
        }
        let wallet = self
            .flashbots
            .relay_signing_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| anyhow!("Invalid FLASHBOTS_RELAY_SIGNING_KEY: {}", e))?;
        Ok((wallet, false))
    }

    pub fn bundle_executor_address(&self) -> Result<Address> {
        self.executor
            .bundle_executor_address
            .ok_or_else(|| anyhow!("BUNDLE_EXECUTOR_ADDRESS must be configured"))
    }

    /// 설정된 페어들 (리저브는 첫 블록에서 채워진다)
    pub fn build_markets(&self) -> Vec<Arc<UniswapV2Pair>> {
        self.markets
            .iter()
            .map(|market| {
                Arc::new(UniswapV2Pair::new(
                    &market.protocol,
                    market.address,
                    [market.token0, market.token1],
                    U256::zero(),
                    U256::zero(),
                ))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: 1,
                rpc_url: "http://127.0.0.1:8545".to_string(),
                ws_url: "ws://127.0.0.1:8546".to_string(),
            },
            flashbots: FlashbotsConfig {
                relay_url: DEFAULT_RELAY_URL.to_string(),
                relay_signing_key: String::new(),
                simulation_mode: false,
                timeout_secs: default_relay_timeout_secs(),
            },
            executor: ExecutorConfig {
                private_key: String::new(),
                bundle_executor_address: None,
                miner_reward_percentage: DEFAULT_MINER_REWARD_PERCENTAGE,
            },
            arbitrage: ArbitrageConfig {
                base_token: WETH_ADDRESS,
                probe_volume_eth: "0.01".to_string(),
                min_profit_eth: "0.001".to_string(),
                search: SearchStrategy::Ladder,
            },
            submission: SubmissionConfig {
                default_gas_limit: DEFAULT_GAS_LIMIT,
                max_gas_estimate: MAX_GAS_ESTIMATE,
                gas_limit_multiplier: GAS_LIMIT_MULTIPLIER,
                simulation_block_offset: SIMULATION_BLOCK_OFFSET,
                target_block_offsets: TARGET_BLOCK_OFFSETS.to_vec(),
            },
            monitoring: MonitoringConfig {
                log_level: "info".to_string(),
                healthcheck_url: None,
            },
            markets: Vec::new(),
        }
    }
}
