use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{H256, U256};
use tracing::info;

use crate::flashbots::{
    sign_bundle, BundleRelay, BundleSubmission, BundledTransaction, RelayError, SignedBundle, SimulationResponse,
    TransactionSimulation,
};

/// 호출 횟수를 기록하는 릴레이
#[derive(Debug)]
pub struct MockRelay {
    simulation: Result<SimulationResponse, String>,
    send_error: Option<String>,
    sign_calls: AtomicUsize,
    simulate_calls: AtomicUsize,
    send_calls: AtomicUsize,
    sent_blocks: Mutex<Vec<u64>>,
    last_simulated: Mutex<Option<SignedBundle>>,
}

impl MockRelay {
    /// 시뮬레이션 성공, 제출 성공
    pub fn accepting() -> Self {
        Self::with_simulation(Ok(Self::successful_simulation()))
    }

    pub fn with_simulation(simulation: Result<SimulationResponse, String>) -> Self {
        Self {
            simulation,
            send_error: None,
            sign_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            sent_blocks: Mutex::new(Vec::new()),
            last_simulated: Mutex::new(None),
        }
    }

    /// 시뮬레이션에서 첫 트랜잭션이 revert
    pub fn reverting() -> Self {
        let mut simulation = Self::successful_simulation();
        simulation.results[0].revert = Some("execution reverted".to_string());
        Self::with_simulation(Ok(simulation))
    }

    pub fn rejecting_sends(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_string());
        self
    }

    pub fn successful_simulation() -> SimulationResponse {
        SimulationResponse {
            bundle_hash: Some(H256::repeat_byte(0xb0)),
            coinbase_diff: U256::from(50_000_000_000_000_000u64),
            total_gas_used: 250_000,
            results: vec![TransactionSimulation {
                tx_hash: H256::repeat_byte(0x11),
                gas_used: 250_000,
                error: None,
                revert: None,
            }],
            error: None,
        }
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn simulate_calls(&self) -> usize {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// 마지막으로 시뮬레이션한 번들
    pub fn last_simulated(&self) -> Option<SignedBundle> {
        self.last_simulated.lock().unwrap().clone()
    }

    pub fn sent_blocks(&self) -> Vec<u64> {
        let mut blocks = self.sent_blocks.lock().unwrap().clone();
        blocks.sort_unstable();
        blocks
    }
}

#[async_trait]
impl BundleRelay for MockRelay {
    async fn sign_bundle(&self, transactions: Vec<BundledTransaction>) -> Result<SignedBundle, RelayError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        sign_bundle(transactions, 1).await
    }

    async fn simulate(&self, bundle: &SignedBundle, block_number: u64) -> Result<SimulationResponse, RelayError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_simulated.lock().unwrap() = Some(bundle.clone());
        info!("🎭 [MOCK] 🔬 Simulating bundle at block {}", block_number);
        self.simulation.clone().map_err(RelayError::InvalidResponse)
    }

    async fn send_raw_bundle(&self, _bundle: &SignedBundle, target_block: u64) -> Result<BundleSubmission, RelayError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_blocks.lock().unwrap().push(target_block);
        match &self.send_error {
            Some(message) => Err(RelayError::Rpc { code: -32000, message: message.clone() }),
            None => Ok(BundleSubmission {
                bundle_hash: format!("0x{:064x}", target_block),
                target_block,
            }),
        }
    }
}
