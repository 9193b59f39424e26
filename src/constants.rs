use ethers::types::{Address, H160, U256};

// 기준 자산 (mainnet WETH)
pub const WETH_ADDRESS: Address = H160([
    0xc0, 0x2a, 0xaa, 0x39, 0xb2, 0x23, 0xfe, 0x8d, 0x0a, 0x0e,
    0x5c, 0x4f, 0x27, 0xea, 0xd9, 0x08, 0x3c, 0x75, 0x6c, 0xc2,
]);

pub const ETHER_DECIMALS: u32 = 18;

// Gas limits
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;
pub const MAX_GAS_ESTIMATE: u64 = 1_400_000;
pub const GAS_LIMIT_MULTIPLIER: u64 = 2;

// 블록 오프셋: 시뮬레이션은 다음 블록, 제출은 다음 두 블록
pub const SIMULATION_BLOCK_OFFSET: u64 = 1;
pub const TARGET_BLOCK_OFFSETS: [u64; 2] = [1, 2];

pub const DEFAULT_MINER_REWARD_PERCENTAGE: u8 = 80;

// Uniswap V2 수수료 (0.3%)
pub const UNISWAP_V2_FEE_NUMERATOR: u64 = 997;
pub const UNISWAP_V2_FEE_DENOMINATOR: u64 = 1000;

/// 사이징 사다리: 1 ETH 대비 비율 (분자, 분모)
pub const TEST_VOLUME_RATIOS: [(u64, u64); 9] = [
    (1, 100),
    (1, 10),
    (1, 6),
    (1, 4),
    (1, 2),
    (1, 1),
    (2, 1),
    (5, 1),
    (10, 1),
];

/// 1 ETH (wei)
pub fn ether() -> U256 {
    U256::exp10(ETHER_DECIMALS as usize)
}

/// 가격 탐침 크기: 0.01 ETH
pub fn default_probe_volume() -> U256 {
    ether() / 100
}

/// 최소 수익: 0.001 ETH
pub fn default_min_profit() -> U256 {
    ether() / 1000
}

pub fn default_trial_volumes() -> Vec<U256> {
    TEST_VOLUME_RATIOS
        .iter()
        .map(|(num, den)| ether() * U256::from(*num) / U256::from(*den))
        .collect()
}
