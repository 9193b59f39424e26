//! 테스트용 마켓/체인/릴레이 대역

pub mod market_mock;
pub mod rpc_mock;
pub mod flashbots_mock;

pub use flashbots_mock::MockRelay;
pub use market_mock::MockMarket;
pub use rpc_mock::MockChainClient;

use ethers::signers::LocalWallet;

/// 잘 알려진 테스트 키
pub const TEST_PRIVATE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub fn test_wallet() -> LocalWallet {
    TEST_PRIVATE_KEY.parse().expect("valid test key")
}
