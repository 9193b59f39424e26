use ethers::abi::parse_abi;
use ethers::contract::BaseContract;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};

use super::ChainError;

const BUNDLE_EXECUTOR_ABI: &[&str] = &[
    "function uniswapWeth(uint256 _wethAmountToFirstMarket, uint256 _ethAmountToCoinbase, address[] _targets, bytes[] _payloads) external payable",
];

/// 번들 실행 컨트랙트 (WETH로 첫 마켓에 진입해 순차 호출 후 코인베이스에 보상)
#[derive(Debug, Clone)]
pub struct BundleExecutorContract {
    address: Address,
    contract: BaseContract,
}

impl BundleExecutorContract {
    pub fn new(address: Address) -> Result<Self, ChainError> {
        let abi = parse_abi(BUNDLE_EXECUTOR_ABI).map_err(|e| ChainError::Abi(e.to_string()))?;
        Ok(Self {
            address,
            contract: BaseContract::from(abi),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `uniswapWeth(volume, minerReward, targets, payloads)` 호출 데이터
    pub fn encode_uniswap_weth(
        &self,
        weth_amount: U256,
        coinbase_reward: U256,
        targets: Vec<Address>,
        payloads: Vec<Bytes>,
    ) -> Result<Bytes, ChainError> {
        if targets.len() != payloads.len() {
            return Err(ChainError::Abi(format!(
                "targets/payloads length mismatch: {} != {}",
                targets.len(),
                payloads.len()
            )));
        }
        self.contract
            .encode("uniswapWeth", (weth_amount, coinbase_reward, targets, payloads))
            .map_err(|e| ChainError::Abi(e.to_string()))
    }

    /// 가스 가격 0의 레거시 트랜잭션으로 채운다 (보상은 코인베이스 전송으로 지급)
    pub fn populate_uniswap_weth(
        &self,
        weth_amount: U256,
        coinbase_reward: U256,
        targets: Vec<Address>,
        payloads: Vec<Bytes>,
        from: Address,
        gas_limit: U256,
    ) -> Result<TypedTransaction, ChainError> {
        let data = self.encode_uniswap_weth(weth_amount, coinbase_reward, targets, payloads)?;
        let request = TransactionRequest::new()
            .from(from)
            .to(self.address)
            .data(data)
            .gas(gas_limit)
            .gas_price(U256::zero());
        Ok(request.into())
    }
}
