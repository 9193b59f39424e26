use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, H256, U256};
use serde::{Deserialize, Deserializer};

use super::RelayError;

/// 번들에 들어가는 트랜잭션
#[derive(Debug, Clone)]
pub enum BundledTransaction {
    /// 서명할 트랜잭션
    Signer {
        signer: LocalWallet,
        transaction: TypedTransaction,
    },
    /// 이미 서명된 raw 트랜잭션 (백런 대상 등)
    Signed(Bytes),
}

/// 릴레이에 보낼 수 있는 서명 완료 번들
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedBundle {
    pub transactions: Vec<Bytes>,
}

impl SignedBundle {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// JSON-RPC `txs` 파라미터 형식
    pub fn raw_transactions(&self) -> Vec<String> {
        self.transactions
            .iter()
            .map(|tx| format!("0x{}", hex::encode(tx)))
            .collect()
    }
}

/// 순서를 유지한 채 번들을 서명한다
pub async fn sign_bundle(transactions: Vec<BundledTransaction>, chain_id: u64) -> Result<SignedBundle, RelayError> {
    let mut signed = Vec::with_capacity(transactions.len());
    for item in transactions {
        match item {
            BundledTransaction::Signed(raw) => signed.push(raw),
            BundledTransaction::Signer { signer, mut transaction } => {
                transaction.set_chain_id(chain_id);
                let signer = signer.with_chain_id(chain_id);
                let signature = signer
                    .sign_transaction(&transaction)
                    .await
                    .map_err(|e| RelayError::Signing(e.to_string()))?;
                signed.push(transaction.rlp_signed(&signature));
            }
        }
    }
    Ok(SignedBundle { transactions: signed })
}

fn decimal_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    U256::from_dec_str(&raw).map_err(serde::de::Error::custom)
}

/// 번들 내 트랜잭션 하나의 시뮬레이션 결과
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSimulation {
    pub tx_hash: H256,
    pub gas_used: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub revert: Option<String>,
}

impl TransactionSimulation {
    pub fn reverted(&self) -> bool {
        self.error.is_some() || self.revert.is_some()
    }
}

/// `eth_callBundle` 응답
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    #[serde(default)]
    pub bundle_hash: Option<H256>,
    #[serde(deserialize_with = "decimal_u256")]
    pub coinbase_diff: U256,
    pub total_gas_used: u64,
    #[serde(default)]
    pub results: Vec<TransactionSimulation>,
    /// 릴레이가 번들 전체를 거부한 경우
    #[serde(default)]
    pub error: Option<String>,
}

impl SimulationResponse {
    /// 처음으로 revert된 트랜잭션 (인덱스, 결과)
    pub fn first_revert(&self) -> Option<(usize, &TransactionSimulation)> {
        self.results.iter().enumerate().find(|(_, result)| result.reverted())
    }

    /// coinbase_diff / total_gas_used (wei per gas)
    pub fn effective_gas_price(&self) -> U256 {
        if self.total_gas_used == 0 {
            return U256::zero();
        }
        self.coinbase_diff / U256::from(self.total_gas_used)
    }
}

/// `eth_sendBundle` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSubmission {
    pub bundle_hash: String,
    pub target_block: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, TransactionRequest};
    use ethers::utils::rlp::Rlp;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[tokio::test]
    async fn test_sign_bundle_keeps_order() {
        let wallet: LocalWallet = TEST_KEY.parse().unwrap();
        let tx: TypedTransaction = TransactionRequest::new()
            .from(wallet.address())
            .to(Address::from_low_u64_be(0xe0))
            .nonce(7u64)
            .gas(1_000_000u64)
            .gas_price(0u64)
            .into();
        let leading = Bytes::from(vec![0xf8, 0x01]);

        let bundle = sign_bundle(
            vec![
                BundledTransaction::Signed(leading.clone()),
                BundledTransaction::Signer { signer: wallet.clone(), transaction: tx.clone() },
            ],
            1,
        )
        .await
        .unwrap();

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.transactions[0], leading);

        // 서명된 트랜잭션을 복원하면 서명자가 일치해야 한다
        let raw = bundle.transactions[1].clone();
        let (_, signature) = TypedTransaction::decode_signed(&Rlp::new(raw.as_ref())).unwrap();
        let mut expected = tx;
        expected.set_chain_id(1u64);
        assert_eq!(signature.recover(expected.sighash()).unwrap(), wallet.address());
    }

    #[test]
    fn test_simulation_response_parsing() {
        let json = serde_json::json!({
            "bundleGasPrice": "476190476193",
            "bundleHash": "0x73b1e258c7a42fd0230b2fd05529c5d4b6fcb66c227783f8bece8aeacdd1db2e",
            "coinbaseDiff": "20000000000126000",
            "ethSentToCoinbase": "20000000000000000",
            "gasFees": "126000",
            "results": [{
                "coinbaseDiff": "10000000000063000",
                "gasUsed": 21000,
                "txHash": "0x669b4704a7d993a946cdd6e2f95233f308ce0c4649d2e04944e8299efcaa098a"
            }, {
                "coinbaseDiff": "10000000000063000",
                "gasUsed": 21000,
                "txHash": "0xa839ee83465657cac01adc1d50d96c1b586ed498120a84a64749c0034b4f19fa",
                "error": "execution reverted",
                "revert": "Insufficient profit"
            }],
            "stateBlockNumber": 5221585,
            "totalGasUsed": 42000
        });

        let response: SimulationResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.coinbase_diff, U256::from(20_000_000_000_126_000u64));
        assert_eq!(response.total_gas_used, 42000);
        assert_eq!(response.results.len(), 2);
        assert!(response.error.is_none());

        let (index, reverted) = response.first_revert().unwrap();
        assert_eq!(index, 1);
        assert_eq!(reverted.revert.as_deref(), Some("Insufficient profit"));
        assert_eq!(response.effective_gas_price(), U256::from(476_190_476_193u64));
    }

    #[test]
    fn test_effective_gas_price_without_gas() {
        let response = SimulationResponse {
            bundle_hash: None,
            coinbase_diff: U256::from(1000u64),
            total_gas_used: 0,
            results: vec![],
            error: None,
        };
        assert_eq!(response.effective_gas_price(), U256::zero());
        assert!(response.first_revert().is_none());
    }
}
