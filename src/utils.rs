//! Formatting and parsing helpers for wei amounts

use anyhow::{Context, Result};
use ethers::types::U256;
use ethers::utils::{format_units, parse_units};

use crate::constants::ETHER_DECIMALS;

/// wei → "0.123456" (소수점 6자리)
pub fn format_eth(wei: U256) -> String {
    format_decimal(wei, ETHER_DECIMALS, 6)
}

/// wei → gwei 문자열
pub fn format_gwei(wei: U256) -> String {
    format_decimal(wei, 9, 2)
}

/// 정수 금액을 `decimals` 기준 소수로 변환하고 `precision` 자리로 자른다
pub fn format_decimal(amount: U256, decimals: u32, precision: usize) -> String {
    let formatted = format_units(amount, decimals).unwrap_or_else(|_| amount.to_string());
    match formatted.split_once('.') {
        Some((whole, _)) if precision == 0 => whole.to_string(),
        Some((whole, fraction)) => {
            let end = fraction.len().min(precision);
            format!("{}.{}", whole, &fraction[..end])
        }
        None => formatted,
    }
}

/// "0.01" 같은 ETH 문자열을 wei로 변환
pub fn parse_eth_amount(eth: &str) -> Result<U256> {
    let parsed = parse_units(eth.trim(), ETHER_DECIMALS)
        .with_context(|| format!("Invalid ETH amount: {}", eth))?;
    Ok(parsed.into())
}
