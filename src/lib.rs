// Crossed-market arbitrage searcher library

pub mod arbitrage;
pub mod blockchain;
pub mod config;
pub mod constants;
pub mod core;
pub mod flashbots;
pub mod markets;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod mocks;

// Re-exports for convenience
pub use config::Config;
pub use core::SearcherCore;
pub use types::CrossedMarketOpportunity;
