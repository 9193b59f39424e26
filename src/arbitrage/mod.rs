//! 교차 마켓 차익거래: 탐지, 사이징, 번들 제출

pub mod detector;
pub mod sizing;
pub mod submitter;

pub use detector::{print_crossed_market, CrossedMarketDetector, DetectorConfig, PricedMarket};
pub use sizing::{ArbRoute, LadderBisectSearch, SizedTrade, TernarySearch, VolumeSearch};
pub use submitter::{AttemptState, BundleSubmitter, SkipReason, SubmissionReceipt, SubmitError, SubmitterConfig};
