pub mod searcher_core;

pub use searcher_core::{
    drive_block_feed, feed_blocks, spawn_block_feed, FeedError, HealthCheck, SearcherCore, SearcherStats,
};
