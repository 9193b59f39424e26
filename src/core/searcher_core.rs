use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ethers::providers::{Middleware, Provider, Ws};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::arbitrage::{print_crossed_market, BundleSubmitter, CrossedMarketDetector, SubmissionReceipt, SubmitError};
use crate::markets::{MarketsByToken, ReserveSync};

/// 헬스체크 핑 (성공적인 제출 후)
#[derive(Debug, Clone)]
pub struct HealthCheck {
    http_client: reqwest::Client,
    url: String,
}

impl HealthCheck {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { http_client, url: url.to_string() })
    }

    /// 실패는 로그만 남긴다
    pub async fn ping(&self) {
        match self.http_client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => debug!("💓 헬스체크 전송"),
            Ok(response) => warn!("⚠️ 헬스체크 응답 상태: {}", response.status()),
            Err(e) => warn!("⚠️ 헬스체크 실패: {}", e),
        }
    }
}

/// 누적 통계
#[derive(Debug, Default)]
pub struct SearcherStats {
    pub blocks_processed: AtomicU64,
    pub opportunities_found: AtomicU64,
    pub bundles_submitted: AtomicU64,
    pub cycles_exhausted: AtomicU64,
}

/// 블록마다 한 사이클: 리저브 갱신 → 탐지 → 제출
pub struct SearcherCore {
    markets_by_token: MarketsByToken,
    reserve_sync: Arc<dyn ReserveSync>,
    detector: CrossedMarketDetector,
    submitter: BundleSubmitter,
    miner_reward_percentage: u8,
    healthcheck: Option<HealthCheck>,
    stats: SearcherStats,
}

impl SearcherCore {
    pub fn new(
        markets_by_token: MarketsByToken,
        reserve_sync: Arc<dyn ReserveSync>,
        detector: CrossedMarketDetector,
        submitter: BundleSubmitter,
        miner_reward_percentage: u8,
    ) -> Self {
        let market_count: usize = markets_by_token.values().map(Vec::len).sum();
        info!(
            "🔧 SearcherCore 초기화: 토큰 {}개, 마켓 {}개, 사이징 전략 {}",
            markets_by_token.len(),
            market_count,
            detector.search().name()
        );
        Self {
            markets_by_token,
            reserve_sync,
            detector,
            submitter,
            miner_reward_percentage,
            healthcheck: None,
            stats: SearcherStats::default(),
        }
    }

    pub fn with_healthcheck(mut self, healthcheck: Option<HealthCheck>) -> Self {
        self.healthcheck = healthcheck;
        self
    }

    pub fn stats(&self) -> &SearcherStats {
        &self.stats
    }

    /// 블록 하나 처리. 기회가 없으면 Ok(None)
    pub async fn process_block(&self, block_number: u64) -> Result<Option<SubmissionReceipt>, SubmitError> {
        let started = Instant::now();
        self.stats.blocks_processed.fetch_add(1, Ordering::Relaxed);

        let refreshed = self.reserve_sync.sync_reserves().await;
        debug!("📦 블록 {}: 리저브 {}개 갱신", block_number, refreshed);

        let opportunities = self.detector.evaluate_markets(&self.markets_by_token);
        if opportunities.is_empty() {
            info!("No crossed markets (블록 {})", block_number);
            return Ok(None);
        }

        self.stats
            .opportunities_found
            .fetch_add(opportunities.len() as u64, Ordering::Relaxed);
        for opportunity in &opportunities {
            print_crossed_market(opportunity);
        }

        let result = self
            .submitter
            .take_crossed_markets(&opportunities, block_number, self.miner_reward_percentage)
            .await;

        match &result {
            Ok(_) => {
                self.stats.bundles_submitted.fetch_add(1, Ordering::Relaxed);
                if let Some(healthcheck) = &self.healthcheck {
                    healthcheck.ping().await;
                }
            }
            Err(SubmitError::NoArbitrageSubmitted { .. }) => {
                self.stats.cycles_exhausted.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
        debug!("⏱️ 블록 {} 사이클 {:?}", block_number, started.elapsed());

        result.map(Some)
    }

    /// 단일 슬롯 블록 알림을 소비한다. 처리 중 도착한 블록은 최신 것만 남는다.
    pub async fn run(&self, mut blocks: watch::Receiver<Option<u64>>) {
        info!("🚀 SearcherCore 시작");
        while blocks.changed().await.is_ok() {
            let latest = *blocks.borrow_and_update();
            let Some(block_number) = latest else { continue };

            match self.process_block(block_number).await {
                Ok(Some(receipt)) => info!(
                    "✅ 블록 {} 제출: 수익 {} wei, 보상 {} wei",
                    block_number, receipt.profit, receipt.miner_reward
                ),
                Ok(None) => {}
                Err(e) => warn!("⚠️ 블록 {} 사이클 실패: {}", block_number, e),
            }
        }
        info!(
            "🛑 블록 피드 종료 (처리 블록 {}, 제출 {})",
            self.stats.blocks_processed.load(Ordering::Relaxed),
            self.stats.bundles_submitted.load(Ordering::Relaxed)
        );
    }
}

/// 블록 피드 종료 사유
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Block subscription failed: {0}")]
    Subscribe(String),

    #[error("Block subscription stream ended")]
    StreamEnded,
}

/// 블록 번호 스트림을 단일 슬롯으로 흘려보낸다 (최신 블록 우선)
pub async fn feed_blocks<S>(mut stream: S, slot: &watch::Sender<Option<u64>>)
where
    S: Stream<Item = u64> + Unpin,
{
    while let Some(block_number) = stream.next().await {
        if slot.is_closed() {
            return;
        }
        slot.send_replace(Some(block_number));
    }
}

/// 구독 결과를 받아 피드를 돌린다. 수신 측이 모두 닫혀야만 Ok
pub async fn drive_block_feed<S, E>(subscription: Result<S, E>, slot: watch::Sender<Option<u64>>) -> Result<(), FeedError>
where
    S: Stream<Item = u64> + Unpin,
    E: fmt::Display,
{
    let stream = match subscription {
        Ok(stream) => stream,
        Err(e) => {
            error!("❌ 블록 구독 실패: {}", e);
            return Err(FeedError::Subscribe(e.to_string()));
        }
    };
    info!("📡 새 블록 구독 시작");
    feed_blocks(stream, &slot).await;

    if slot.is_closed() {
        return Ok(());
    }
    warn!("⚠️ 블록 구독 스트림 종료");
    Err(FeedError::StreamEnded)
}

/// WebSocket 블록 구독 태스크
pub fn spawn_block_feed(
    provider: Arc<Provider<Ws>>,
) -> (watch::Receiver<Option<u64>>, JoinHandle<Result<(), FeedError>>) {
    let (slot, receiver) = watch::channel(None);
    let handle = tokio::spawn(async move {
        let subscription = provider.subscribe_blocks().await.map(|stream| {
            Box::pin(stream.filter_map(|block| async move { block.number.map(|n| n.as_u64()) }))
        });
        drive_block_feed(subscription, slot).await
    });
    (receiver, handle)
}
