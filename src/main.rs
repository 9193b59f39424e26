use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crossed_arb_searcher::arbitrage::{BundleSubmitter, CrossedMarketDetector};
use crossed_arb_searcher::blockchain::rpc::{connect_http, connect_ws};
use crossed_arb_searcher::blockchain::{BundleExecutorContract, EthersChainClient};
use crossed_arb_searcher::core::{spawn_block_feed, HealthCheck, SearcherCore};
use crossed_arb_searcher::flashbots::client::FlashbotsClient;
use crossed_arb_searcher::markets::{group_markets_by_token, UniswapV2ReserveSync};
use crossed_arb_searcher::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("crossed-arb-searcher")
        .version(env!("CARGO_PKG_VERSION"))
        .about("🦀 교차 마켓 차익거래 서쳐 (Flashbots 번들)")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로")
                .default_value("config/default.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("simulation")
                .long("simulation")
                .help("시뮬레이션 모드 (실제 번들을 제출하지 않음)")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // .env 는 있으면 읽는다
    dotenvy::dotenv().ok();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config/default.toml");
    let mut config = Config::load(config_path).await?;

    // 로깅 초기화 (RUST_LOG > --log-level > 설정 파일)
    let log_filter = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.monitoring.log_level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();
    info!("📋 설정 파일 로드: {}", config_path);

    config.apply_env_overrides()?;
    if matches.get_flag("simulation") {
        warn!("🧪 시뮬레이션 모드 활성화 - 실제 번들을 제출하지 않습니다");
        config.flashbots.simulation_mode = true;
    }

    if let Err(e) = config.validate() {
        error!("❌ 설정 검증 실패: {}", e);
        std::process::exit(1);
    }
    info!("✅ 설정 로드 완료");

    let searcher_wallet = config.searcher_wallet()?;
    let (relay_signer, generated) = config.relay_signer()?;
    if generated {
        warn!("⚠️ FLASHBOTS_RELAY_SIGNING_KEY 미설정 - 임의 평판 키를 사용합니다");
    }

    let http_provider = connect_http(&config.network.rpc_url)?;
    let ws_provider = connect_ws(&config.network.ws_url).await?;

    // 마켓 구성
    let pairs = config.build_markets();
    let markets_by_token = group_markets_by_token(&pairs, config.arbitrage.base_token);
    info!("🏪 마켓 {}개 로드, 차익 후보 토큰 {}개", pairs.len(), markets_by_token.len());
    let reserve_sync = Arc::new(UniswapV2ReserveSync::new(Arc::clone(&http_provider), pairs));

    let detector = CrossedMarketDetector::new(config.detector_config()?, config.volume_search());

    let relay = FlashbotsClient::new(
        &config.flashbots.relay_url,
        relay_signer,
        config.network.chain_id,
        Duration::from_secs(config.flashbots.timeout_secs),
    )
    .context("Flashbots 클라이언트 초기화 실패")?
    .with_simulation_mode(config.flashbots.simulation_mode);

    let executor = BundleExecutorContract::new(config.bundle_executor_address()?)?;
    info!("📜 번들 실행 컨트랙트: {:?}", executor.address());

    let submitter = BundleSubmitter::new(
        Arc::new(EthersChainClient::new(Arc::clone(&http_provider))),
        Arc::new(relay),
        executor,
        searcher_wallet,
        config.submitter_config(),
    );

    let healthcheck = match config.monitoring.healthcheck_url.as_deref() {
        Some(url) => Some(HealthCheck::new(url).context("헬스체크 클라이언트 초기화 실패")?),
        None => None,
    };

    let core = SearcherCore::new(
        markets_by_token,
        reserve_sync,
        detector,
        submitter,
        config.executor.miner_reward_percentage,
    )
    .with_healthcheck(healthcheck);

    let (blocks, feed_handle) = spawn_block_feed(Arc::clone(&ws_provider));

    let feed_stopped = tokio::select! {
        _ = core.run(blocks) => true,
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => warn!("🛑 종료 신호 수신됨, 종료 중..."),
                Err(e) => error!("❌ 신호 처리 오류: {}", e),
            }
            false
        }
    };

    if feed_stopped {
        // 피드가 먼저 끝났으면 그 사유로 종료한다
        feed_handle
            .await
            .context("블록 피드 태스크 실패")?
            .context("블록 피드가 끊어졌습니다")?;
    } else {
        feed_handle.abort();
    }

    info!("👋 서쳐 종료");
    Ok(())
}

fn print_banner() {
    info!("🦀 ==========================================");
    info!("🦀  Crossed-Market Arbitrage Searcher v{}", env!("CARGO_PKG_VERSION"));
    info!("🦀 ==========================================");
}
