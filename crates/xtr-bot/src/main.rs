//! RSI 알림 봇 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use xtr_bot::{policy_for, AlertPipeline, BotConfig, PipelineCommands};
use xtr_core::{init_logging, AlertConfig, AlertMode, Destination, LogConfig, TimeRange};
use xtr_exchange::{BybitClient, MarketDataProvider};
use xtr_notification::{format_rsi, LogSender, TelegramBotHandler, TelegramSender};

#[derive(Parser)]
#[command(name = "xtr-bot")]
#[command(about = "RSI alert bot for Bybit spot pairs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// 로그 레벨 (설정 파일 값보다 우선)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 타이머와 텔레그램 명령어 봇 실행 (Ctrl-C로 종료)
    Run,

    /// 강제 평가 한 번 실행 후 결과를 로그로 출력
    Check {
        /// 조회 기간 (1d, 1w, 1M)
        #[arg(long)]
        range: Option<TimeRange>,

        /// 알림 모드 (off, on, alert)
        #[arg(long)]
        mode: Option<AlertMode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 설정 로드
    let mut config = BotConfig::load(&cli.config)?;

    // 로깅 초기화
    let mut log_config = LogConfig::from_settings(&config.app.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!(
        symbol = %config.app.market.symbol,
        interval_minutes = config.app.market.interval_minutes,
        "XTR RSI Alert Bot 시작"
    );

    let provider: Arc<dyn MarketDataProvider> =
        Arc::new(BybitClient::new(config.take_bybit_config())?);

    match cli.command {
        Commands::Run => run(config, provider).await?,
        Commands::Check { range, mode } => check(config, provider, range, mode).await?,
    }

    tracing::info!("XTR RSI Alert Bot 종료");
    Ok(())
}

/// 데몬 모드: 타이머 틱과 명령어 폴링.
async fn run(mut config: BotConfig, provider: Arc<dyn MarketDataProvider>) -> anyhow::Result<()> {
    let telegram = config
        .telegram
        .take()
        .context("TELEGRAM_BOT_TOKEN 환경변수가 설정되지 않았습니다")?;

    let alert_config = AlertConfig::new(config.app.alert.mode, config.app.alert.time_range);
    let sender = Arc::new(TelegramSender::new(telegram.clone()));
    let pipeline = Arc::new(
        AlertPipeline::new(provider, sender, config.pipeline_settings(), alert_config)
            .with_schedule(policy_for(config.app.poller.schedule)),
    );

    let bot = TelegramBotHandler::new(telegram, Arc::new(PipelineCommands::new(pipeline.clone())))
        .with_allowed_chat_ids(config.app.telegram.allowed_chat_ids.clone());
    let bot_task = tokio::spawn(async move { bot.start_polling().await });

    tracing::info!(
        "=== 폴링 시작 (주기: {}초, 스케줄: {:?}) ===",
        config.app.poller.interval_secs,
        config.app.poller.schedule
    );

    let mut interval = tokio::time::interval(config.app.poller.interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("종료 신호 수신, 봇 종료 중...");
                break;
            }
            _ = interval.tick() => {
                let outcome = pipeline.tick().await;
                tracing::trace!(?outcome, "틱 완료");
            }
        }
    }

    bot_task.abort();
    pipeline.stats().await.log_summary("종료");

    Ok(())
}

/// 강제 평가 한 번.
async fn check(
    config: BotConfig,
    provider: Arc<dyn MarketDataProvider>,
    range: Option<TimeRange>,
    mode: Option<AlertMode>,
) -> anyhow::Result<()> {
    let alert_config = AlertConfig::new(
        mode.unwrap_or(config.app.alert.mode),
        range.unwrap_or(config.app.alert.time_range),
    );
    let pipeline = AlertPipeline::new(
        provider,
        Arc::new(LogSender),
        config.pipeline_settings(),
        alert_config.clone(),
    );

    // 로그 전송기가 받는 가상의 요청자
    let requester = Destination::new(0).with_name("cli");
    let evaluation = pipeline
        .on_user_request_check(&requester)
        .await
        .context("RSI 확인 실패")?;
    let report = evaluation.report.context("RSI 결과가 없습니다")?;

    tracing::info!(
        symbol = %pipeline.settings().symbol,
        mode = %alert_config.mode,
        time_range = %alert_config.time_range,
        rsi = %format_rsi(report.latest),
        label = ?report.label(),
        artifact = ?report.artifact,
        "RSI 확인 결과"
    );

    Ok(())
}
