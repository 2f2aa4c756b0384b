//! 알림 파이프라인 통합 테스트 (메모리 내 가짜 제공자/전송기 사용).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use xtr_bot::{AlertPipeline, PipelineCommands, PipelineSettings, TickOutcome, TopOfHourPolicy};
use xtr_core::{
    AlertConfig, AlertLabel, AlertMode, Destination, PriceBar, PriceSeries, TimeRange, Timeframe,
    WatermarkUpdate,
};
use xtr_exchange::{FetchError, FetchResult, MarketDataProvider};
use xtr_notification::{
    AlertSender, BotCommandHandler, DispatchError, NotificationResult, FETCH_FAILURE_NOTICE,
};

// ============================================================================
// 가짜 구현
// ============================================================================

/// 설정된 시계열을 돌려주는 제공자.
#[derive(Default)]
struct FakeProvider {
    series: Mutex<Option<PriceSeries>>,
    fail: AtomicBool,
    calls: AtomicUsize,
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl FakeProvider {
    async fn set_series(&self, series: PriceSeries) {
        *self.series.lock().await = Some(series);
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn set_clock(&self, now: DateTime<Utc>) {
        *self.clock.lock().await = Some(now);
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_price_series(
        &self,
        symbol: &str,
        _interval_minutes: u64,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        _max_bars: u32,
    ) -> FetchResult<PriceSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(range_start < range_end);

        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Transport("connection refused".to_string()));
        }

        self.series
            .lock()
            .await
            .clone()
            .ok_or_else(|| FetchError::EmptyResult(symbol.to_string()))
    }

    async fn server_time(&self) -> FetchResult<DateTime<Utc>> {
        Ok(self.clock.lock().await.unwrap_or_else(Utc::now))
    }
}

/// 보낸 메시지를 기록하는 전송기.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<Sent>>,
}

#[derive(Debug, Clone)]
struct Sent {
    chat_id: i64,
    text: String,
    artifact: Option<PathBuf>,
    /// 발송 시점의 첨부 파일 내용
    svg: Option<String>,
}

impl RecordingSender {
    async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl AlertSender for RecordingSender {
    async fn send(
        &self,
        destination: Option<&Destination>,
        text: &str,
        artifact: Option<&Path>,
    ) -> NotificationResult<()> {
        let destination = destination.ok_or(DispatchError::DestinationUnset)?;
        self.sent.lock().await.push(Sent {
            chat_id: destination.chat_id,
            text: text.to_string(),
            artifact: artifact.map(Path::to_path_buf),
            svg: artifact.and_then(|path| std::fs::read_to_string(path).ok()),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ============================================================================
// 헬퍼
// ============================================================================

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

/// 종가 목록으로 1시간 봉 시계열 생성 (시작 시각을 `offset_hours`만큼 이동).
fn hourly_series(closes: &[Decimal], offset_hours: i64) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            PriceBar::from_close(base_time() + Duration::hours(offset_hours + i as i64), *close)
        })
        .collect();
    PriceSeries::new("SOLUSDT", Timeframe::H1, bars).unwrap()
}

/// 1씩 오르는 20개 종가.
fn ramp() -> Vec<Decimal> {
    (1..=20).map(Decimal::from).collect()
}

/// 오르내림이 섞인 종가 (RSI가 30~70 사이).
fn choppy() -> Vec<Decimal> {
    [
        100, 101, 100, 102, 101, 100, 101, 102, 101, 100, 101, 100, 102, 101, 100, 101, 102, 101,
        100, 101,
    ]
    .iter()
    .map(|v| Decimal::from(*v))
    .collect()
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        artifact_path: std::env::temp_dir()
            .join(format!("xtr-pipeline-{}", uuid::Uuid::new_v4()))
            .join("rsi_plot.svg"),
        ..PipelineSettings::default()
    }
}

struct Harness {
    provider: Arc<FakeProvider>,
    sender: Arc<RecordingSender>,
    pipeline: Arc<AlertPipeline>,
}

fn harness(mode: AlertMode, destination: Option<Destination>) -> Harness {
    let provider = Arc::new(FakeProvider::default());
    let sender = Arc::new(RecordingSender::default());
    let mut config = AlertConfig::new(mode, TimeRange::Month);
    config.destination = destination;

    let pipeline = Arc::new(AlertPipeline::new(
        provider.clone(),
        sender.clone(),
        settings(),
        config,
    ));

    Harness {
        provider,
        sender,
        pipeline,
    }
}

fn chat() -> Destination {
    Destination::new(42).with_name("Traders")
}

// ============================================================================
// 타이머 경로
// ============================================================================

#[tokio::test]
async fn tick_is_idle_without_destination() {
    let h = harness(AlertMode::AlwaysOn, None);
    h.provider.set_series(hourly_series(&ramp(), 0)).await;

    assert_eq!(h.pipeline.tick().await, TickOutcome::Idle);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn tick_is_idle_when_mode_off() {
    let h = harness(AlertMode::Off, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;

    assert_eq!(h.pipeline.tick().await, TickOutcome::Idle);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn first_tick_seeds_without_dispatch() {
    let h = harness(AlertMode::AlwaysOn, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;

    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Skipped(WatermarkUpdate::Seeded)
    );
    assert!(h.sender.sent().await.is_empty());
}

#[tokio::test]
async fn unchanged_data_does_not_dispatch() {
    let h = harness(AlertMode::AlwaysOn, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;

    h.pipeline.tick().await;
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Skipped(WatermarkUpdate::Unchanged)
    );
    assert!(h.sender.sent().await.is_empty());
}

#[tokio::test]
async fn new_bar_dispatches_alert_with_chart() {
    let h = harness(AlertMode::AlwaysOn, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    h.pipeline.tick().await;

    h.provider.set_series(hourly_series(&ramp(), 1)).await;
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Dispatched(AlertLabel::Neutral)
    );

    let sent = h.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, 42);
    assert!(sent[0].text.contains("Current RSI: <b>100.00</b>"));

    let artifact = sent[0].artifact.clone().unwrap();
    let svg = std::fs::read_to_string(&artifact).unwrap();
    assert!(svg.starts_with("<svg"));

    // 같은 봉으로 다시 틱 → 중복 발송 없음
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Skipped(WatermarkUpdate::Unchanged)
    );
    assert_eq!(h.sender.sent().await.len(), 1);

    let stats = h.pipeline.stats().await;
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.changes, 1);
    assert_eq!(stats.alerts_sent, 1);
}

#[tokio::test]
async fn threshold_mode_labels_ramp_overbought() {
    let h = harness(AlertMode::ThresholdOnly, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    h.pipeline.tick().await;

    h.provider.set_series(hourly_series(&ramp(), 1)).await;
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Dispatched(AlertLabel::Overbought)
    );

    let sent = h.sender.sent().await;
    assert!(sent[0].text.contains("RSI Alert - SELL NOW"));
    assert!(sent[0].text.contains("Sell/Overbought"));
}

#[tokio::test]
async fn threshold_mode_is_silent_in_neutral_zone() {
    let h = harness(AlertMode::ThresholdOnly, Some(chat()));
    h.provider.set_series(hourly_series(&choppy(), 0)).await;
    h.pipeline.tick().await;

    h.provider.set_series(hourly_series(&choppy(), 1)).await;
    let outcome = h.pipeline.tick().await;

    match outcome {
        TickOutcome::Silent { rsi } => {
            assert!(rsi >= dec!(30) && rsi <= dec!(70), "rsi = {}", rsi);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(h.sender.sent().await.is_empty());
}

#[tokio::test]
async fn fetch_failure_keeps_watermark_and_sends_notice() {
    let h = harness(AlertMode::AlwaysOn, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    h.pipeline.tick().await;
    let seeded = h.pipeline.summary().await.watermark;

    h.provider.set_failing(true);
    assert_eq!(h.pipeline.tick().await, TickOutcome::Failed);

    let sent = h.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, FETCH_FAILURE_NOTICE);
    assert!(sent[0].artifact.is_none());

    let summary = h.pipeline.summary().await;
    assert_eq!(summary.watermark, seeded);
    assert_eq!(summary.stats.fetch_errors, 1);

    // 복구 후 같은 데이터는 여전히 변경 없음
    h.provider.set_failing(false);
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Skipped(WatermarkUpdate::Unchanged)
    );
}

#[tokio::test]
async fn insufficient_bars_fail_the_tick() {
    let h = harness(AlertMode::AlwaysOn, Some(chat()));
    let short: Vec<Decimal> = (1..=10).map(Decimal::from).collect();
    h.provider.set_series(hourly_series(&short, 0)).await;
    h.pipeline.tick().await;

    h.provider.set_series(hourly_series(&short, 1)).await;
    assert_eq!(h.pipeline.tick().await, TickOutcome::Failed);
    assert_eq!(h.sender.sent().await[0].text, FETCH_FAILURE_NOTICE);
}

// ============================================================================
// 즉시 확인
// ============================================================================

#[tokio::test]
async fn forced_check_on_first_fetch_returns_series() {
    let h = harness(AlertMode::Off, None);
    h.provider.set_series(hourly_series(&ramp(), 0)).await;

    let evaluation = h.pipeline.on_user_request_check(&chat()).await.unwrap();

    assert_eq!(evaluation.update, WatermarkUpdate::Seeded);
    let report = evaluation.report.unwrap();
    assert_eq!(report.series.len(), 20);
    assert_eq!(report.latest, dec!(100));
    // Off 모드라도 강제 확인은 레이블을 만듦
    assert_eq!(report.label(), Some(AlertLabel::Neutral));
    assert!(report.artifact.is_some());

    // 결과는 요청한 채팅으로만 전송
    let sent = h.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, 42);
    assert!(sent[0].svg.as_deref().unwrap().starts_with("<svg"));

    // 강제 확인은 워터마크를 설정하지 않음
    assert_eq!(h.pipeline.summary().await.watermark, None);
}

#[tokio::test]
async fn forced_check_bypasses_unchanged_watermark() {
    let h = harness(AlertMode::ThresholdOnly, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    h.pipeline.tick().await;

    let evaluation = h.pipeline.on_user_request_check(&chat()).await.unwrap();
    assert_eq!(evaluation.update, WatermarkUpdate::Unchanged);
    assert_eq!(
        evaluation.report.unwrap().label(),
        Some(AlertLabel::Overbought)
    );
}

#[tokio::test]
async fn forced_check_leaves_new_bar_for_timer() {
    let h = harness(AlertMode::AlwaysOn, Some(chat()));
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    h.pipeline.tick().await;

    // 새 봉이 나온 뒤 타이머보다 먼저 즉시 확인
    h.provider.set_series(hourly_series(&ramp(), 1)).await;
    let requester = Destination::new(7);
    let evaluation = h.pipeline.on_user_request_check(&requester).await.unwrap();
    assert!(evaluation.update.is_changed());

    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Dispatched(AlertLabel::Neutral)
    );

    let sent = h.sender.sent().await;
    let chats: Vec<i64> = sent.iter().map(|s| s.chat_id).collect();
    assert_eq!(chats, vec![7, 42]);
}

#[tokio::test]
async fn check_chart_is_sent_before_next_render() {
    let mut config = AlertConfig::new(AlertMode::AlwaysOn, TimeRange::Day);
    config.destination = Some(chat());
    let provider = Arc::new(FakeProvider::default());
    let sender = Arc::new(RecordingSender::default());
    let pipeline = Arc::new(AlertPipeline::new(
        provider.clone(),
        sender.clone(),
        settings(),
        config,
    ));
    provider.set_series(hourly_series(&ramp(), 0)).await;
    pipeline.tick().await;

    let requester = Destination::new(7);
    pipeline.on_user_request_check(&requester).await.unwrap();

    // 같은 차트 파일을 다른 기간으로 다시 렌더링
    pipeline.on_user_set_time_range(TimeRange::Month).await;
    provider.set_series(hourly_series(&ramp(), 1)).await;
    assert_eq!(
        pipeline.tick().await,
        TickOutcome::Dispatched(AlertLabel::Neutral)
    );

    let sent = sender.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].chat_id, 7);
    assert!(sent[0].svg.as_deref().unwrap().contains("period of 1d"));
    assert!(sent[1].svg.as_deref().unwrap().contains("period of 1M"));
}

#[tokio::test]
async fn forced_check_failure_is_an_error() {
    let h = harness(AlertMode::AlwaysOn, None);
    h.provider.set_failing(true);

    assert!(h.pipeline.on_user_request_check(&chat()).await.is_err());
    assert_eq!(h.pipeline.stats().await.fetch_errors, 1);

    // 요청한 채팅에 안내문
    let sent = h.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, 42);
    assert_eq!(sent[0].text, FETCH_FAILURE_NOTICE);
}

// ============================================================================
// 스케줄 정책
// ============================================================================

fn top_of_hour_harness() -> Harness {
    let provider = Arc::new(FakeProvider::default());
    let sender = Arc::new(RecordingSender::default());
    let mut config = AlertConfig::new(AlertMode::AlwaysOn, TimeRange::Month);
    config.destination = Some(chat());

    let pipeline = Arc::new(
        AlertPipeline::new(provider.clone(), sender.clone(), settings(), config)
            .with_schedule(Box::new(TopOfHourPolicy::new())),
    );

    Harness {
        provider,
        sender,
        pipeline,
    }
}

#[tokio::test]
async fn top_of_hour_skips_ticks_within_the_hour() {
    let h = top_of_hour_harness();
    h.provider.set_clock(base_time() + Duration::hours(20)).await;
    h.provider.set_series(hourly_series(&ramp(), 0)).await;

    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Skipped(WatermarkUpdate::Seeded)
    );

    h.provider
        .set_clock(base_time() + Duration::hours(20) + Duration::minutes(30))
        .await;
    assert_eq!(h.pipeline.tick().await, TickOutcome::NotDue);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn top_of_hour_retries_until_bar_is_published() {
    let h = top_of_hour_harness();
    h.provider.set_clock(base_time() + Duration::hours(20)).await;
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    h.pipeline.tick().await;

    // 다음 정시지만 거래소에 아직 새 봉이 없음
    h.provider.set_clock(base_time() + Duration::hours(21)).await;
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Skipped(WatermarkUpdate::Unchanged)
    );

    // 같은 시간대의 다음 틱에서 새 봉 확인
    h.provider.set_series(hourly_series(&ramp(), 1)).await;
    assert_eq!(
        h.pipeline.tick().await,
        TickOutcome::Dispatched(AlertLabel::Neutral)
    );
    assert_eq!(h.pipeline.tick().await, TickOutcome::NotDue);
    assert_eq!(h.sender.sent().await.len(), 1);
}

// ============================================================================
// 명령어
// ============================================================================

#[tokio::test]
async fn commands_mutate_configuration() {
    let h = harness(AlertMode::ThresholdOnly, None);
    let commands = PipelineCommands::new(h.pipeline.clone());

    let response = commands.handle_start(chat()).await.unwrap();
    assert!(response.text.contains("Traders"));
    assert_eq!(h.pipeline.alert_config().await.destination, Some(chat()));

    let response = commands.handle_mode(AlertMode::AlwaysOn).await.unwrap();
    assert!(response.text.contains("Alert mode set to: <b>on</b>"));

    let response = commands.handle_time_range(TimeRange::Week).await.unwrap();
    assert!(response.text.contains("You chose: <b>1w</b>"));

    let config = h.pipeline.alert_config().await;
    assert_eq!(config.mode, AlertMode::AlwaysOn);
    assert_eq!(config.time_range, TimeRange::Week);

    let summary = commands.handle_summary().await.unwrap();
    assert!(summary.text.contains("<u>On</u> - hourly reports will be sent."));
    assert!(summary.text.contains("Last week."));
    assert!(summary.text.contains("Traders"));

    commands.handle_stop(&chat()).await.unwrap();
    assert_eq!(h.pipeline.alert_config().await.destination, None);
}

#[tokio::test]
async fn check_command_sends_chart_to_requester() {
    let h = harness(AlertMode::ThresholdOnly, None);
    h.provider.set_series(hourly_series(&ramp(), 0)).await;
    let commands = PipelineCommands::new(h.pipeline.clone());

    let response = commands.handle_check(&chat()).await.unwrap();
    assert!(response.delivered);

    let sent = h.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, 42);
    assert!(sent[0].text.contains("RSI Alert - SELL NOW"));
    assert!(sent[0].artifact.is_some());
}

#[tokio::test]
async fn check_command_reports_failure_notice() {
    let h = harness(AlertMode::ThresholdOnly, None);
    h.provider.set_failing(true);
    let commands = PipelineCommands::new(h.pipeline.clone());

    let response = commands.handle_check(&chat()).await.unwrap();
    assert!(response.delivered);

    let sent = h.sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, FETCH_FAILURE_NOTICE);
    assert!(sent[0].artifact.is_none());
}
