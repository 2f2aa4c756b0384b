//! 알림 파이프라인.
//!
//! 조회 → 워터마크 비교 → RSI 계산 → 알림 판단 → 차트 렌더링 → 발송을
//! 하나의 `tokio::sync::Mutex` 아래에서 순차 실행합니다. 타이머 틱, 즉시 확인,
//! 설정 변경 명령이 모두 같은 잠금을 잡으므로 워터마크, 차트 파일, 알림 설정은
//! 동시에 변경되지 않습니다.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};
use xtr_analytics::{range_start, rsi_series, RsiChart, RsiParams};
use xtr_core::{
    pipeline_span, should_alert, AlertConfig, AlertLabel, AlertMode, AppConfig, Destination,
    IndicatorSeries, PriceSeries, TimeRange, Watermark, WatermarkUpdate,
};
use xtr_exchange::{FetchError, MarketDataProvider};
use xtr_notification::{format_rsi, AlertMessage, AlertSender, FETCH_FAILURE_NOTICE};

use crate::error::{PipelineError, PipelineResult};
use crate::schedule::{FixedIntervalPolicy, SchedulePolicy};
use crate::stats::PollStats;

/// 파이프라인 실행 설정
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// 거래 심볼
    pub symbol: String,
    /// 봉 간격 (분)
    pub interval_minutes: u64,
    /// 조회당 최대 봉 개수
    pub max_bars: u32,
    /// RSI 파라미터
    pub rsi: RsiParams,
    /// 차트 파일 경로
    pub artifact_path: PathBuf,
    /// 통계 요약을 남기는 틱 간격 (0이면 남기지 않음)
    pub stats_every_ticks: u64,
}

impl PipelineSettings {
    /// 애플리케이션 설정에서 생성
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            symbol: app.market.symbol.clone(),
            interval_minutes: app.market.interval_minutes,
            max_bars: app.market.max_bars,
            rsi: RsiParams {
                period: app.market.rsi_period,
            },
            artifact_path: app.alert.artifact_path.clone(),
            stats_every_ticks: app.poller.stats_every_ticks,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

/// RSI 계산 결과.
#[derive(Debug, Clone)]
pub struct RsiReport {
    /// 가격 시계열과 정렬된 RSI 시계열
    pub series: IndicatorSeries,
    /// 최신 RSI 값
    pub latest: Decimal,
    /// 보낼 알림 (알림 정책이 레이블을 반환한 경우)
    pub message: Option<AlertMessage>,
    /// 렌더링된 차트 경로 (알림이 있는 경우)
    pub artifact: Option<PathBuf>,
}

impl RsiReport {
    /// 알림 레이블
    pub fn label(&self) -> Option<AlertLabel> {
        self.message.as_ref().map(|m| m.label)
    }
}

/// 한 번의 평가 결과.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// 워터마크 관찰 결과 (강제 확인은 워터마크를 바꾸지 않고 미리 본 결과)
    pub update: WatermarkUpdate,
    /// RSI 계산 결과 (새 봉이 없고 강제 확인이 아니면 None)
    pub report: Option<RsiReport>,
}

/// 타이머 틱 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 알림 대상이 없거나 모드가 Off
    Idle,
    /// 스케줄 정책상 조회 시점이 아님
    NotDue,
    /// 조회했지만 새 봉이 없음 (또는 첫 관찰)
    Skipped(WatermarkUpdate),
    /// 새 봉이 있었지만 알림 조건 불충족
    Silent { rsi: Decimal },
    /// 알림 발송
    Dispatched(AlertLabel),
    /// 조회/계산/렌더링/발송 중 실패
    Failed,
}

/// `/summary` 응답용 설정 스냅샷.
#[derive(Debug, Clone)]
pub struct ConfigSummary {
    /// 거래 심볼
    pub symbol: String,
    /// 현재 알림 설정
    pub config: AlertConfig,
    /// 폴링 통계
    pub stats: PollStats,
    /// 마지막으로 본 최신 봉 시간
    pub watermark: Option<DateTime<Utc>>,
}

/// 잠금으로 보호되는 가변 상태.
struct PipelineState {
    config: AlertConfig,
    watermark: Watermark,
    schedule: Box<dyn SchedulePolicy>,
    stats: PollStats,
}

/// RSI 알림 파이프라인.
pub struct AlertPipeline {
    provider: Arc<dyn MarketDataProvider>,
    sender: Arc<dyn AlertSender>,
    settings: PipelineSettings,
    state: Mutex<PipelineState>,
}

impl AlertPipeline {
    /// 새 파이프라인 생성 (스케줄 정책: 매 틱 조회).
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        sender: Arc<dyn AlertSender>,
        settings: PipelineSettings,
        config: AlertConfig,
    ) -> Self {
        Self {
            provider,
            sender,
            settings,
            state: Mutex::new(PipelineState {
                config,
                watermark: Watermark::new(),
                schedule: Box::new(FixedIntervalPolicy),
                stats: PollStats::new(),
            }),
        }
    }

    /// 스케줄 정책 설정.
    pub fn with_schedule(mut self, schedule: Box<dyn SchedulePolicy>) -> Self {
        self.state.get_mut().schedule = schedule;
        self
    }

    /// 실행 설정 반환.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// 현재 알림 설정 스냅샷.
    pub async fn alert_config(&self) -> AlertConfig {
        self.state.lock().await.config.clone()
    }

    /// 현재 폴링 통계 스냅샷.
    pub async fn stats(&self) -> PollStats {
        self.state.lock().await.stats.clone()
    }

    // ========================================================================
    // 타이머 경로
    // ========================================================================

    /// 타이머 틱 한 번을 처리합니다.
    ///
    /// 알림 대상이 있고 모드가 Off가 아닐 때만 조회합니다. 실패는 로그로 남기고
    /// 알림 대상에 안내문을 보낸 뒤 다음 틱으로 넘어갑니다.
    pub async fn tick(&self) -> TickOutcome {
        let mut state = self.state.lock().await;
        state.stats.ticks += 1;

        let every = self.settings.stats_every_ticks;
        if every > 0 && state.stats.ticks % every == 0 {
            state.stats.log_summary("폴링");
        }

        if !state.config.is_active() {
            return TickOutcome::Idle;
        }

        if !state.schedule.is_due(self.provider.as_ref()).await {
            return TickOutcome::NotDue;
        }

        let span = pipeline_span!("tick", self.settings.symbol, "timer");
        self.run_tick(&mut state).instrument(span).await
    }

    async fn run_tick(&self, state: &mut PipelineState) -> TickOutcome {
        let destination = state.config.destination.clone();

        let evaluation = match self.evaluate(state, false).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                error!("RSI 파이프라인 실패: {}", e);
                self.notify_failure(destination.as_ref()).await;
                return TickOutcome::Failed;
            }
        };

        let Some(report) = evaluation.report else {
            return TickOutcome::Skipped(evaluation.update);
        };

        let Some(message) = report.message.as_ref() else {
            debug!(rsi = %format_rsi(report.latest), "알림 조건 불충족");
            return TickOutcome::Silent { rsi: report.latest };
        };

        match self
            .sender
            .send(
                destination.as_ref(),
                &message.to_html(),
                report.artifact.as_deref(),
            )
            .await
        {
            Ok(()) => {
                state.stats.alerts_sent += 1;
                info!(
                    label = %message.label,
                    rsi = %format_rsi(report.latest),
                    sender = self.sender.name(),
                    "RSI 알림 발송"
                );
                TickOutcome::Dispatched(message.label)
            }
            Err(e) => {
                state.stats.dispatch_errors += 1;
                error!(sender = self.sender.name(), "알림 발송 실패: {}", e);
                TickOutcome::Failed
            }
        }
    }

    /// 실패 안내문 발송 (알림 대상이 없으면 로그만).
    async fn notify_failure(&self, destination: Option<&Destination>) {
        let Some(destination) = destination else {
            return;
        };

        if let Err(e) = self
            .sender
            .send(Some(destination), FETCH_FAILURE_NOTICE, None)
            .await
        {
            warn!(destination = %destination, "실패 안내문 발송 실패: {}", e);
        }
    }

    // ========================================================================
    // 평가 (타이머와 즉시 확인 공통)
    // ========================================================================

    /// 조회하고 워터마크를 갱신한 뒤, 새 봉이 있거나 `forced`이면 RSI를 계산합니다.
    ///
    /// 조회에 실패하면 워터마크는 바뀌지 않습니다. `forced`이면 워터마크를 읽기만
    /// 하므로 강제 확인이 타이머의 새 봉 감지를 가로채지 않습니다.
    async fn evaluate(&self, state: &mut PipelineState, forced: bool) -> PipelineResult<Evaluation> {
        let mode = state.config.mode;
        let time_range = state.config.time_range;

        let series = match self.fetch(time_range).await {
            Ok(series) => series,
            Err(e) => {
                state.stats.fetch_errors += 1;
                warn!(
                    provider = self.provider.name(),
                    retryable = e.is_retryable(),
                    "시장 데이터 조회 실패: {}",
                    e
                );
                return Err(e.into());
            }
        };
        state.stats.fetches += 1;

        let newest = series.newest_time().ok_or_else(|| {
            PipelineError::Fetch(FetchError::EmptyResult(self.settings.symbol.clone()))
        })?;

        if forced {
            let update = state.watermark.peek(newest);
            let report = self.build_report(&series, mode, time_range, true).await?;
            return Ok(Evaluation {
                update,
                report: Some(report),
            });
        }

        let update = state.watermark.observe(newest);
        state.schedule.record(update);
        match update {
            WatermarkUpdate::Seeded => info!(watermark = %newest, "워터마크 초기화"),
            WatermarkUpdate::Advanced { previous, current } => {
                state.stats.changes += 1;
                info!(previous = %previous, watermark = %current, "새 봉 감지");
            }
            WatermarkUpdate::Unchanged => debug!(watermark = %newest, "새 봉 없음"),
        }

        if !update.is_changed() {
            return Ok(Evaluation {
                update,
                report: None,
            });
        }

        let report = self.build_report(&series, mode, time_range, false).await?;
        Ok(Evaluation {
            update,
            report: Some(report),
        })
    }

    async fn fetch(&self, time_range: TimeRange) -> Result<PriceSeries, FetchError> {
        let end = Utc::now();
        let start = range_start(end, time_range);

        self.provider
            .fetch_price_series(
                &self.settings.symbol,
                self.settings.interval_minutes,
                start,
                end,
                self.settings.max_bars,
            )
            .await
    }

    /// RSI 계산, 알림 판단, 차트 렌더링.
    async fn build_report(
        &self,
        series: &PriceSeries,
        mode: AlertMode,
        time_range: TimeRange,
        forced: bool,
    ) -> PipelineResult<RsiReport> {
        let indicator = rsi_series(series, self.settings.rsi)?;
        let latest = indicator
            .latest()
            .ok_or(PipelineError::InsufficientData { bars: series.len() })?;

        let label = should_alert(mode, latest, forced);
        debug!(rsi = %format_rsi(latest), mode = %mode, label = ?label, forced, "RSI 계산 완료");

        let Some(label) = label else {
            return Ok(RsiReport {
                series: indicator,
                latest,
                message: None,
                artifact: None,
            });
        };

        let chart = RsiChart::new(&self.settings.symbol, time_range, &indicator)?;
        let artifact = chart.write_artifact(&self.settings.artifact_path).await?;
        let message = AlertMessage::new(label, latest, &self.settings.symbol, time_range);

        Ok(RsiReport {
            series: indicator,
            latest,
            message: Some(message),
            artifact: Some(artifact),
        })
    }

    // ========================================================================
    // 사용자 명령
    // ========================================================================

    /// 알림 대상 선택.
    pub async fn on_user_select_destination(&self, destination: Destination) -> AlertConfig {
        let mut state = self.state.lock().await;
        info!(destination = %destination, "알림 대상 선택");
        state.config.destination = Some(destination);
        state.config.clone()
    }

    /// 알림 대상 해제.
    pub async fn on_user_clear_destination(&self) -> AlertConfig {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.config.destination.take() {
            info!(destination = %previous, "알림 대상 해제");
        }
        state.config.clone()
    }

    /// 알림 모드 설정.
    pub async fn on_user_set_mode(&self, mode: AlertMode) -> AlertConfig {
        let mut state = self.state.lock().await;
        info!(mode = %mode, "알림 모드 변경");
        state.config.mode = mode;
        state.config.clone()
    }

    /// 조회 기간 설정.
    pub async fn on_user_set_time_range(&self, time_range: TimeRange) -> AlertConfig {
        let mut state = self.state.lock().await;
        info!(time_range = %time_range, "조회 기간 변경");
        state.config.time_range = time_range;
        state.config.clone()
    }

    /// 사용자 요청 즉시 확인.
    ///
    /// 워터마크와 무관하게 RSI를 계산하고 차트를 렌더링한 뒤, 잠금을 쥔 채로
    /// 요청한 채팅에 결과를 보냅니다. 차트 파일은 발송이 끝날 때까지 다른 틱이
    /// 덮어쓰지 못합니다. 실패하면 요청한 채팅에 안내문을 보내고 에러를 반환합니다.
    pub async fn on_user_request_check(&self, requester: &Destination) -> PipelineResult<Evaluation> {
        let span = pipeline_span!("check", self.settings.symbol, requester);
        self.run_check(requester).instrument(span).await
    }

    async fn run_check(&self, requester: &Destination) -> PipelineResult<Evaluation> {
        let mut state = self.state.lock().await;

        let evaluation = match self.evaluate(&mut state, true).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(requester = %requester, "즉시 확인 실패: {}", e);
                self.notify_failure(Some(requester)).await;
                return Err(e);
            }
        };

        let Some(message) = evaluation.report.as_ref().and_then(|r| r.message.as_ref()) else {
            self.notify_failure(Some(requester)).await;
            return Ok(evaluation);
        };
        let artifact = evaluation.report.as_ref().and_then(|r| r.artifact.as_deref());

        if let Err(e) = self
            .sender
            .send(Some(requester), &message.to_html(), artifact)
            .await
        {
            state.stats.dispatch_errors += 1;
            error!(sender = self.sender.name(), requester = %requester, "즉시 확인 발송 실패: {}", e);
            return Err(e.into());
        }

        debug!(requester = %requester, label = %message.label, "즉시 확인 발송");
        Ok(evaluation)
    }

    /// 현재 설정 요약.
    pub async fn summary(&self) -> ConfigSummary {
        let state = self.state.lock().await;
        ConfigSummary {
            symbol: self.settings.symbol.clone(),
            config: state.config.clone(),
            stats: state.stats.clone(),
            watermark: state.watermark.get(),
        }
    }
}
