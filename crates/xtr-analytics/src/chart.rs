//! RSI 차트 렌더링.
//!
//! RSI 시계열을 SVG 선 차트로 그립니다. 70/30 기준선, 조회 기간에 맞춘 x축
//! 눈금, 마지막 값 주석을 포함합니다. 결과는 하나의 공유 파일 경로에
//! 덮어써지므로 호출자가 렌더링과 발송을 직렬화해야 합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use xtr_core::{
    DecimalExt, IndicatorSeries, TimeRange, OVERBOUGHT_THRESHOLD, OVERSOLD_THRESHOLD,
};

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 120.0;

/// x축 눈금 상한 (기간이 잘못 지정돼도 SVG가 비대해지지 않도록).
const MAX_TICKS: usize = 64;

/// 주 단위 눈금 기준 시점: 1970-01-05 00:00 UTC (월요일).
const WEEK_ANCHOR_SECS: i64 = 4 * 24 * 60 * 60;

/// 렌더링 오류.
#[derive(Debug, Error)]
pub enum RenderError {
    /// 차트 파일 쓰기 실패
    #[error("차트 파일 쓰기 실패 ({path}): {source}")]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 그릴 값이 없음
    #[error("차트에 그릴 RSI 값이 없습니다")]
    EmptySeries,
}

/// 차트 데이터 포인트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPoint {
    /// X축 값 (타임스탬프, 밀리초)
    pub x: i64,

    /// Y축 값
    pub y: Decimal,
}

impl ChartPoint {
    /// 새로운 차트 포인트를 생성합니다.
    pub fn new(timestamp: DateTime<Utc>, value: Decimal) -> Self {
        Self {
            x: timestamp.timestamp_millis(),
            y: value,
        }
    }
}

/// RSI 선 차트.
#[derive(Debug, Clone)]
pub struct RsiChart {
    symbol: String,
    series_name: String,
    time_range: TimeRange,
    points: Vec<ChartPoint>,
}

impl RsiChart {
    /// 지표 시계열에서 차트를 만듭니다. 값이 없는 점은 건너뜁니다.
    ///
    /// # Errors
    /// 정의된 값이 하나도 없으면 `RenderError::EmptySeries`를 반환합니다.
    pub fn new(
        symbol: impl Into<String>,
        time_range: TimeRange,
        series: &IndicatorSeries,
    ) -> Result<Self, RenderError> {
        let points: Vec<ChartPoint> = series
            .defined()
            .map(|(time, value)| ChartPoint::new(time, value))
            .collect();

        if points.is_empty() {
            return Err(RenderError::EmptySeries);
        }

        Ok(Self {
            symbol: symbol.into(),
            series_name: series.name.clone(),
            time_range,
            points,
        })
    }

    /// 차트 제목.
    pub fn title(&self) -> String {
        format!(
            "Calculation of Relative Strength Index (RSI) for {} for period of {}",
            self.symbol, self.time_range
        )
    }

    /// 그려지는 점 목록.
    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    /// 마지막 점.
    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.last()
    }

    /// x축 범위 (밀리초). 점이 하나면 눈금 간격만큼 앞으로 넓힙니다.
    fn x_domain(&self) -> (i64, i64) {
        let first = self.points.first().map(|p| p.x).unwrap_or_default();
        let last = self.points.last().map(|p| p.x).unwrap_or_default();
        if last > first {
            (first, last)
        } else {
            (last - self.time_range.tick_spacing().num_milliseconds(), last)
        }
    }

    fn plot_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn x_pos(&self, millis: i64) -> f64 {
        let (start, end) = self.x_domain();
        MARGIN_LEFT + (millis - start) as f64 / (end - start) as f64 * Self::plot_width()
    }

    fn y_pos(value: f64) -> f64 {
        MARGIN_TOP + (100.0 - value.clamp(0.0, 100.0)) / 100.0 * Self::plot_height()
    }

    /// SVG 문서를 생성합니다.
    pub fn render_svg(&self) -> String {
        let mut svg = String::with_capacity(16 * 1024);
        let plot_bottom = MARGIN_TOP + Self::plot_height();
        let plot_right = MARGIN_LEFT + Self::plot_width();

        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\">\n",
            w = WIDTH,
            h = HEIGHT
        ));
        svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
        svg.push_str(&format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"#e5e5e5\"/>\n",
            MARGIN_LEFT,
            MARGIN_TOP,
            Self::plot_width(),
            Self::plot_height()
        ));

        // 제목과 축 레이블
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"30\" text-anchor=\"middle\" font-size=\"16\">{}</text>\n",
            WIDTH / 2.0,
            escape_xml(&self.title())
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"13\">Date</text>\n",
            MARGIN_LEFT + Self::plot_width() / 2.0,
            HEIGHT - 10.0
        ));
        svg.push_str(&format!(
            "<text x=\"18\" y=\"{y:.1}\" text-anchor=\"middle\" font-size=\"13\" transform=\"rotate(-90 18 {y:.1})\">RSI Value</text>\n",
            y = MARGIN_TOP + Self::plot_height() / 2.0
        ));

        // y축 격자
        for value in (0..=100).step_by(20) {
            let y = Self::y_pos(value as f64);
            svg.push_str(&format!(
                "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"white\"/>\n",
                MARGIN_LEFT, plot_right
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"11\">{}</text>\n",
                MARGIN_LEFT - 6.0,
                y + 4.0,
                value
            ));
        }

        // x축 눈금
        let (start, end) = self.x_domain();
        for tick in tick_times(millis_to_time(start), millis_to_time(end), self.time_range) {
            let x = self.x_pos(tick.timestamp_millis());
            svg.push_str(&format!(
                "<line x1=\"{x:.1}\" y1=\"{:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"white\"/>\n",
                MARGIN_TOP, plot_bottom
            ));
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"end\" font-size=\"11\" transform=\"rotate(-45 {x:.1} {y:.1})\">{}</text>\n",
                tick.format(self.time_range.tick_format()),
                y = plot_bottom + 16.0
            ));
        }

        // 기준선
        for (threshold, color) in [(OVERBOUGHT_THRESHOLD, "red"), (OVERSOLD_THRESHOLD, "green")] {
            let y = Self::y_pos(threshold.to_f64_lossy());
            svg.push_str(&format!(
                "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"{}\" stroke-dasharray=\"8 5\" stroke-width=\"1.5\"/>\n",
                MARGIN_LEFT, plot_right, color
            ));
        }

        // RSI 선
        let polyline: Vec<String> = self
            .points
            .iter()
            .map(|p| format!("{:.1},{:.1}", self.x_pos(p.x), Self::y_pos(p.y.to_f64_lossy())))
            .collect();
        svg.push_str(&format!(
            "<polyline points=\"{}\" fill=\"none\" stroke=\"blue\" stroke-width=\"1.5\"/>\n",
            polyline.join(" ")
        ));

        // 마지막 값 주석
        if let Some(latest) = self.latest() {
            let value = latest.y.to_f64_lossy();
            let x = self.x_pos(latest.x);
            let y = Self::y_pos(value + 5.0);
            svg.push_str(&format!(
                "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"56\" height=\"22\" rx=\"5\" fill=\"white\" stroke=\"black\"/>\n",
                x - 28.0,
                y - 16.0
            ));
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"middle\" font-size=\"13\">{}</text>\n",
                latest.y.round_half_up(2)
            ));
        }

        // 범례
        let legend = [
            ("blue", "", self.series_name.clone()),
            ("red", "8 5", "Overbought (>70)".to_string()),
            ("green", "8 5", "Oversold (<30)".to_string()),
        ];
        for (i, (color, dash, label)) in legend.iter().enumerate() {
            let y = MARGIN_TOP + 18.0 + i as f64 * 18.0;
            let x = plot_right - 170.0;
            svg.push_str(&format!(
                "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"{}\" stroke-dasharray=\"{}\" stroke-width=\"2\"/>\n",
                x,
                x + 30.0,
                color,
                dash
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\">{}</text>\n",
                x + 38.0,
                y + 4.0,
                escape_xml(label)
            ));
        }

        svg.push_str("</svg>\n");
        svg
    }

    /// SVG를 렌더링해 `path`에 씁니다 (기존 파일은 덮어씀).
    ///
    /// # Errors
    /// 파일 쓰기에 실패하면 `RenderError::IoFailure`를 반환합니다.
    pub async fn write_artifact(&self, path: &Path) -> Result<PathBuf, RenderError> {
        let svg = self.render_svg();
        let io_failure = |source| RenderError::IoFailure {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
        }
        tokio::fs::write(path, svg.as_bytes()).await.map_err(io_failure)?;

        debug!(path = %path.display(), points = self.points.len(), "RSI 차트 저장");
        Ok(path.to_path_buf())
    }
}

fn millis_to_time(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// `[start, end]` 구간의 x축 눈금 시각.
///
/// 간격은 조회 기간을 따르고 (1일: 매시, 1주: 매일, 1개월: 매주 월요일),
/// 눈금은 간격 단위로 정렬됩니다.
pub fn tick_times(start: DateTime<Utc>, end: DateTime<Utc>, range: TimeRange) -> Vec<DateTime<Utc>> {
    let step = range.tick_spacing().num_seconds();
    if step <= 0 || end < start {
        return Vec::new();
    }

    let offset = start.timestamp() - WEEK_ANCHOR_SECS;
    let mut k = offset.div_euclid(step);
    if offset.rem_euclid(step) != 0 {
        k += 1;
    }

    let mut ticks = Vec::new();
    let mut current = WEEK_ANCHOR_SECS + k * step;
    while current <= end.timestamp() && ticks.len() < MAX_TICKS {
        if let Some(time) = DateTime::from_timestamp(current, 0) {
            ticks.push(time);
        }
        current += step;
    }
    ticks
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// 시각을 구간 끝 기준으로 `lookback`만큼 되돌린 시작 시각.
pub fn range_start(end: DateTime<Utc>, range: TimeRange) -> DateTime<Utc> {
    end - range.lookback()
}
