//! 봇 실행 설정 모듈.
//!
//! 파일/환경 변수 기반 `AppConfig`에 환경 변수에서만 읽는 비밀값
//! (Bybit 자격증명, 텔레그램 봇 토큰)을 더합니다.

use std::path::Path;

use xtr_core::{AppConfig, XtrResult};
use xtr_exchange::{BybitConfig, BybitCredentials};
use xtr_notification::TelegramConfig;

use crate::pipeline::PipelineSettings;

/// 봇 전체 설정
#[derive(Debug)]
pub struct BotConfig {
    /// 애플리케이션 설정 (config/default.toml + XTR__ 환경 변수)
    pub app: AppConfig,
    /// Bybit 서명용 자격증명 (없으면 서명 없이 공개 API 호출)
    pub bybit_credentials: Option<BybitCredentials>,
    /// 텔레그램 설정 (`TELEGRAM_BOT_TOKEN`이 없으면 None)
    pub telegram: Option<TelegramConfig>,
}

impl BotConfig {
    /// `.env`, 설정 파일, 환경 변수에서 설정 로드
    pub fn load<P: AsRef<Path>>(path: P) -> XtrResult<Self> {
        dotenvy::dotenv().ok();

        let app = AppConfig::load(path)?;
        Ok(Self::from_app(app))
    }

    /// 이미 로드된 `AppConfig`에 환경 변수의 비밀값을 더합니다.
    pub fn from_app(app: AppConfig) -> Self {
        let telegram = TelegramConfig::from_env().map(|t| t.with_settings(&app.telegram));

        Self {
            bybit_credentials: BybitCredentials::from_env(),
            telegram,
            app,
        }
    }

    /// Bybit 클라이언트 설정 (자격증명은 이 설정으로 옮겨집니다)
    pub fn take_bybit_config(&mut self) -> BybitConfig {
        BybitConfig::from_market(&self.app.market).with_credentials(self.bybit_credentials.take())
    }

    /// 파이프라인 설정
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings::from_app(&self.app)
    }
}
