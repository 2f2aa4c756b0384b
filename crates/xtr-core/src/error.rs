//! 봇 공통 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum XtrError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터 에러 (정렬되지 않은 봉, 빈 시계열 등)
    #[error("데이터 에러: {0}")]
    Data(String),

    /// 잘못된 입력 (알 수 없는 모드, 기간 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type XtrResult<T> = Result<T, XtrError>;

impl From<serde_json::Error> for XtrError {
    fn from(err: serde_json::Error) -> Self {
        XtrError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for XtrError {
    fn from(err: config::ConfigError) -> Self {
        XtrError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XtrError::InvalidInput("mode=loud".to_string());
        assert_eq!(err.to_string(), "잘못된 입력: mode=loud");
    }

    #[test]
    fn test_from_config_error() {
        let err: XtrError = config::ConfigError::Message("missing".to_string()).into();
        assert!(matches!(err, XtrError::Config(_)));
    }
}
