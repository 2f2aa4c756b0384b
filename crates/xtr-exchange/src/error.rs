//! 시장 데이터 조회 에러 타입.

use thiserror::Error;

/// 시장 데이터 조회 에러.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 응답에 기대한 필드가 없거나 파싱할 수 없음
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// 요청 구간에 봉이 없음
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// 네트워크/거래소 수준 실패 (타임아웃, 4xx/5xx, retCode != 0)
    #[error("Transport error: {0}")]
    Transport(String),

    /// 요청 파라미터 오류 (호출 전에 거부)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// 다음 틱에서 다시 시도할 만한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_) | FetchError::EmptyResult(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transport(format!("timeout: {}", err))
        } else if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::MalformedResponse(err.to_string())
    }
}
