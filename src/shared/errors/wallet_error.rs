use thiserror::Error;
use axum::{http::StatusCode, Json};
use rust_decimal::Decimal;
use serde_json::json;

/// 지갑/에스크로/결제 관련 에러
/// Wallet, escrow and payment errors
///
/// 잔고를 움직이는 모든 경로가 이 에러를 반환합니다.
/// Every balance-affecting path returns this error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    /// 인증 정보 없음 또는 잘못됨
    /// Missing or invalid session
    #[error("Unauthorized")]
    Unauthorized,

    /// 권한 없음 (리소스 소유자가 아님)
    /// Wrong role or not the resource owner
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// 대상을 찾을 수 없음
    /// Task, payment, deal or user absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// 잘못된 입력 (금액 형식, 필수 필드 누락)
    /// Malformed amount or missing required field
    #[error("{0}")]
    InvalidInput(String),

    /// 잔액 부족
    /// Insufficient balance
    #[error("Insufficient funds: required={required}, available={available}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    /// 상태 충돌 (중복 분쟁, 잘못된 상태 전이)
    /// Duplicate dispute or invalid state transition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 이미 처리된 게이트웨이 결제
    /// Gateway payment already recorded
    #[error("Duplicate gateway payment: {key}")]
    Duplicate { key: String },

    /// 이상거래 탐지로 출금 차단
    /// Withdrawal rejected by the anti-fraud gate
    #[error("Withdrawal blocked: {reason}")]
    WithdrawalBlocked { reason: String },

    /// 외부 결제 게이트웨이 에러
    /// External gateway failure (gateway's own code/message passed through)
    #[error("{gateway} error: {message}")]
    Gateway {
        gateway: &'static str,
        code: Option<String>,
        message: String,
    },

    /// 데이터베이스 에러
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// 내부 서버 에러
    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl WalletError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WalletError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        WalletError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WalletError::Unauthorized => StatusCode::UNAUTHORIZED,
            WalletError::Forbidden { .. } => StatusCode::FORBIDDEN,
            WalletError::WithdrawalBlocked { .. } => StatusCode::FORBIDDEN,
            WalletError::NotFound { .. } => StatusCode::NOT_FOUND,
            WalletError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WalletError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            WalletError::Conflict(_) => StatusCode::BAD_REQUEST,
            WalletError::Duplicate { .. } => StatusCode::BAD_REQUEST,
            WalletError::Gateway { .. } => StatusCode::BAD_REQUEST,
            WalletError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WalletError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        WalletError::Database(err.to_string())
    }
}

/// WalletError를 HTTP 응답으로 변환
/// 500 계열은 내부 정보를 노출하지 않고 로그만 남김
impl From<WalletError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: WalletError) -> Self {
        let status = err.status_code();

        let body = match &err {
            WalletError::InsufficientFunds { available, required } => json!({
                "error": err.to_string(),
                "details": {
                    "available": available.to_string(),
                    "required": required.to_string(),
                }
            }),
            WalletError::Gateway { gateway, code, .. } => json!({
                "error": err.to_string(),
                "details": {
                    "gateway": gateway,
                    "code": code,
                }
            }),
            WalletError::Database(_) | WalletError::Internal(_) => {
                tracing::error!(error = %err, "request failed with internal error");
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": err.to_string() }),
        };

        (status, Json(body))
    }
}
