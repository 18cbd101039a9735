use thiserror::Error;
use axum::{http::StatusCode, Json};
use serde_json::json;

/// 인증 관련 에러
/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// 잘못된 또는 만료된 토큰
    /// Invalid or expired token
    #[error("Invalid or expired token")]
    InvalidToken,

    /// 토큰이 제공되지 않음
    /// Token not provided
    #[error("Missing authorization header")]
    MissingToken,

    /// Authorization 헤더 형식 오류
    #[error("Invalid authorization format. Expected: 'Bearer <token>'")]
    InvalidFormat,

    /// 관리자 권한 필요
    /// Admin role required
    #[error("Admin role required")]
    AdminRequired,

    /// 내부 서버 에러
    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// AuthError를 HTTP 응답으로 변환
impl From<AuthError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: AuthError) -> Self {
        let (status, message) = match &err {
            AuthError::InvalidToken | AuthError::MissingToken | AuthError::InvalidFormat => {
                (StatusCode::UNAUTHORIZED, err.to_string())
            }
            AuthError::AdminRequired => (StatusCode::FORBIDDEN, err.to_string()),
            AuthError::Internal(_) => {
                tracing::error!(error = %err, "auth failed with internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message })))
    }
}
