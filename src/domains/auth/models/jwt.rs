use serde::{Deserialize, Serialize};

/// JWT Claims (토큰에 포함될 데이터)
/// JWT Claims (data to be included in token)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 ID
    /// User ID
    pub user_id: u64,

    /// 이메일
    /// Email
    pub email: String,

    /// 관리자 여부 (분쟁 해결 권한)
    /// Admin role (dispute resolution)
    #[serde(default)]
    pub is_admin: bool,

    /// 만료 시간 (Unix timestamp)
    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// 발급 시간 (Unix timestamp)
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    /// 새 Claims 생성 (만료 시간 자동 계산)
    /// Create new Claims (expiration time automatically calculated)
    pub fn new(user_id: u64, email: String, is_admin: bool, expiration_hours: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        let exp = now + (expiration_hours * 3600);

        Self {
            user_id,
            email,
            is_admin,
            exp,
            iat: now,
        }
    }
}
