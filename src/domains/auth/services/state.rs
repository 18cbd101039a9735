// Auth domain state
// 인증 도메인 상태
use crate::domains::auth::services::JwtService;

/// Auth domain state
/// 인증 도메인에서 필요한 서비스들을 포함하는 상태
#[derive(Clone)]
pub struct AuthState {
    pub jwt_service: JwtService,
}

impl AuthState {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}
