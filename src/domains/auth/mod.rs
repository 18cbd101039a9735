// Auth domain module
// 로그인/회원가입은 외부 인증 서비스 담당, 여기서는 JWT 검증만
pub mod services;
pub mod models;

pub use services::*;
pub use models::*;
