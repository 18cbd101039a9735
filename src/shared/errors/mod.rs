// Error types
// 인증 에러 (401/403)와 지갑 도메인 에러
pub mod auth_error;
pub mod wallet_error;

pub use auth_error::*;
pub use wallet_error::*;
