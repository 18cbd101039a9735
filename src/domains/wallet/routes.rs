// Wallet domain routes
// 지갑 도메인 라우터
use axum::{routing::{get, post}, Router};
use crate::domains::wallet::handlers::wallet_handler;
use crate::shared::services::AppState;

/// Create wallet router (/api/wallet)
/// 지갑 라우터 생성 (모두 인증 필요)
pub fn create_wallet_router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(wallet_handler::get_balance))
        .route("/transactions", get(wallet_handler::get_transactions))
        .route("/withdraw", post(wallet_handler::withdraw))
}
