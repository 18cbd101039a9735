// Payments domain routes
// 결제 도메인 라우터
use axum::{routing::post, Router};
use crate::domains::payments::handlers::{deposit_handler, webhook_handler};
use crate::shared::services::AppState;

/// 입금 / 지급 라우터 (/api/wallet 아래, 인증 필요)
pub fn create_wallet_payments_router() -> Router<AppState> {
    Router::new()
        .route("/deposit", post(deposit_handler::create_deposit))
        .route("/check-payment", post(deposit_handler::check_payment))
        .route("/tbank/deposit", post(deposit_handler::tbank_deposit))
        .route("/tbank/payout", post(deposit_handler::tbank_payout))
}

/// 게이트웨이 콜백 라우터 (/api/payments)
pub fn create_webhook_router() -> Router<AppState> {
    Router::new()
        .route("/yookassa/webhook", post(webhook_handler::yookassa_webhook))
        .route("/tbank/notification", post(webhook_handler::tbank_notification))
        .route("/cloudkassir/receipt", post(webhook_handler::cloudkassir_receipt))
}
