use crate::domains::payments::models::{
    CheckPaymentRequest, CheckPaymentResponse, DepositRequest, DepositResponse,
    TBankDepositResponse, TBankPayoutRequest, TBankPayoutResponse,
};
use crate::shared::services::AppState;
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::errors::WalletError;
use axum::{extract::State, http::StatusCode, Json};

/// YooKassa 입금 생성 핸들러
/// Create a YooKassa deposit and return the confirmation URL
#[utoipa::path(
    post,
    path = "/api/wallet/deposit",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Deposit created", body = DepositResponse),
        (status = 400, description = "Invalid amount or gateway error"),
        (status = 401, description = "Unauthorized (missing or invalid token)")
    ),
    tag = "Payments",
    security(("BearerAuth" = []))
)]
pub async fn create_deposit(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, (StatusCode, Json<serde_json::Value>)> {
    let deposit = app_state
        .payments_state
        .yookassa_service
        .create_deposit(authenticated_user.user_id, &request.amount)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(DepositResponse {
        payment_id: deposit.payment_id,
        confirmation_url: deposit.confirmation_url,
    }))
}

/// 결제 확인 핸들러
/// Poll YooKassa directly and credit the payment if the webhook has not arrived yet
#[utoipa::path(
    post,
    path = "/api/wallet/check-payment",
    request_body = CheckPaymentRequest,
    responses(
        (status = 200, description = "Payment checked", body = CheckPaymentResponse),
        (status = 401, description = "Unauthorized (missing or invalid token)"),
        (status = 403, description = "Payment belongs to another user")
    ),
    tag = "Payments",
    security(("BearerAuth" = []))
)]
pub async fn check_payment(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<CheckPaymentRequest>,
) -> Result<Json<CheckPaymentResponse>, (StatusCode, Json<serde_json::Value>)> {
    let checked = app_state
        .payments_state
        .yookassa_service
        .check_payment(authenticated_user.user_id, &request.payment_id)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(CheckPaymentResponse {
        success: true,
        balance: checked.balance.balance,
        status: checked.status,
        duplicate: checked.duplicate,
    }))
}

/// T-Bank 입금 시작 핸들러
#[utoipa::path(
    post,
    path = "/api/wallet/tbank/deposit",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Deposit initiated", body = TBankDepositResponse),
        (status = 400, description = "Invalid amount or gateway error"),
        (status = 401, description = "Unauthorized (missing or invalid token)")
    ),
    tag = "Payments",
    security(("BearerAuth" = []))
)]
pub async fn tbank_deposit(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<DepositRequest>,
) -> Result<Json<TBankDepositResponse>, (StatusCode, Json<serde_json::Value>)> {
    let deposit = app_state
        .payments_state
        .tbank_service
        .init_deposit(authenticated_user.user_id, &request.amount)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TBankDepositResponse {
        order_id: deposit.order_id,
        payment_url: deposit.payment_url,
    }))
}

/// T-Bank 지급 핸들러
/// Note: 게이트웨이 실패 시 동결 금액은 롤백되고 400 반환
#[utoipa::path(
    post,
    path = "/api/wallet/tbank/payout",
    request_body = TBankPayoutRequest,
    responses(
        (status = 200, description = "Payout completed", body = TBankPayoutResponse),
        (status = 400, description = "Insufficient funds or gateway error"),
        (status = 401, description = "Unauthorized (missing or invalid token)"),
        (status = 404, description = "No open T-Bank deal"),
        (status = 409, description = "Deal has no confirmed payments")
    ),
    tag = "Payments",
    security(("BearerAuth" = []))
)]
pub async fn tbank_payout(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<TBankPayoutRequest>,
) -> Result<Json<TBankPayoutResponse>, (StatusCode, Json<serde_json::Value>)> {
    let completed = app_state
        .payments_state
        .tbank_service
        .payout(
            authenticated_user.user_id,
            &request.amount,
            request.is_final,
            request.card_id,
        )
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TBankPayoutResponse {
        success: true,
        balance: completed.balance.balance,
        payout: completed.payout,
    }))
}
