use crate::domains::wallet::models::{
    BalanceResponse, TransactionsQuery, TransactionsResponse, WithdrawRequest, WithdrawResponse,
};
use crate::shared::services::AppState;
use crate::shared::middleware::auth::AuthenticatedUser;
use crate::shared::errors::WalletError;
use axum::{extract::{Query, State}, http::StatusCode, Json};

/// 잔고 조회 핸들러
/// Get balance handler
#[utoipa::path(
    get,
    path = "/api/wallet/balance",
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse),
        (status = 401, description = "Unauthorized (missing or invalid token)"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Wallet",
    security(("BearerAuth" = []))
)]
pub async fn get_balance(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, (StatusCode, Json<serde_json::Value>)> {
    let balance = app_state
        .wallet_state
        .wallet_service
        .get_balance(authenticated_user.user_id)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(BalanceResponse::from(&balance)))
}

/// 원장 내역 조회 핸들러
/// Ledger history handler (newest first)
#[utoipa::path(
    get,
    path = "/api/wallet/transactions",
    params(TransactionsQuery),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = TransactionsResponse),
        (status = 401, description = "Unauthorized (missing or invalid token)"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Wallet",
    security(("BearerAuth" = []))
)]
pub async fn get_transactions(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, (StatusCode, Json<serde_json::Value>)> {
    let transactions = app_state
        .wallet_state
        .wallet_service
        .list_transactions(authenticated_user.user_id, query.limit)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TransactionsResponse { transactions }))
}

/// 출금 핸들러
/// Withdraw handler
/// Note: 이상거래 차단 시 403, 잔액 부족 시 400 (details.available / details.required)
#[utoipa::path(
    post,
    path = "/api/wallet/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Withdrawal completed", body = WithdrawResponse),
        (status = 400, description = "Invalid amount or insufficient funds"),
        (status = 401, description = "Unauthorized (missing or invalid token)"),
        (status = 403, description = "Withdrawal blocked by anti-fraud checks"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Wallet",
    security(("BearerAuth" = []))
)]
pub async fn withdraw(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, (StatusCode, Json<serde_json::Value>)> {
    let outcome = app_state
        .wallet_state
        .wallet_service
        .withdraw(authenticated_user.user_id, &request.amount)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(WithdrawResponse {
        success: true,
        balance: outcome.balance.balance,
        warnings: outcome.warnings,
    }))
}
