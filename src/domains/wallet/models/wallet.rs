use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use rust_decimal::Decimal;
use crate::domains::wallet::models::{LedgerEntry, MoneyInput};

/// 출금 요청
/// Withdraw request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = WithdrawRequest)]
pub struct WithdrawRequest {
    /// 출금 금액 (문자열 또는 숫자)
    /// Amount as string or number
    #[schema(value_type = String, example = "500.00")]
    pub amount: MoneyInput,
}

/// 출금 응답
/// Withdraw response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = WithdrawResponse)]
pub struct WithdrawResponse {
    pub success: bool,

    /// 출금 후 잔고
    /// Balance after the withdrawal
    #[schema(value_type = String, example = "500.00")]
    pub balance: Decimal,

    /// 이상거래 경고 (차단되지 않은 경우)
    /// Soft anti-fraud warnings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// 원장 내역 조회 쿼리
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionsQuery {
    /// 최대 개수 (기본 50, 최대 200)
    pub limit: Option<u32>,
}

/// 원장 내역 응답
/// Ledger history response (newest first)
#[derive(Debug, Serialize, ToSchema)]
#[schema(as = TransactionsResponse)]
pub struct TransactionsResponse {
    pub transactions: Vec<LedgerEntry>,
}
