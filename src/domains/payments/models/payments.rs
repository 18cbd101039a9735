use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use rust_decimal::Decimal;
use crate::domains::payments::models::TBankPayout;
use crate::domains::wallet::models::MoneyInput;

/// 입금 요청 (YooKassa / T-Bank 공통)
/// Deposit request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = DepositRequest)]
pub struct DepositRequest {
    #[schema(value_type = String, example = "1500.00")]
    pub amount: MoneyInput,
}

/// YooKassa 입금 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = DepositResponse)]
pub struct DepositResponse {
    pub payment_id: String,
    pub confirmation_url: Option<String>,
}

/// 결제 확인 요청
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = CheckPaymentRequest)]
pub struct CheckPaymentRequest {
    #[schema(example = "2d8e3b1c-000f-5000-9000-1b1a8e1c2f3a")]
    pub payment_id: String,
}

/// 결제 확인 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = CheckPaymentResponse)]
pub struct CheckPaymentResponse {
    pub success: bool,

    #[schema(value_type = String, example = "2500.00")]
    pub balance: Decimal,

    /// YooKassa 결제 상태
    pub status: String,

    /// 이미 반영된 결제인지
    pub duplicate: bool,
}

/// 웹훅 응답
/// Webhook acknowledgement: `{ received: true, duplicate?: true }`
#[derive(Debug, Serialize, ToSchema)]
#[schema(as = WebhookAck)]
pub struct WebhookAck {
    pub received: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true, duplicate: false }
    }

    pub fn duplicate() -> Self {
        Self { received: true, duplicate: true }
    }
}

/// T-Bank 입금 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TBankDepositResponse)]
pub struct TBankDepositResponse {
    pub order_id: String,
    pub payment_url: String,
}

/// T-Bank 지급 요청
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TBankPayoutRequest)]
pub struct TBankPayoutRequest {
    #[schema(value_type = String, example = "1000.00")]
    pub amount: MoneyInput,

    /// 딜을 닫는 최종 지급
    #[serde(default)]
    pub is_final: bool,

    /// 등록된 카드 ID (T-Bank CardId)
    pub card_id: Option<String>,
}

/// T-Bank 지급 응답
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TBankPayoutResponse)]
pub struct TBankPayoutResponse {
    pub success: bool,

    #[schema(value_type = String, example = "500.00")]
    pub balance: Decimal,

    pub payout: TBankPayout,
}
