use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =====================================================
// CloudKassir (전자 영수증) 모델
// =====================================================
// 영수증 요청: POST /kkt/receipt, InvoiceId = 원장 기록 ID
// 콜백: { Id, InvoiceId, Amount, ... } + 선택적 X-Content-HMAC
// 응답: { "code": 0 }
// =====================================================

/// CloudKassir 영수증 콜백
/// Receipt notification posted by CloudKassir
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
#[schema(as = CloudKassirReceiptCallback)]
pub struct CloudKassirReceiptCallback {
    /// 영수증 ID
    pub id: String,

    /// 원장 기록 ID (영수증 요청 시 전달한 값)
    #[serde(default)]
    pub invoice_id: Option<String>,

    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub amount: Option<serde_json::Value>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, rename = "Type")]
    pub receipt_type: Option<String>,
}

/// 콜백 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct CloudKassirAck {
    pub code: i32,
}

impl CloudKassirAck {
    pub fn ok() -> Self {
        Self { code: 0 }
    }
}

// ----- 영수증 요청 (kkt/receipt) -----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiptRequestBody {
    pub inn: String,
    #[serde(rename = "Type")]
    pub receipt_type: String,
    pub customer_receipt: CustomerReceipt,
    pub invoice_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerReceipt {
    #[serde(rename = "Items")]
    pub items: Vec<ReceiptItem>,
    pub taxation_system: u8,
    pub amounts: ReceiptAmounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub label: String,
    /// 가격 ("1500.00" 형식의 숫자)
    pub price: serde_json::Number,
    pub quantity: u32,
    pub amount: serde_json::Number,
    pub vat: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptAmounts {
    pub electronic: serde_json::Number,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiptResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<serde_json::Value>,
}
