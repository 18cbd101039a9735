use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::collections::HashMap;

// =====================================================
// YooKassa API 모델
// =====================================================
// 결제 객체: { id, status, paid, amount { value, currency },
//             confirmation { type, confirmation_url }, metadata { userId } }
// 웹훅: { type: "notification", event: "payment.succeeded", object: <결제 객체> }
// =====================================================

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment.succeeded";
pub const STATUS_SUCCEEDED: &str = "succeeded";

/// 금액 (문자열 "1500.00" + 통화)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = YooKassaAmount)]
pub struct YooKassaAmount {
    #[schema(example = "1500.00")]
    pub value: String,
    #[schema(example = "RUB")]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = YooKassaConfirmation)]
pub struct YooKassaConfirmation {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_url: Option<String>,
}

/// YooKassa 결제 객체
/// Payment object as returned by the API and embedded in webhooks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = YooKassaPayment)]
pub struct YooKassaPayment {
    pub id: String,
    pub status: String,

    #[serde(default)]
    pub paid: bool,

    pub amount: YooKassaAmount,

    #[serde(default)]
    pub confirmation: Option<YooKassaConfirmation>,

    /// userId는 문자열 또는 숫자로 올 수 있음
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl YooKassaPayment {
    pub fn is_succeeded(&self) -> bool {
        self.status == STATUS_SUCCEEDED
    }

    /// metadata.userId 파싱 (없거나 잘못되면 None)
    pub fn metadata_user_id(&self) -> Option<u64> {
        match self.metadata.get("userId")? {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// YooKassa 웹훅 본문
/// Webhook body
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(as = YooKassaWebhook)]
pub struct YooKassaWebhook {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub event: String,
    pub object: YooKassaPayment,
}

/// 결제 생성 요청 (POST /v3/payments)
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentBody {
    pub amount: YooKassaAmount,
    pub capture: bool,
    pub confirmation: YooKassaConfirmation,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_user_id_accepts_string_or_number() {
        let mut payment: YooKassaPayment = serde_json::from_value(json!({
            "id": "abc123",
            "status": "succeeded",
            "amount": { "value": "100.00", "currency": "RUB" },
            "metadata": { "userId": "42" }
        }))
        .unwrap();
        assert_eq!(payment.metadata_user_id(), Some(42));

        payment.metadata.insert("userId".into(), json!(43));
        assert_eq!(payment.metadata_user_id(), Some(43));

        payment.metadata.insert("userId".into(), json!("not-a-number"));
        assert_eq!(payment.metadata_user_id(), None);

        payment.metadata.clear();
        assert_eq!(payment.metadata_user_id(), None);
    }
}
