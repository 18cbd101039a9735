use async_trait::async_trait;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use hmac::digest::{CtOutput, Output};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use crate::domains::payments::models::json_scalar_to_string;
use crate::domains::wallet::models::to_minor_units;
use crate::shared::config::TBankConfig;
use crate::shared::errors::WalletError;

// =====================================================
// T-Bank (Tinkoff) 클라이언트
// =====================================================
// Token 규칙:
// 1. 루트 레벨 스칼라 필드만 사용 (Token, 중첩 객체/배열 제외)
// 2. Password 필드 추가
// 3. 키 기준 정렬 후 값만 이어붙임
// 4. SHA-256 hex
// 알림 검증은 digest 바이트를 상수 시간으로 비교
// =====================================================

const GATEWAY: &str = "tbank";

/// Init 호출 입력
#[derive(Debug, Clone, PartialEq)]
pub struct TBankInitRequest {
    pub order_id: String,
    pub amount: Decimal,
    pub description: String,
    /// 기존 딜에 누적할 때만
    pub sp_accumulation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TBankInitResult {
    pub payment_id: String,
    pub payment_url: String,
}

/// 지급 (e2c) 호출 입력
#[derive(Debug, Clone, PartialEq)]
pub struct TBankPayoutCall {
    pub order_id: String,
    pub deal_id: String,
    pub amount: Decimal,
    pub card_id: Option<String>,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TBankPayoutResult {
    pub gateway_payout_id: String,
}

#[async_trait]
pub trait TBankApi: Send + Sync {
    async fn init(&self, request: TBankInitRequest) -> Result<TBankInitResult, WalletError>;

    async fn payout(&self, request: TBankPayoutCall) -> Result<TBankPayoutResult, WalletError>;
}

/// 요청/알림 Token 계산
/// Compute the T-Bank token of a JSON object
pub fn tbank_token(params: &Value, password: &str) -> Option<String> {
    token_digest(params, password).map(|digest| format!("{:x}", digest))
}

fn token_digest(params: &Value, password: &str) -> Option<Output<Sha256>> {
    let object = params.as_object()?;

    let mut values: BTreeMap<&str, String> = BTreeMap::new();
    for (key, value) in object {
        if key == "Token" {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        values.insert(key.as_str(), text);
    }
    values.insert("Password", password.to_string());

    let mut hasher = Sha256::new();
    for value in values.values() {
        hasher.update(value.as_bytes());
    }
    Some(hasher.finalize())
}

/// 알림 Token 검증 (대소문자 무관 hex)
pub fn verify_notification_token(body: &Value, password: &str) -> bool {
    let Some(received) = body.get("Token").and_then(Value::as_str) else {
        return false;
    };
    let Some(received) = decode_hex(received).and_then(Output::<Sha256>::from_exact_iter) else {
        return false;
    };
    match token_digest(body, password) {
        Some(expected) => CtOutput::<Sha256>::new(expected) == CtOutput::new(received),
        None => false,
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TBankResponse {
    success: bool,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    payment_id: Option<Value>,
    #[serde(default, rename = "PaymentURL")]
    payment_url: Option<String>,
}

impl TBankResponse {
    fn into_result(self) -> Result<Self, WalletError> {
        let failed = !self.success || self.error_code.as_deref().is_some_and(|c| c != "0");
        if failed {
            let message = self
                .details
                .filter(|d| !d.is_empty())
                .or(self.message)
                .unwrap_or_else(|| "T-Bank request failed".to_string());
            return Err(WalletError::Gateway {
                gateway: GATEWAY,
                code: self.error_code,
                message,
            });
        }
        Ok(self)
    }

    fn payment_id(&self) -> Result<String, WalletError> {
        self.payment_id
            .as_ref()
            .and_then(json_scalar_to_string)
            .ok_or_else(|| WalletError::Gateway {
                gateway: GATEWAY,
                code: None,
                message: "T-Bank response has no PaymentId".to_string(),
            })
    }
}

pub struct TBankClient {
    http_client: reqwest::Client,
    config: TBankConfig,
}

impl TBankClient {
    pub fn new(config: TBankConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client, config })
    }

    /// TerminalKey + Token 추가 후 POST
    async fn call(&self, path: &str, mut params: Map<String, Value>) -> Result<TBankResponse, WalletError> {
        params.insert("TerminalKey".to_string(), json!(self.config.terminal_key));
        let mut body = Value::Object(params);
        let token = tbank_token(&body, &self.config.password)
            .ok_or_else(|| WalletError::Internal("T-Bank request is not an object".to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("Token".to_string(), json!(token));
        }

        let url = format!("{}{}", self.config.api_url, path);
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::Gateway {
                gateway: GATEWAY,
                code: None,
                message: format!("Failed to reach T-Bank: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WalletError::Gateway {
                gateway: GATEWAY,
                code: Some(status.as_u16().to_string()),
                message: text,
            });
        }

        let parsed: TBankResponse = response.json().await.map_err(|e| WalletError::Gateway {
            gateway: GATEWAY,
            code: None,
            message: format!("Failed to parse T-Bank response: {}", e),
        })?;

        parsed.into_result()
    }
}

#[async_trait]
impl TBankApi for TBankClient {
    async fn init(&self, request: TBankInitRequest) -> Result<TBankInitResult, WalletError> {
        let mut params = Map::new();
        params.insert("Amount".to_string(), json!(to_minor_units(request.amount)?));
        params.insert("OrderId".to_string(), json!(request.order_id));
        params.insert("Description".to_string(), json!(request.description));
        match request.sp_accumulation_id {
            Some(deal_id) => {
                params.insert("SpAccumulationId".to_string(), json!(deal_id));
            }
            None => {
                params.insert("CreateDealWithType".to_string(), json!("NN"));
            }
        }

        let response = self.call("/v2/Init", params).await?;
        let payment_id = response.payment_id()?;
        let payment_url = response.payment_url.ok_or_else(|| WalletError::Gateway {
            gateway: GATEWAY,
            code: None,
            message: "T-Bank response has no PaymentURL".to_string(),
        })?;

        Ok(TBankInitResult { payment_id, payment_url })
    }

    async fn payout(&self, request: TBankPayoutCall) -> Result<TBankPayoutResult, WalletError> {
        // 1. e2c Init
        let mut params = Map::new();
        params.insert("OrderId".to_string(), json!(request.order_id));
        params.insert("DealId".to_string(), json!(request.deal_id));
        params.insert("Amount".to_string(), json!(to_minor_units(request.amount)?));
        if let Some(card_id) = request.card_id {
            params.insert("CardId".to_string(), json!(card_id));
        }
        if request.is_final {
            params.insert("FinalPayout".to_string(), json!(true));
        }
        let init = self.call("/e2c/v2/Init", params).await?;
        let payment_id = init.payment_id()?;

        // 2. e2c Payment (실제 지급 실행)
        let mut params = Map::new();
        params.insert("PaymentId".to_string(), json!(payment_id));
        self.call("/e2c/v2/Payment", params).await?;

        Ok(TBankPayoutResult { gateway_payout_id: payment_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_sorts_keys_and_skips_nested_values() {
        let body = json!({
            "TerminalKey": "TestTerminal",
            "OrderId": "order-1",
            "Amount": 150000,
            "Success": true,
            "Data": { "Ignored": "yes" },
            "Token": "whatever"
        });

        // Amount, OrderId, Password, Success, TerminalKey 순서
        let mut hasher = Sha256::new();
        hasher.update("150000order-1secrettrueTestTerminal".as_bytes());
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(tbank_token(&body, "secret"), Some(expected));
    }

    #[test]
    fn notification_token_round_trip() {
        let mut body = json!({
            "TerminalKey": "TestTerminal",
            "OrderId": "order-1",
            "Success": true,
            "Status": "CONFIRMED",
            "PaymentId": 13660,
            "Amount": 100000
        });
        let token = tbank_token(&body, "secret").unwrap();
        body["Token"] = json!(token);

        assert!(verify_notification_token(&body, "secret"));
        assert!(!verify_notification_token(&body, "other"));

        body["Amount"] = json!(999);
        assert!(!verify_notification_token(&body, "secret"));
    }

    #[test]
    fn token_check_accepts_either_case_and_rejects_tampering() {
        let mut body = json!({
            "TerminalKey": "TestTerminal",
            "OrderId": "order-1",
            "Status": "CONFIRMED",
            "Amount": 100000
        });
        let token = tbank_token(&body, "secret").unwrap();

        body["Token"] = json!(token.to_uppercase());
        assert!(verify_notification_token(&body, "secret"));

        // 마지막 hex 자리만 변경
        let mut tampered = token.clone();
        let last = if tampered.ends_with('0') { "1" } else { "0" };
        tampered.replace_range(tampered.len() - 1.., last);
        body["Token"] = json!(tampered);
        assert!(!verify_notification_token(&body, "secret"));

        let padded = format!("{}00", token);
        for malformed in ["", "abc", "zz", &token[..62], padded.as_str()] {
            body["Token"] = json!(malformed);
            assert!(!verify_notification_token(&body, "secret"), "{:?}", malformed);
        }
    }

    #[test]
    fn missing_token_is_rejected() {
        let body = json!({ "OrderId": "order-1" });
        assert!(!verify_notification_token(&body, "secret"));
    }
}
