use async_trait::async_trait;
use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use crate::domains::payments::models::{ReceiptRequestBody, ReceiptResponse};
use crate::shared::config::CloudKassirConfig;
use crate::shared::errors::WalletError;

const GATEWAY: &str = "cloudkassir";

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait CloudKassirApi: Send + Sync {
    /// 영수증 요청 (POST /kkt/receipt)
    async fn request_receipt(&self, body: &ReceiptRequestBody) -> Result<ReceiptResponse, WalletError>;
}

/// X-Content-HMAC 검증
/// base64(HMAC-SHA256(raw body, api secret))
pub fn verify_content_hmac(body: &[u8], secret: &str, header: &str) -> bool {
    let Ok(signature) = general_purpose::STANDARD.decode(header.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// 콜백 서명 생성 (테스트 / 로컬 재전송용)
pub fn sign_content(body: &[u8], secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC은 모든 길이의 키를 허용
        Err(_) => return String::new(),
    };
    mac.update(body);
    general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

pub struct CloudKassirClient {
    http_client: reqwest::Client,
    config: CloudKassirConfig,
}

impl CloudKassirClient {
    pub fn new(config: CloudKassirConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client, config })
    }
}

#[async_trait]
impl CloudKassirApi for CloudKassirClient {
    async fn request_receipt(&self, body: &ReceiptRequestBody) -> Result<ReceiptResponse, WalletError> {
        let url = format!("{}/kkt/receipt", self.config.api_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.config.public_id, Some(&self.config.api_secret))
            .json(body)
            .send()
            .await
            .map_err(|e| WalletError::Gateway {
                gateway: GATEWAY,
                code: None,
                message: format!("Failed to reach CloudKassir: {}", e),
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

        let parsed: ReceiptResponse = response.json().await.map_err(|e| WalletError::Gateway {
            gateway: GATEWAY,
            code: None,
            message: format!("Failed to parse CloudKassir response: {}", e),
        })?;

        if !parsed.success {
            return Err(WalletError::Gateway {
                gateway: GATEWAY,
                code: None,
                message: parsed.message.unwrap_or_else(|| "Receipt request rejected".to_string()),
            });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_accepts_own_signature() {
        let body = br#"{"Id":"r-1","InvoiceId":"17"}"#;
        let header = sign_content(body, "api-secret");

        assert!(verify_content_hmac(body, "api-secret", &header));
        assert!(!verify_content_hmac(body, "wrong-secret", &header));
        assert!(!verify_content_hmac(b"tampered", "api-secret", &header));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(!verify_content_hmac(b"{}", "api-secret", "not base64 !!"));
    }
}
