use async_trait::async_trait;
use anyhow::Context;
use serde::Deserialize;
use crate::domains::payments::models::{CreatePaymentBody, YooKassaPayment};
use crate::shared::config::YooKassaConfig;
use crate::shared::errors::WalletError;

const GATEWAY: &str = "yookassa";

/// YooKassa API
/// 서비스는 이 trait에만 의존 (테스트에서는 가짜 구현 주입)
#[async_trait]
pub trait YooKassaApi: Send + Sync {
    /// 결제 생성 (POST /v3/payments)
    async fn create_payment(
        &self,
        body: &CreatePaymentBody,
        idempotence_key: &str,
    ) -> Result<YooKassaPayment, WalletError>;

    /// 결제 조회 (GET /v3/payments/{id})
    async fn get_payment(&self, payment_id: &str) -> Result<YooKassaPayment, WalletError>;
}

/// YooKassa 에러 응답 { type: "error", code, description }
#[derive(Debug, Deserialize)]
struct YooKassaErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

// YooKassa HTTP 클라이언트
// Basic auth (shop_id:secret_key) + Idempotence-Key 헤더
pub struct YooKassaClient {
    http_client: reqwest::Client,
    config: YooKassaConfig,
}

impl YooKassaClient {
    pub fn new(config: YooKassaConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client, config })
    }

    async fn read_payment(&self, response: reqwest::Response) -> Result<YooKassaPayment, WalletError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<YooKassaErrorBody> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(err) => (err.code, err.description.unwrap_or_else(|| status.to_string())),
                None => (None, format!("{} - {}", status, body)),
            };
            return Err(WalletError::Gateway { gateway: GATEWAY, code, message });
        }

        response.json().await.map_err(|e| WalletError::Gateway {
            gateway: GATEWAY,
            code: None,
            message: format!("Failed to parse YooKassa response: {}", e),
        })
    }
}

fn transport_error(err: reqwest::Error) -> WalletError {
    WalletError::Gateway {
        gateway: GATEWAY,
        code: None,
        message: format!("Failed to reach YooKassa: {}", err),
    }
}

#[async_trait]
impl YooKassaApi for YooKassaClient {
    async fn create_payment(
        &self,
        body: &CreatePaymentBody,
        idempotence_key: &str,
    ) -> Result<YooKassaPayment, WalletError> {
        let url = format!("{}/v3/payments", self.config.api_url);
        tracing::debug!(%url, amount = %body.amount.value, "creating YooKassa payment");

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header("Idempotence-Key", idempotence_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        self.read_payment(response).await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<YooKassaPayment, WalletError> {
        let url = format!("{}/v3/payments/{}", self.config.api_url, payment_id);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .send()
            .await
            .map_err(transport_error)?;

        self.read_payment(response).await
    }
}
