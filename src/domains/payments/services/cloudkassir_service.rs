use std::sync::Arc;
use crate::domains::payments::models::{
    CloudKassirAck, CloudKassirReceiptCallback, CustomerReceipt, ReceiptAmounts, ReceiptItem,
    ReceiptRequestBody,
};
use crate::domains::wallet::models::{to_gateway_string, LedgerEntry, ReceiptAttach};
use crate::shared::clients::{verify_content_hmac, CloudKassirApi};
use crate::shared::config::CloudKassirConfig;
use crate::shared::database::LedgerStore;
use crate::shared::errors::WalletError;

// =====================================================
// CloudKassir: 입금 후 전자 영수증
// =====================================================
// 1. 입금 반영 후 영수증 요청 (InvoiceId = 원장 기록 ID)
//    실패는 로그만 (입금은 이미 커밋됨)
// 2. 콜백으로 받은 영수증 ID를 원장 기록에 1회 연결
// =====================================================

/// 영수증 품목명
const DEPOSIT_ITEM_LABEL: &str = "Пополнение баланса";
/// 과세 체계 (0 = 일반)
const TAXATION_SYSTEM: u8 = 0;

#[derive(Clone)]
pub struct CloudKassirService {
    api: Arc<dyn CloudKassirApi>,
    store: Arc<dyn LedgerStore>,
    config: CloudKassirConfig,
}

impl CloudKassirService {
    pub fn new(api: Arc<dyn CloudKassirApi>, store: Arc<dyn LedgerStore>, config: CloudKassirConfig) -> Self {
        Self { api, store, config }
    }

    /// 입금 기록에 대한 영수증 요청 (실패는 로그만)
    pub async fn request_receipt(&self, entry: &LedgerEntry) {
        if self.config.public_id.is_empty() {
            tracing::debug!(entry_id = entry.id, "CloudKassir not configured, receipt skipped");
            return;
        }

        let body = match build_receipt(&self.config, entry) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(entry_id = entry.id, error = %e, "failed to build receipt request");
                return;
            }
        };

        match self.api.request_receipt(&body).await {
            Ok(_) => tracing::info!(entry_id = entry.id, "fiscal receipt requested"),
            Err(e) => tracing::warn!(entry_id = entry.id, error = %e, "fiscal receipt request failed"),
        }
    }

    /// 영수증 콜백 처리
    /// Attach the receipt id to the ledger entry named by InvoiceId
    pub async fn handle_callback(
        &self,
        raw_body: &[u8],
        hmac_header: Option<&str>,
    ) -> Result<CloudKassirAck, WalletError> {
        if let Some(header) = hmac_header {
            if !verify_content_hmac(raw_body, &self.config.api_secret, header) {
                tracing::warn!("CloudKassir callback with invalid HMAC");
                return Err(WalletError::forbidden("Invalid X-Content-HMAC signature"));
            }
        }

        let callback: CloudKassirReceiptCallback = serde_json::from_slice(raw_body)
            .map_err(|e| WalletError::InvalidInput(format!("Invalid receipt callback: {}", e)))?;

        let entry_id: u64 = callback
            .invoice_id
            .as_deref()
            .and_then(|id| id.trim().parse().ok())
            .ok_or_else(|| WalletError::InvalidInput("Missing or invalid InvoiceId".to_string()))?;

        match self.store.attach_receipt(entry_id, &callback.id).await? {
            ReceiptAttach::Attached(_) => {
                tracing::info!(entry_id, receipt_id = %callback.id, "fiscal receipt attached");
            }
            ReceiptAttach::AlreadyAttached(_) => {
                tracing::info!(entry_id, receipt_id = %callback.id, "duplicate receipt callback ignored");
            }
            ReceiptAttach::Mismatch { existing, .. } => {
                // 제공자가 재시도하지 않도록 code 0으로 응답
                tracing::error!(
                    entry_id,
                    receipt_id = %callback.id,
                    existing = %existing,
                    "receipt callback conflicts with attached receipt"
                );
            }
        }

        Ok(CloudKassirAck::ok())
    }
}

fn build_receipt(config: &CloudKassirConfig, entry: &LedgerEntry) -> Result<ReceiptRequestBody, WalletError> {
    let amount: serde_json::Number = to_gateway_string(entry.amount)
        .parse()
        .map_err(|e| WalletError::Internal(format!("Invalid receipt amount: {}", e)))?;

    Ok(ReceiptRequestBody {
        inn: config.inn.clone(),
        receipt_type: "Income".to_string(),
        customer_receipt: CustomerReceipt {
            items: vec![ReceiptItem {
                label: DEPOSIT_ITEM_LABEL.to_string(),
                price: amount.clone(),
                quantity: 1,
                amount: amount.clone(),
                vat: None,
            }],
            taxation_system: TAXATION_SYSTEM,
            amounts: ReceiptAmounts { electronic: amount },
        },
        invoice_id: entry.id.to_string(),
        account_id: entry.user_id.map(|id| id.to_string()).unwrap_or_default(),
    })
}
