use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use crate::domains::payments::models::{
    CreatePaymentBody, YooKassaAmount, YooKassaConfirmation, YooKassaPayment, YooKassaWebhook,
    EVENT_PAYMENT_SUCCEEDED,
};
use crate::domains::payments::services::CloudKassirService;
use crate::domains::wallet::models::{to_gateway_string, Amount, Gateway, MoneyInput, UserBalance};
use crate::domains::wallet::services::{CreditResult, GatewayCredit, WalletService};
use crate::shared::clients::YooKassaApi;
use crate::shared::errors::WalletError;

const CURRENCY: &str = "RUB";

/// 입금 생성 결과
#[derive(Debug, Clone)]
pub struct CreatedDeposit {
    pub payment_id: String,
    pub confirmation_url: Option<String>,
}

/// 결제 확인 결과
#[derive(Debug, Clone)]
pub struct CheckedPayment {
    pub balance: UserBalance,
    pub status: String,
    pub duplicate: bool,
}

/// YooKassa 입금 서비스
#[derive(Clone)]
pub struct YooKassaService {
    api: Arc<dyn YooKassaApi>,
    wallet: WalletService,
    receipts: CloudKassirService,
    return_url: String,
}

impl YooKassaService {
    pub fn new(
        api: Arc<dyn YooKassaApi>,
        wallet: WalletService,
        receipts: CloudKassirService,
        return_url: String,
    ) -> Self {
        Self {
            api,
            wallet,
            receipts,
            return_url,
        }
    }

    /// 입금 결제 생성 (redirect confirmation)
    pub async fn create_deposit(
        &self,
        user_id: u64,
        input: &MoneyInput,
    ) -> Result<CreatedDeposit, WalletError> {
        let amount = Amount::parse(input)?.value();
        self.wallet.get_balance(user_id).await?;

        let body = CreatePaymentBody {
            amount: YooKassaAmount {
                value: to_gateway_string(amount),
                currency: CURRENCY.to_string(),
            },
            capture: true,
            confirmation: YooKassaConfirmation {
                kind: "redirect".to_string(),
                return_url: Some(self.return_url.clone()),
                confirmation_url: None,
            },
            description: format!("Wallet deposit for user {}", user_id),
            metadata: HashMap::from([("userId".to_string(), user_id.to_string())]),
        };

        let payment = self
            .api
            .create_payment(&body, &Uuid::new_v4().to_string())
            .await?;

        tracing::info!(user_id, %amount, payment_id = %payment.id, "YooKassa deposit created");
        Ok(CreatedDeposit {
            confirmation_url: payment.confirmation.and_then(|c| c.confirmation_url),
            payment_id: payment.id,
        })
    }

    /// 웹훅 처리
    /// Returns true when the delivery was a duplicate
    pub async fn handle_webhook(&self, webhook: YooKassaWebhook) -> Result<bool, WalletError> {
        if webhook.event != EVENT_PAYMENT_SUCCEEDED || !webhook.object.is_succeeded() {
            tracing::debug!(
                event = %webhook.event,
                payment_id = %webhook.object.id,
                status = %webhook.object.status,
                "YooKassa webhook ignored"
            );
            return Ok(false);
        }

        let user_id = webhook.object.metadata_user_id().ok_or_else(|| {
            WalletError::InvalidInput("Missing or invalid metadata.userId".to_string())
        })?;

        let result = self.credit(user_id, &webhook.object).await?;
        Ok(matches!(result, CreditResult::Duplicate))
    }

    /// 결제 상태 직접 확인 (웹훅 지연 시)
    pub async fn check_payment(
        &self,
        user_id: u64,
        payment_id: &str,
    ) -> Result<CheckedPayment, WalletError> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() {
            return Err(WalletError::InvalidInput("paymentId is required".to_string()));
        }

        let payment = self.api.get_payment(payment_id).await?;
        if payment.metadata_user_id() != Some(user_id) {
            return Err(WalletError::forbidden("Payment belongs to another user"));
        }

        let duplicate = if payment.is_succeeded() {
            matches!(self.credit(user_id, &payment).await?, CreditResult::Duplicate)
        } else {
            false
        };

        let balance = self.wallet.get_balance(user_id).await?;
        Ok(CheckedPayment {
            balance,
            status: payment.status,
            duplicate,
        })
    }

    async fn credit(&self, user_id: u64, payment: &YooKassaPayment) -> Result<CreditResult, WalletError> {
        if payment.amount.currency != CURRENCY {
            return Err(WalletError::InvalidInput(format!(
                "Unsupported currency: {}",
                payment.amount.currency
            )));
        }
        let amount = Amount::parse(&MoneyInput::Text(payment.amount.value.clone()))?.value();

        let result = self
            .wallet
            .credit_gateway_deposit(GatewayCredit {
                user_id,
                amount,
                gateway: Gateway::YooKassa,
                gateway_payment_id: payment.id.clone(),
                reason: format!("YooKassa deposit {}", payment.id),
                deal_id: None,
                extra_ops: Vec::new(),
            })
            .await?;

        if let CreditResult::Credited(outcome) = &result {
            if let Some(entry) = outcome.entries.first() {
                self.receipts.request_receipt(entry).await;
            }
        }

        Ok(result)
    }
}
