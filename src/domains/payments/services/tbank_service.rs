use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use crate::domains::payments::models::{
    DealStatus, NewTBankPayment, NewTBankPayout, PayoutStatus, TBankNotification,
    TBankPaymentStatus, TBankPayout,
};
use crate::domains::payments::services::CloudKassirService;
use crate::domains::wallet::models::{
    from_minor_units, Amount, BalanceChange, EntryKind, Gateway, MoneyInput, NewLedgerEntry,
    UserBalance,
};
use crate::domains::wallet::services::{CreditResult, GatewayCredit, WalletService};
use crate::shared::clients::{verify_notification_token, TBankApi, TBankInitRequest, TBankPayoutCall};
use crate::shared::database::{LedgerOp, LedgerPlan, LedgerStore};
use crate::shared::errors::WalletError;

// =====================================================
// T-Bank 멀티 정산 서비스
// =====================================================
// 입금: OPEN 딜 재사용/생성 → NEW 결제 기록 → Init → PaymentURL
// 알림: Token 검증 → OrderId 상관 → CONFIRMED면 1회 반영
//       (딜이 이미 CLOSED여도 잔고 반영, 딜에는 누적만)
// 지급 (낙관적 동결):
//   1. Freeze + 딜 예약 + 지급 기록(pending) [트랜잭션 1]
//   2. T-Bank 지급 API 호출
//   3a. 실패: Unfreeze + 딜 예약 해제 + 지급 failed [트랜잭션 2]
//   3b. 성공: SettleFrozen + payout 기록
//       + 예약분 차감 (is_final이면 CLOSED) + 지급 completed [트랜잭션 2]
// =====================================================

/// 입금 시작 결과
#[derive(Debug, Clone)]
pub struct InitiatedDeposit {
    pub order_id: String,
    pub payment_url: String,
}

/// 지급 결과
#[derive(Debug, Clone)]
pub struct CompletedPayout {
    pub balance: UserBalance,
    pub payout: TBankPayout,
}

#[derive(Clone)]
pub struct TBankService {
    api: Arc<dyn TBankApi>,
    store: Arc<dyn LedgerStore>,
    wallet: WalletService,
    receipts: CloudKassirService,
    password: String,
}

impl TBankService {
    pub fn new(
        api: Arc<dyn TBankApi>,
        store: Arc<dyn LedgerStore>,
        wallet: WalletService,
        receipts: CloudKassirService,
        password: String,
    ) -> Self {
        Self {
            api,
            store,
            wallet,
            receipts,
            password,
        }
    }

    /// 입금 시작
    pub async fn init_deposit(
        &self,
        user_id: u64,
        input: &MoneyInput,
    ) -> Result<InitiatedDeposit, WalletError> {
        let amount = Amount::parse(input)?.value();
        self.wallet.get_balance(user_id).await?;

        let deal = self.store.open_or_create_deal(user_id).await?;
        let order_id = Uuid::new_v4().to_string();
        self.store
            .create_tbank_payment(NewTBankPayment {
                order_id: order_id.clone(),
                user_id,
                deal_row_id: deal.id,
                amount,
            })
            .await?;

        let init = self
            .api
            .init(TBankInitRequest {
                order_id: order_id.clone(),
                amount,
                description: format!("Wallet deposit for user {}", user_id),
                sp_accumulation_id: deal.deal_id.clone(),
            })
            .await?;
        self.store.set_tbank_payment_id(&order_id, &init.payment_id).await?;

        tracing::info!(
            user_id,
            %amount,
            order_id = %order_id,
            deal_row_id = deal.id,
            payment_id = %init.payment_id,
            "T-Bank deposit initiated"
        );
        Ok(InitiatedDeposit {
            order_id,
            payment_url: init.payment_url,
        })
    }

    /// 알림 처리 (성공 시 "OK" 응답)
    pub async fn handle_notification(&self, body: Value) -> Result<(), WalletError> {
        if !verify_notification_token(&body, &self.password) {
            tracing::warn!("T-Bank notification with invalid token");
            return Err(WalletError::forbidden("Invalid notification token"));
        }

        let notification: TBankNotification = serde_json::from_value(body)
            .map_err(|e| WalletError::InvalidInput(format!("Invalid T-Bank notification: {}", e)))?;

        let payment = self
            .store
            .find_tbank_payment(&notification.order_id)
            .await?
            .ok_or_else(|| WalletError::not_found("T-Bank payment", &notification.order_id))?;

        let status: TBankPaymentStatus = match notification.status.parse() {
            Ok(status) => status,
            Err(_) => {
                // AUTHORIZED 등 중간 상태
                tracing::debug!(
                    order_id = %notification.order_id,
                    status = %notification.status,
                    "T-Bank intermediate status ignored"
                );
                return Ok(());
            }
        };

        match status {
            TBankPaymentStatus::Confirmed if notification.success => {
                if payment.status == TBankPaymentStatus::Confirmed {
                    tracing::info!(order_id = %payment.order_id, "duplicate T-Bank confirmation ignored");
                    return Ok(());
                }

                let amount = from_minor_units(notification.amount);
                if amount != payment.amount {
                    tracing::warn!(
                        order_id = %payment.order_id,
                        expected = %payment.amount,
                        received = %amount,
                        "T-Bank confirmed amount differs from initiated amount"
                    );
                }

                let payment_id = notification
                    .payment_id_string()
                    .or_else(|| payment.payment_id.clone())
                    .ok_or_else(|| WalletError::InvalidInput("Missing PaymentId".to_string()))?;
                let deal_id = notification.sp_accumulation_id_string();

                let result = self
                    .wallet
                    .credit_gateway_deposit(GatewayCredit {
                        user_id: payment.user_id,
                        amount,
                        gateway: Gateway::TBank,
                        gateway_payment_id: payment_id.clone(),
                        reason: format!("T-Bank deposit {}", payment_id),
                        deal_id: deal_id.clone(),
                        extra_ops: vec![
                            LedgerOp::UpdateTBankPayment {
                                order_id: payment.order_id.clone(),
                                expected: payment.status,
                                status: TBankPaymentStatus::Confirmed,
                                payment_id: Some(payment_id.clone()),
                            },
                            LedgerOp::RecordDealPayment {
                                deal_row_id: payment.deal_row_id,
                                amount,
                                deal_id,
                            },
                        ],
                    })
                    .await?;

                if let CreditResult::Credited(outcome) = &result {
                    if let Some(deal) = outcome.deal.as_ref().filter(|d| d.status == DealStatus::Closed) {
                        tracing::warn!(
                            order_id = %payment.order_id,
                            deal_row_id = deal.id,
                            %amount,
                            "T-Bank confirmation arrived after deal closed, credited without payout capacity"
                        );
                    }
                    if let Some(entry) = outcome.entries.first() {
                        self.receipts.request_receipt(entry).await;
                    }
                }
                Ok(())
            }
            TBankPaymentStatus::Rejected | TBankPaymentStatus::Canceled => {
                if payment.status.is_terminal() {
                    return Ok(());
                }
                self.store
                    .execute(LedgerPlan::new().push(LedgerOp::UpdateTBankPayment {
                        order_id: payment.order_id.clone(),
                        expected: payment.status,
                        status,
                        payment_id: notification.payment_id_string(),
                    }))
                    .await?;
                tracing::info!(
                    order_id = %payment.order_id,
                    status = %status,
                    error_code = ?notification.error_code,
                    "T-Bank payment not completed"
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// 딜에서 사용자 카드로 지급
    pub async fn payout(
        &self,
        user_id: u64,
        input: &MoneyInput,
        is_final: bool,
        card_id: Option<String>,
    ) -> Result<CompletedPayout, WalletError> {
        let amount = Amount::parse(input)?.value();

        let deal = self
            .store
            .open_deal_for_user(user_id)
            .await?
            .ok_or_else(|| WalletError::not_found("Open T-Bank deal for user", user_id))?;
        let deal_id = deal.deal_id.clone().ok_or_else(|| {
            WalletError::Conflict(format!("T-Bank deal {} has no confirmed payments yet", deal.id))
        })?;
        // 빠른 거절, 최종 판정은 ReserveDealPayout
        if deal.available_for_payout() < amount {
            return Err(WalletError::InsufficientFunds {
                available: deal.available_for_payout(),
                required: amount,
            });
        }

        // 1. 낙관적 동결 + 딜 예약 + pending 지급
        let reserved = self
            .store
            .execute(
                LedgerPlan::new()
                    .balance(user_id, BalanceChange::Freeze(amount))
                    .push(LedgerOp::ReserveDealPayout {
                        deal_row_id: deal.id,
                        amount,
                    })
                    .push(LedgerOp::CreatePayout(NewTBankPayout {
                        user_id,
                        deal_row_id: deal.id,
                        amount,
                        is_final,
                    })),
            )
            .await?;
        let pending = reserved
            .payout
            .ok_or_else(|| WalletError::Internal("payout missing from plan outcome".to_string()))?;

        // 2. 외부 지급
        let call = TBankPayoutCall {
            order_id: format!("payout-{}", pending.id),
            deal_id: deal_id.clone(),
            amount,
            card_id,
            is_final,
        };
        let result = match self.api.payout(call).await {
            Ok(result) => result,
            Err(gateway_error) => {
                // 3a. 롤백
                tracing::warn!(
                    user_id,
                    payout_id = pending.id,
                    %amount,
                    error = %gateway_error,
                    "T-Bank payout failed, releasing frozen funds"
                );
                let rollback = LedgerPlan::new()
                    .balance(user_id, BalanceChange::Unfreeze(amount))
                    .push(LedgerOp::ReleaseDealPayout {
                        deal_row_id: deal.id,
                        amount,
                    })
                    .push(LedgerOp::FinishPayout {
                        payout_id: pending.id,
                        status: PayoutStatus::Failed,
                        gateway_payout_id: None,
                        error_message: Some(gateway_error.to_string()),
                    });
                if let Err(e) = self.store.execute(rollback).await {
                    tracing::error!(
                        user_id,
                        payout_id = pending.id,
                        %amount,
                        error = %e,
                        "failed to release frozen funds after payout failure"
                    );
                }
                return Err(gateway_error);
            }
        };

        // 3b. 확정
        let settle = LedgerPlan::new()
            .balance(user_id, BalanceChange::SettleFrozen(amount))
            .record(
                NewLedgerEntry::new(Some(user_id), -amount, EntryKind::Payout, "T-Bank payout")
                    .with_gateway(Gateway::TBank, result.gateway_payout_id.clone())
                    .with_deal(Some(deal_id))
                    .with_status(PayoutStatus::Completed.as_str()),
            )
            .push(LedgerOp::RecordDealPayout {
                deal_row_id: deal.id,
                amount,
                is_final,
            })
            .push(LedgerOp::FinishPayout {
                payout_id: pending.id,
                status: PayoutStatus::Completed,
                gateway_payout_id: Some(result.gateway_payout_id.clone()),
                error_message: None,
            });

        let outcome = self.store.execute(settle).await.map_err(|e| {
            // 돈은 이미 나갔음: 수동 정산 필요
            tracing::error!(
                user_id,
                payout_id = pending.id,
                gateway_payout_id = %result.gateway_payout_id,
                %amount,
                error = %e,
                "T-Bank payout sent but settlement failed"
            );
            e
        })?;

        let balance = outcome.balance_of(user_id)?.clone();
        let payout = outcome
            .payout
            .ok_or_else(|| WalletError::Internal("payout missing from plan outcome".to_string()))?;

        tracing::info!(
            user_id,
            payout_id = payout.id,
            %amount,
            is_final,
            balance = %balance.balance,
            "T-Bank payout completed"
        );
        Ok(CompletedPayout { balance, payout })
    }
}
