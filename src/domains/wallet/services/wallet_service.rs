use rust_decimal::Decimal;
use std::sync::Arc;
use crate::domains::wallet::models::{
    Amount, BalanceChange, EntryKind, Gateway, LedgerEntry, MoneyInput, NewLedgerEntry, UserBalance,
};
use crate::domains::wallet::services::FraudService;
use crate::shared::database::{LedgerOp, LedgerPlan, LedgerStore, PlanOutcome};
use crate::shared::errors::WalletError;
use crate::shared::services::notifier::{alert_admins_quietly, Notifier};

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 200;

/// 출금 결과
#[derive(Debug, Clone)]
pub struct WithdrawOutcome {
    pub balance: UserBalance,
    pub entry: LedgerEntry,
    pub warnings: Vec<String>,
}

/// 게이트웨이 입금 반영 요청
/// A confirmed gateway payment to credit exactly once
#[derive(Debug, Clone)]
pub struct GatewayCredit {
    pub user_id: u64,
    pub amount: Decimal,
    pub gateway: Gateway,
    pub gateway_payment_id: String,
    pub reason: String,
    pub deal_id: Option<String>,
    /// 같은 트랜잭션에 포함할 추가 op (T-Bank 결제/딜 갱신)
    pub extra_ops: Vec<LedgerOp>,
}

/// 입금 반영 결과
#[derive(Debug, Clone)]
pub enum CreditResult {
    Credited(PlanOutcome),
    /// 이미 반영된 결제 (재전송 웹훅)
    Duplicate,
}

/// 지갑 서비스
/// WalletService: balances, ledger history, withdrawals, deposit credits
#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
    fraud: FraudService,
    notifier: Arc<dyn Notifier>,
}

impl WalletService {
    pub fn new(store: Arc<dyn LedgerStore>, fraud: FraudService, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, fraud, notifier }
    }

    /// 잔고 조회
    pub async fn get_balance(&self, user_id: u64) -> Result<UserBalance, WalletError> {
        self.store
            .get_user_balance(user_id)
            .await?
            .ok_or_else(|| WalletError::not_found("User", user_id))
    }

    /// 원장 내역 (최신순)
    pub async fn list_transactions(
        &self,
        user_id: u64,
        limit: Option<u32>,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        self.store.list_entries_for_user(user_id, limit).await
    }

    /// 출금 파이프라인
    /// Withdrawal pipeline:
    /// (a) 금액 파싱
    /// (b) 이상거래 게이트 (차단 / 경고)
    /// (c) 신규 계정 고액 출금 관리자 알림 (차단 안 함)
    /// (d) 잠긴 행에서 잔고 재확인
    /// (e) 차감 + withdraw 기록 (한 트랜잭션)
    /// (f) 감사 로그
    pub async fn withdraw(
        &self,
        user_id: u64,
        input: &MoneyInput,
    ) -> Result<WithdrawOutcome, WalletError> {
        // (a)
        let amount = Amount::parse(input)?.value();

        // (b)
        let user = self.get_balance(user_id).await?;
        let verdict = self.fraud.check_withdrawal(&user, amount).await?;
        if let Some(reason) = verdict.blocked {
            tracing::warn!(user_id, %amount, %reason, "withdrawal blocked by anti-fraud gate");
            return Err(WalletError::WithdrawalBlocked { reason });
        }
        for warning in &verdict.warnings {
            tracing::warn!(user_id, %amount, warning = %warning, "withdrawal anti-fraud warning");
        }

        // (c)
        if verdict.alert_admins {
            let message = format!(
                "Large withdrawal of {} requested by new account {}",
                amount, user_id
            );
            alert_admins_quietly(self.notifier.as_ref(), &message).await;
        }

        // (d) + (e)
        let plan = LedgerPlan::new()
            .balance(user_id, BalanceChange::Debit(amount))
            .record(NewLedgerEntry::new(
                Some(user_id),
                -amount,
                EntryKind::Withdraw,
                "Withdrawal",
            ));
        let outcome = self.store.execute(plan).await.inspect_err(|e| {
            tracing::info!(user_id, %amount, error = %e, "withdrawal rejected");
        })?;

        let balance = outcome.balance_of(user_id)?.clone();
        let entry = outcome
            .entries
            .first()
            .cloned()
            .ok_or_else(|| WalletError::Internal("withdrawal entry missing".to_string()))?;

        // (f)
        tracing::info!(
            user_id,
            %amount,
            entry_id = entry.id,
            balance = %balance.balance,
            "withdrawal completed"
        );

        Ok(WithdrawOutcome {
            balance,
            entry,
            warnings: verdict.warnings,
        })
    }

    /// 게이트웨이 입금 반영 (멱등)
    /// Credit a gateway payment once; redeliveries come back as Duplicate
    pub async fn credit_gateway_deposit(
        &self,
        credit: GatewayCredit,
    ) -> Result<CreditResult, WalletError> {
        // 1. 상관 키 직접 조회
        if self
            .store
            .find_entry_by_gateway(credit.gateway, &credit.gateway_payment_id)
            .await?
            .is_some()
        {
            tracing::info!(
                gateway = %credit.gateway,
                payment_id = %credit.gateway_payment_id,
                "duplicate gateway payment ignored"
            );
            return Ok(CreditResult::Duplicate);
        }

        let amount = Amount::from_decimal(credit.amount)?.value();

        // 2. 잔고 증가 + 입금 기록 (+ 추가 op) 한 트랜잭션
        let mut plan = LedgerPlan::new()
            .balance(credit.user_id, BalanceChange::Credit(amount))
            .record(
                NewLedgerEntry::new(Some(credit.user_id), amount, EntryKind::Deposit, credit.reason)
                    .with_gateway(credit.gateway, credit.gateway_payment_id.clone())
                    .with_deal(credit.deal_id)
                    .with_status("succeeded"),
            );
        for op in credit.extra_ops {
            plan = plan.push(op);
        }

        // 3. 동시 전달은 유니크 인덱스가 막음
        match self.store.execute(plan).await {
            Ok(outcome) => {
                tracing::info!(
                    user_id = credit.user_id,
                    %amount,
                    gateway = %credit.gateway,
                    payment_id = %credit.gateway_payment_id,
                    "gateway deposit credited"
                );
                Ok(CreditResult::Credited(outcome))
            }
            Err(WalletError::Duplicate { key }) => {
                tracing::info!(%key, "concurrent duplicate gateway payment ignored");
                Ok(CreditResult::Duplicate)
            }
            Err(e) => Err(e),
        }
    }
}
