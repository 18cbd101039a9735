use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use crate::domains::wallet::models::UserBalance;
use crate::shared::config::FraudConfig;
use crate::shared::database::{LedgerStore, ReciprocalDeals};
use crate::shared::errors::WalletError;

// =====================================================
// 이상거래 탐지 (출금 전 게이트)
// =====================================================
// 규칙:
// 1. 순환 거래: 같은 상대와 양방향으로 완료한 작업
//    - 상대 한 명과 circular_deal_block건 이상 → 차단
//    - 1건 이상 → 경고
// 2. 신규 계정: min_account_age_hours 미만 + new_account_limit 초과 → 차단
// 3. 관리자 알림: alert_account_age_days 미만 + large_withdrawal_alert 이상
//    (차단하지 않음)
// =====================================================

/// 이상거래 판정 결과
/// Anti-fraud verdict for one withdrawal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FraudVerdict {
    /// Some이면 출금 차단
    pub blocked: Option<String>,
    /// 차단하지 않는 경고
    pub warnings: Vec<String>,
    pub alert_admins: bool,
}

impl FraudVerdict {
    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }
}

/// 순수 판정 함수
/// Evaluate the rules against already-loaded facts
pub fn evaluate_withdrawal(
    config: &FraudConfig,
    account_created_at: DateTime<Utc>,
    amount: Decimal,
    reciprocal: &[ReciprocalDeals],
    now: DateTime<Utc>,
) -> FraudVerdict {
    let mut verdict = FraudVerdict::default();
    let account_age = now - account_created_at;

    for deal in reciprocal {
        if deal.completed_tasks >= config.circular_deal_block {
            verdict.blocked.get_or_insert_with(|| {
                format!(
                    "circular deals with user {} ({} completed tasks in {} days)",
                    deal.counterparty_id, deal.completed_tasks, config.circular_window_days
                )
            });
        } else {
            verdict.warnings.push(format!(
                "reciprocal deals with user {} ({} completed tasks)",
                deal.counterparty_id, deal.completed_tasks
            ));
        }
    }

    if account_age < Duration::hours(config.min_account_age_hours)
        && amount > config.new_account_limit
    {
        verdict.blocked.get_or_insert_with(|| {
            format!(
                "account younger than {} hours cannot withdraw more than {}",
                config.min_account_age_hours, config.new_account_limit
            )
        });
    }

    if account_age < Duration::days(config.alert_account_age_days)
        && amount >= config.large_withdrawal_alert
    {
        verdict.alert_admins = true;
    }

    verdict
}

/// 이상거래 탐지 서비스
#[derive(Clone)]
pub struct FraudService {
    store: Arc<dyn LedgerStore>,
    config: FraudConfig,
}

impl FraudService {
    pub fn new(store: Arc<dyn LedgerStore>, config: FraudConfig) -> Self {
        Self { store, config }
    }

    pub async fn check_withdrawal(
        &self,
        user: &UserBalance,
        amount: Decimal,
    ) -> Result<FraudVerdict, WalletError> {
        let now = Utc::now();
        let since = now - Duration::days(self.config.circular_window_days);
        let reciprocal = self.store.reciprocal_deals(user.user_id, since).await?;

        Ok(evaluate_withdrawal(&self.config, user.created_at, amount, &reciprocal, now))
    }
}
