use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use crate::shared::errors::WalletError;

// =====================================================
// UserBalance 모델
// =====================================================
// 역할: 사용자 지갑 잔고 (users 테이블의 balance/frozen_balance)
//
// 잔고 구분:
// - balance: 전체 잔고
// - frozen_balance: 진행 중인 작업에 묶인 금액 (에스크로)
// - available = balance - frozen_balance (출금/신규 에스크로 가능 금액)
//
// 불변식: 0 <= frozen_balance <= balance (모든 커밋 이후)
//
// 예시:
// - balance 2000, 작업 가격 1500으로 실행자 수락
//   → balance: 2000, frozen_balance: 1500, available: 500
// - 작업 완료 시
//   → balance: 500, frozen_balance: 0
// =====================================================

/// 사용자 지갑 잔고
/// User wallet balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = UserBalance)]
pub struct UserBalance {
    /// User ID
    pub user_id: u64,

    /// Total balance
    /// 전체 잔고
    #[schema(value_type = String, example = "2000.00")]
    pub balance: Decimal,

    /// Funds earmarked against active escrows
    /// 에스크로로 묶인 금액
    #[schema(value_type = String, example = "1500.00")]
    pub frozen_balance: Decimal,

    /// Account creation time (anti-fraud account-age heuristic)
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// 잔고 변경 종류
/// A single balance mutation, validated against the locked row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    /// balance += amount
    Credit(Decimal),
    /// balance -= amount (available 확인)
    Debit(Decimal),
    /// frozen += amount (available 확인)
    Freeze(Decimal),
    /// frozen -= amount
    Unfreeze(Decimal),
    /// balance -= amount, frozen -= amount (에스크로에서 지급)
    SettleFrozen(Decimal),
}

impl BalanceChange {
    pub fn amount(&self) -> Decimal {
        match *self {
            BalanceChange::Credit(a)
            | BalanceChange::Debit(a)
            | BalanceChange::Freeze(a)
            | BalanceChange::Unfreeze(a)
            | BalanceChange::SettleFrozen(a) => a,
        }
    }
}

impl UserBalance {
    pub fn new(user_id: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            frozen_balance: Decimal::ZERO,
            created_at,
            updated_at: created_at,
        }
    }

    /// 사용 가능 잔고
    /// Available = balance - frozen_balance
    pub fn available(&self) -> Decimal {
        self.balance - self.frozen_balance
    }

    /// 잔고 변경 적용 (검증 포함)
    /// Apply a change, enforcing the `0 <= frozen <= balance` invariant.
    ///
    /// 저장소 어댑터는 행 잠금 이후 이 함수를 호출합니다.
    /// Store adapters call this on the row they hold locked.
    pub fn apply(&mut self, change: BalanceChange) -> Result<(), WalletError> {
        let amount = change.amount();
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidInput(format!(
                "Balance change amount must be positive, got {}",
                amount
            )));
        }

        match change {
            BalanceChange::Credit(a) => {
                self.balance += a;
            }
            BalanceChange::Debit(a) => {
                self.ensure_available(a)?;
                self.balance -= a;
            }
            BalanceChange::Freeze(a) => {
                self.ensure_available(a)?;
                self.frozen_balance += a;
            }
            BalanceChange::Unfreeze(a) => {
                self.ensure_frozen(a)?;
                self.frozen_balance -= a;
            }
            BalanceChange::SettleFrozen(a) => {
                self.ensure_frozen(a)?;
                self.frozen_balance -= a;
                self.balance -= a;
            }
        }

        if self.frozen_balance < Decimal::ZERO || self.frozen_balance > self.balance {
            return Err(WalletError::Internal(format!(
                "balance invariant violated for user {}: balance={}, frozen={}",
                self.user_id, self.balance, self.frozen_balance
            )));
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_available(&self, required: Decimal) -> Result<(), WalletError> {
        if !super::money::has_enough_balance(self.balance, self.frozen_balance, required) {
            return Err(WalletError::InsufficientFunds {
                available: self.available(),
                required,
            });
        }
        Ok(())
    }

    fn ensure_frozen(&self, required: Decimal) -> Result<(), WalletError> {
        if self.frozen_balance < required {
            return Err(WalletError::Conflict(format!(
                "frozen balance {} is less than {} for user {}",
                self.frozen_balance, required, self.user_id
            )));
        }
        Ok(())
    }
}

/// 잔고 조회 응답
/// Wallet balance response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = BalanceResponse)]
pub struct BalanceResponse {
    #[schema(value_type = String, example = "2000.00")]
    pub balance: Decimal,
    #[schema(value_type = String, example = "1500.00")]
    pub frozen_balance: Decimal,
    #[schema(value_type = String, example = "500.00")]
    pub available: Decimal,
}

impl From<&UserBalance> for BalanceResponse {
    fn from(balance: &UserBalance) -> Self {
        Self {
            balance: balance.balance,
            frozen_balance: balance.frozen_balance,
            available: balance.available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: i64, frozen: i64) -> UserBalance {
        let mut b = UserBalance::new(1, Utc::now());
        b.balance = Decimal::from(balance);
        b.frozen_balance = Decimal::from(frozen);
        b
    }

    #[test]
    fn freeze_moves_available_to_frozen() {
        let mut b = wallet(2000, 0);
        b.apply(BalanceChange::Freeze(Decimal::from(1500))).unwrap();

        assert_eq!(b.balance, Decimal::from(2000));
        assert_eq!(b.frozen_balance, Decimal::from(1500));
        assert_eq!(b.available(), Decimal::from(500));
    }

    #[test]
    fn freeze_rejects_shortfall_with_amounts() {
        let mut b = wallet(2000, 1500);
        let err = b.apply(BalanceChange::Freeze(Decimal::from(600))).unwrap_err();

        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                available: Decimal::from(500),
                required: Decimal::from(600),
            }
        );
        // 실패 시 잔고 불변
        assert_eq!(b.frozen_balance, Decimal::from(1500));
    }

    #[test]
    fn debit_cannot_touch_frozen_funds() {
        let mut b = wallet(1000, 800);
        assert!(matches!(
            b.apply(BalanceChange::Debit(Decimal::from(300))),
            Err(WalletError::InsufficientFunds { .. })
        ));
        b.apply(BalanceChange::Debit(Decimal::from(200))).unwrap();
        assert_eq!(b.balance, Decimal::from(800));
        assert_eq!(b.frozen_balance, Decimal::from(800));
    }

    #[test]
    fn freeze_then_unfreeze_round_trips() {
        let mut b = wallet(1000, 0);
        let before = (b.balance, b.frozen_balance);
        b.apply(BalanceChange::Freeze(Decimal::new(33333, 2))).unwrap();
        b.apply(BalanceChange::Unfreeze(Decimal::new(33333, 2))).unwrap();
        assert_eq!((b.balance, b.frozen_balance), before);
    }

    #[test]
    fn settle_frozen_reduces_both() {
        let mut b = wallet(2000, 1500);
        b.apply(BalanceChange::SettleFrozen(Decimal::from(1500))).unwrap();
        assert_eq!(b.balance, Decimal::from(500));
        assert_eq!(b.frozen_balance, Decimal::ZERO);
    }

    #[test]
    fn unfreeze_more_than_frozen_is_conflict() {
        let mut b = wallet(1000, 100);
        assert!(matches!(
            b.apply(BalanceChange::Unfreeze(Decimal::from(101))),
            Err(WalletError::Conflict(_))
        ));
    }

    #[test]
    fn zero_or_negative_changes_are_rejected() {
        let mut b = wallet(1000, 0);
        assert!(b.apply(BalanceChange::Credit(Decimal::ZERO)).is_err());
        assert!(b.apply(BalanceChange::Credit(Decimal::from(-5))).is_err());
    }
}
