use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use crate::shared::errors::WalletError;

// =====================================================
// EscrowReservation 모델
// =====================================================
// 역할: 작업별 에스크로 예약 기록 (escrow_reservations 테이블)
//
// 금전 원장(ledger_entries)과 분리된 상태 기록:
// - 동결 시 예약 생성 (released_at = NULL)
// - 환불/지급 시 release_kind, released_at 설정
// - 작업당 열린 예약은 최대 1개
// =====================================================

/// 예약 해제 종류
/// How an escrow reservation was released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    /// 고객에게 환불 (frozen만 감소)
    Refund,
    /// 실행자에게 지급 (balance, frozen 모두 감소)
    PaidOut,
}

impl ReleaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseKind::Refund => "refund",
            ReleaseKind::PaidOut => "paid_out",
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refund" => Ok(ReleaseKind::Refund),
            "paid_out" => Ok(ReleaseKind::PaidOut),
            other => Err(format!("unknown release kind: {}", other)),
        }
    }
}

/// 에스크로 예약
/// Escrow reservation, joined to its task by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = EscrowReservation)]
pub struct EscrowReservation {
    pub id: u64,
    pub task_id: u64,
    pub customer_id: u64,

    #[schema(value_type = String, example = "1500.00")]
    pub amount: Decimal,

    /// 동결 사유
    pub reason: String,

    pub release_kind: Option<ReleaseKind>,
    pub release_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl EscrowReservation {
    pub fn is_open(&self) -> bool {
        self.released_at.is_none()
    }

    /// 예약 해제 (한 번만 가능)
    /// Release the reservation; a second release is a conflict
    pub fn release(
        &mut self,
        kind: ReleaseKind,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        if !self.is_open() {
            return Err(WalletError::Conflict(format!(
                "Escrow reservation {} for task {} is already released",
                self.id, self.task_id
            )));
        }
        self.release_kind = Some(kind);
        self.release_reason = Some(reason);
        self.released_at = Some(now);
        Ok(())
    }
}

/// 새 예약
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub task_id: u64,
    pub customer_id: u64,
    pub amount: Decimal,
    pub reason: String,
}

impl NewReservation {
    pub fn into_reservation(self, id: u64, created_at: DateTime<Utc>) -> EscrowReservation {
        EscrowReservation {
            id,
            task_id: self.task_id,
            customer_id: self.customer_id,
            amount: self.amount,
            reason: self.reason,
            release_kind: None,
            release_reason: None,
            created_at,
            released_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_happens_once() {
        let mut r = NewReservation {
            task_id: 3,
            customer_id: 1,
            amount: Decimal::from(1500),
            reason: "Escrow for task 3".to_string(),
        }
        .into_reservation(1, Utc::now());
        assert!(r.is_open());

        r.release(ReleaseKind::Refund, "cancelled".into(), Utc::now()).unwrap();
        assert!(!r.is_open());
        assert_eq!(r.release_kind, Some(ReleaseKind::Refund));

        assert!(matches!(
            r.release(ReleaseKind::PaidOut, "again".into(), Utc::now()),
            Err(WalletError::Conflict(_))
        ));
    }
}
