use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

// =====================================================
// LedgerEntry 모델 (금전 원장)
// =====================================================
// 역할: 실제 잔고 증감만 기록하는 불변 원장 (ledger_entries 테이블)
//
// 규칙:
// - amount는 부호 있는 금액 (음수: 차감, 양수: 입금)
// - 0원 기록 없음 (동결/해제는 escrow_reservations에 기록)
// - 생성 이후 receipt_id 외에는 수정 불가
// - (gateway, gateway_payment_id)는 유일 (웹훅 중복 처리 방지)
// =====================================================

/// 원장 기록 종류
/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// 게이트웨이 입금
    Deposit,
    /// 출금
    Withdraw,
    /// 작업 완료 시 고객 에스크로 지급
    Payment,
    /// 플랫폼 수수료
    Commission,
    /// 실행자 수령액 / T-Bank 외부 지급
    Payout,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::Payment => "payment",
            EntryKind::Commission => "commission",
            EntryKind::Payout => "payout",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(EntryKind::Deposit),
            "withdraw" => Ok(EntryKind::Withdraw),
            "payment" => Ok(EntryKind::Payment),
            "commission" => Ok(EntryKind::Commission),
            "payout" => Ok(EntryKind::Payout),
            other => Err(format!("unknown ledger entry kind: {}", other)),
        }
    }
}

/// 외부 결제 게이트웨이
/// External payment gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    YooKassa,
    TBank,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::YooKassa => "yookassa",
            Gateway::TBank => "tbank",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gateway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yookassa" => Ok(Gateway::YooKassa),
            "tbank" => Ok(Gateway::TBank),
            other => Err(format!("unknown gateway: {}", other)),
        }
    }
}

/// 원장 기록 (DB 조회용)
/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(as = LedgerEntry)]
pub struct LedgerEntry {
    /// Entry ID (BIGSERIAL)
    pub id: u64,

    /// 소유 사용자 (플랫폼 수수료는 None)
    /// Owning user, None for platform commission
    pub user_id: Option<u64>,

    /// Signed amount
    /// 부호 있는 금액
    #[schema(value_type = String, example = "-500.00")]
    pub amount: Decimal,

    pub kind: EntryKind,

    /// Human-readable description
    pub reason: String,

    pub gateway: Option<Gateway>,

    /// Gateway correlation key (unique per gateway)
    /// 게이트웨이 결제 ID (게이트웨이별 유일)
    pub gateway_payment_id: Option<String>,

    /// T-Bank deal (SpAccumulationId)
    pub deal_id: Option<String>,

    pub task_id: Option<u64>,

    pub status: Option<String>,

    /// 전자 영수증 ID (CloudKassir, 사후 1회 설정)
    /// Fiscal receipt id, attached once after the fact
    pub receipt_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// 원장 기록 생성 요청 (id/created_at은 저장소에서 부여)
/// New ledger entry (id and created_at assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub user_id: Option<u64>,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub reason: String,
    pub gateway: Option<Gateway>,
    pub gateway_payment_id: Option<String>,
    pub deal_id: Option<String>,
    pub task_id: Option<u64>,
    pub status: Option<String>,
}

impl NewLedgerEntry {
    pub fn new(user_id: Option<u64>, amount: Decimal, kind: EntryKind, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            kind,
            reason: reason.into(),
            gateway: None,
            gateway_payment_id: None,
            deal_id: None,
            task_id: None,
            status: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Gateway, payment_id: impl Into<String>) -> Self {
        self.gateway = Some(gateway);
        self.gateway_payment_id = Some(payment_id.into());
        self
    }

    pub fn with_deal(mut self, deal_id: Option<String>) -> Self {
        self.deal_id = deal_id;
        self
    }

    pub fn with_task(mut self, task_id: u64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// 게이트웨이 상관 키 ("yookassa:abc123")
    /// Correlation key used in duplicate errors
    pub fn correlation_key(&self) -> Option<String> {
        match (&self.gateway, &self.gateway_payment_id) {
            (Some(gateway), Some(id)) => Some(format!("{}:{}", gateway, id)),
            _ => None,
        }
    }

    pub fn into_entry(self, id: u64, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: self.user_id,
            amount: self.amount,
            kind: self.kind,
            reason: self.reason,
            gateway: self.gateway,
            gateway_payment_id: self.gateway_payment_id,
            deal_id: self.deal_id,
            task_id: self.task_id,
            status: self.status,
            receipt_id: None,
            created_at,
        }
    }
}

/// 영수증 연결 결과
/// Outcome of attaching a fiscal receipt id to an entry
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptAttach {
    /// 새로 연결됨
    Attached(LedgerEntry),
    /// 같은 receipt_id가 이미 연결됨
    AlreadyAttached(LedgerEntry),
    /// 다른 receipt_id가 이미 연결됨
    Mismatch { entry: LedgerEntry, existing: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_round_trips_through_db_strings() {
        for kind in [
            EntryKind::Deposit,
            EntryKind::Withdraw,
            EntryKind::Payment,
            EntryKind::Commission,
            EntryKind::Payout,
        ] {
            assert_eq!(kind.as_str().parse::<EntryKind>().unwrap(), kind);
        }
        // 에스크로 동결/환불은 원장이 아니라 예약 기록
        assert!("freeze".parse::<EntryKind>().is_err());
        assert!("refund".parse::<EntryKind>().is_err());
        assert!("cloudkassir".parse::<Gateway>().is_err());
    }

    #[test]
    fn correlation_key_requires_gateway_and_id() {
        let entry = NewLedgerEntry::new(Some(1), Decimal::from(100), EntryKind::Deposit, "deposit")
            .with_gateway(Gateway::YooKassa, "abc123");
        assert_eq!(entry.correlation_key().as_deref(), Some("yookassa:abc123"));

        let plain = NewLedgerEntry::new(Some(1), Decimal::from(-100), EntryKind::Withdraw, "withdraw");
        assert_eq!(plain.correlation_key(), None);
    }
}
