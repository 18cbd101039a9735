use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use crate::shared::errors::WalletError;

// =====================================================
// T-Bank 멀티 정산 (Multi-settlement) 모델
// =====================================================
// 역할: T-Bank 딜/결제/지급 기록
//
// 흐름:
// - 사용자의 OPEN 딜에 결제(입금)가 누적됨 (SpAccumulationId)
// - 지급(payout) 요청 시 reserved_amount에 먼저 예약
// - 지급 성공 시 예약분이 paid_amount로 이동, 실패 시 예약 해제
// - is_final 지급 완료 시 딜은 CLOSED
// - CLOSED 이후 도착한 결제 확인도 누적 (재오픈 없음, 지급 불가)
//
// remaining_balance = total_amount - paid_amount
// 지급 가능 금액 = remaining_balance - reserved_amount
// =====================================================

/// 딜 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DealStatus {
    Open,
    Closed,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Open => "OPEN",
            DealStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(DealStatus::Open),
            "CLOSED" => Ok(DealStatus::Closed),
            other => Err(format!("unknown deal status: {}", other)),
        }
    }
}

/// T-Bank 딜 (한 번의 자금 순환)
/// One multi-settlement deal per funding cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TBankDeal)]
pub struct TBankDeal {
    pub id: u64,
    pub user_id: u64,

    /// T-Bank SpAccumulationId (첫 결제 확인 후 설정)
    pub deal_id: Option<String>,

    pub status: DealStatus,

    #[schema(value_type = String)]
    pub total_amount: Decimal,
    #[schema(value_type = String)]
    pub paid_amount: Decimal,
    #[schema(value_type = String)]
    pub remaining_balance: Decimal,
    /// 진행 중 지급 예약분
    #[schema(value_type = String)]
    pub reserved_amount: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TBankDeal {
    /// 확인된 결제를 딜에 누적
    /// A confirmed payment is always recorded. On a closed deal it only raises the
    /// totals and the accumulation id stays as it was.
    pub fn record_payment(&mut self, amount: Decimal, deal_id: Option<&str>) -> Result<(), WalletError> {
        if let (Some(deal_id), DealStatus::Open) = (deal_id, self.status) {
            match &self.deal_id {
                Some(existing) if existing != deal_id => {
                    return Err(WalletError::Conflict(format!(
                        "T-Bank deal {} already bound to {}, got {}",
                        self.id, existing, deal_id
                    )));
                }
                _ => self.deal_id = Some(deal_id.to_string()),
            }
        }
        self.total_amount += amount;
        self.remaining_balance = self.total_amount - self.paid_amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn available_for_payout(&self) -> Decimal {
        self.remaining_balance - self.reserved_amount
    }

    /// 지급 예약 (게이트웨이 호출 전)
    pub fn reserve_payout(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if self.status == DealStatus::Closed {
            return Err(WalletError::Conflict(format!("T-Bank deal {} is closed", self.id)));
        }
        let available = self.available_for_payout();
        if amount > available {
            return Err(WalletError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        self.reserved_amount += amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn release_payout(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount > self.reserved_amount {
            return Err(WalletError::Conflict(format!(
                "T-Bank deal {} has {} reserved, cannot release {}",
                self.id, self.reserved_amount, amount
            )));
        }
        self.reserved_amount -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 예약된 지급 확정
    /// The gateway already moved the money, so a deal closed by a concurrent
    /// final payout still settles.
    pub fn record_payout(&mut self, amount: Decimal, is_final: bool) -> Result<(), WalletError> {
        if amount > self.reserved_amount {
            return Err(WalletError::Conflict(format!(
                "T-Bank deal {} has no reservation for payout of {}",
                self.id, amount
            )));
        }
        self.reserved_amount -= amount;
        self.paid_amount += amount;
        self.remaining_balance = self.total_amount - self.paid_amount;
        if is_final {
            self.status = DealStatus::Closed;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// 결제 상태 (T-Bank Status 중 원장에 의미 있는 값)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TBankPaymentStatus {
    New,
    Confirmed,
    Rejected,
    Canceled,
}

impl TBankPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TBankPaymentStatus::New => "NEW",
            TBankPaymentStatus::Confirmed => "CONFIRMED",
            TBankPaymentStatus::Rejected => "REJECTED",
            TBankPaymentStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TBankPaymentStatus::New)
    }
}

impl fmt::Display for TBankPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TBankPaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TBankPaymentStatus::New),
            "CONFIRMED" => Ok(TBankPaymentStatus::Confirmed),
            "REJECTED" => Ok(TBankPaymentStatus::Rejected),
            "CANCELED" | "CANCELLED" => Ok(TBankPaymentStatus::Canceled),
            other => Err(format!("unknown T-Bank payment status: {}", other)),
        }
    }
}

/// T-Bank 입금 결제 (OrderId로 상관)
/// Inbound payment correlated by OrderId
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TBankPayment)]
pub struct TBankPayment {
    pub id: u64,
    pub order_id: String,
    pub user_id: u64,
    pub deal_row_id: u64,

    /// T-Bank PaymentId (Init 응답 이후 설정)
    pub payment_id: Option<String>,

    #[schema(value_type = String)]
    pub amount: Decimal,

    pub status: TBankPaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTBankPayment {
    pub order_id: String,
    pub user_id: u64,
    pub deal_row_id: u64,
    pub amount: Decimal,
}

/// 지급 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "completed" => Ok(PayoutStatus::Completed),
            "failed" => Ok(PayoutStatus::Failed),
            other => Err(format!("unknown payout status: {}", other)),
        }
    }
}

/// T-Bank 지급 (외부 출금)
/// Outbound payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TBankPayout)]
pub struct TBankPayout {
    pub id: u64,
    pub user_id: u64,
    pub deal_row_id: u64,

    #[schema(value_type = String)]
    pub amount: Decimal,

    pub status: PayoutStatus,

    /// 딜을 닫는 최종 지급인지
    pub is_final: bool,

    pub gateway_payout_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTBankPayout {
    pub user_id: u64,
    pub deal_row_id: u64,
    pub amount: Decimal,
    pub is_final: bool,
}

impl NewTBankPayout {
    pub fn into_payout(self, id: u64, now: DateTime<Utc>) -> TBankPayout {
        TBankPayout {
            id,
            user_id: self.user_id,
            deal_row_id: self.deal_row_id,
            amount: self.amount,
            status: PayoutStatus::Pending,
            is_final: self.is_final,
            gateway_payout_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// T-Bank 알림 (콜백) 본문
/// Notification body posted by T-Bank
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
#[schema(as = TBankNotification)]
pub struct TBankNotification {
    pub terminal_key: String,
    pub order_id: String,
    pub success: bool,
    pub status: String,

    /// T-Bank는 숫자로 보냄
    #[schema(value_type = String)]
    pub payment_id: serde_json::Value,

    /// 금액 (kopecks)
    pub amount: i64,

    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub sp_accumulation_id: Option<serde_json::Value>,

    pub token: String,
}

impl TBankNotification {
    pub fn payment_id_string(&self) -> Option<String> {
        json_scalar_to_string(&self.payment_id)
    }

    pub fn sp_accumulation_id_string(&self) -> Option<String> {
        self.sp_accumulation_id.as_ref().and_then(json_scalar_to_string)
    }
}

pub fn json_scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
