use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use crate::domains::catalog::models::Category;
use crate::domains::escrow::models::{
    Dispute, DisputeOutcome, EscrowReservation, NewDispute, NewReservation, NewTask, ReleaseKind,
    Task, TaskGuard, TaskPatch,
};
use crate::domains::payments::models::{
    NewTBankPayment, NewTBankPayout, PayoutStatus, TBankDeal, TBankPayment, TBankPaymentStatus,
    TBankPayout,
};
use crate::domains::wallet::models::{
    BalanceChange, Gateway, LedgerEntry, NewLedgerEntry, ReceiptAttach, UserBalance,
};
use crate::shared::errors::WalletError;

// =====================================================
// LedgerStore: 서비스와 저장소 사이의 경계
// =====================================================
// 역할: 잔고를 움직이는 모든 변경은 LedgerPlan 하나로 묶어 실행
//
// 구현체 규칙 (execute):
// 1. 트랜잭션 시작
// 2. plan이 건드리는 사용자 행을 id 순서로 잠금 (SELECT ... FOR UPDATE)
// 3. 잠긴 최신 잔고로 모든 가드 확인 (available, frozen, 작업 상태 등)
// 4. op를 순서대로 적용
// 5. 성공 시 COMMIT, 하나라도 실패하면 전체 ROLLBACK
//
// 구현체:
// - PgLedgerStore: PostgreSQL (운영)
// - MemoryLedgerStore: 메모리 (테스트 / 로컬 실행)
// =====================================================

/// 원자적으로 적용될 단일 변경
/// One mutation inside a plan
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOp {
    /// 사용자 잔고 변경 (잠긴 행에서 검증)
    Balance { user_id: u64, change: BalanceChange },

    /// 원장 기록 추가 (게이트웨이 상관 키 중복 시 Duplicate)
    RecordEntry(NewLedgerEntry),

    /// 에스크로 예약 생성 (작업당 열린 예약 1개)
    OpenReservation(NewReservation),

    /// 작업의 열린 예약 해제
    ReleaseReservation {
        task_id: u64,
        kind: ReleaseKind,
        reason: String,
    },

    /// 작업 CAS 업데이트
    /// Compare-and-set: fails with Conflict unless the locked row still matches `guard`
    UpdateTask {
        task_id: u64,
        guard: TaskGuard,
        patch: TaskPatch,
    },

    /// 열린 분쟁이 있으면 Conflict (UpdateTask 뒤에 두어 작업 행 잠금 아래에서 확인)
    EnsureNoOpenDispute { task_id: u64 },

    /// 분쟁 생성 (작업당 1개)
    OpenDispute(NewDispute),

    ResolveDispute {
        dispute_id: u64,
        outcome: DisputeOutcome,
        resolved_by: u64,
        note: Option<String>,
    },

    /// T-Bank 결제 상태 CAS 업데이트
    UpdateTBankPayment {
        order_id: String,
        expected: TBankPaymentStatus,
        status: TBankPaymentStatus,
        payment_id: Option<String>,
    },

    /// 확인된 입금을 딜에 누적
    RecordDealPayment {
        deal_row_id: u64,
        amount: Decimal,
        deal_id: Option<String>,
    },

    /// 대기 중 지급 생성
    CreatePayout(NewTBankPayout),

    /// 지급 금액을 딜에 예약 (OPEN, remaining - reserved 이내)
    ReserveDealPayout { deal_row_id: u64, amount: Decimal },

    /// 실패한 지급의 예약 해제
    ReleaseDealPayout { deal_row_id: u64, amount: Decimal },

    /// 예약된 지급을 딜에서 차감 (is_final이면 딜 종료)
    RecordDealPayout {
        deal_row_id: u64,
        amount: Decimal,
        is_final: bool,
    },

    /// 대기 중 지급 종료 (completed / failed)
    FinishPayout {
        payout_id: u64,
        status: PayoutStatus,
        gateway_payout_id: Option<String>,
        error_message: Option<String>,
    },
}

/// 하나의 DB 트랜잭션으로 적용될 op 목록
/// Ordered list of ops applied in one database transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerPlan {
    ops: Vec<LedgerOp>,
}

impl LedgerPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, op: LedgerOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn balance(self, user_id: u64, change: BalanceChange) -> Self {
        self.push(LedgerOp::Balance { user_id, change })
    }

    pub fn record(self, entry: NewLedgerEntry) -> Self {
        self.push(LedgerOp::RecordEntry(entry))
    }

    /// `task`는 plan 계산에 쓴 스냅샷
    pub fn update_task(self, task: &Task, patch: TaskPatch) -> Self {
        self.push(LedgerOp::UpdateTask {
            task_id: task.id,
            guard: TaskGuard::of(task),
            patch,
        })
    }

    pub fn ops(&self) -> &[LedgerOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// 잠가야 할 사용자 ID (정렬, 중복 제거)
    /// User rows to lock, sorted so concurrent plans lock in the same order
    pub fn locked_users(&self) -> Vec<u64> {
        let mut users: Vec<u64> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                LedgerOp::Balance { user_id, .. } => Some(*user_id),
                _ => None,
            })
            .collect();
        users.sort_unstable();
        users.dedup();
        users
    }
}

/// plan 실행 결과
/// What a committed plan produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanOutcome {
    /// 생성된 원장 기록 (plan 순서)
    pub entries: Vec<LedgerEntry>,
    /// 커밋 이후 잔고 (잠긴 사용자)
    pub balances: BTreeMap<u64, UserBalance>,
    pub task: Option<Task>,
    pub reservation: Option<EscrowReservation>,
    pub dispute: Option<Dispute>,
    pub tbank_payment: Option<TBankPayment>,
    pub deal: Option<TBankDeal>,
    pub payout: Option<TBankPayout>,
}

impl PlanOutcome {
    pub fn balance_of(&self, user_id: u64) -> Result<&UserBalance, WalletError> {
        self.balances
            .get(&user_id)
            .ok_or_else(|| WalletError::Internal(format!("plan did not lock user {}", user_id)))
    }

    pub fn task(&self) -> Result<&Task, WalletError> {
        self.task
            .as_ref()
            .ok_or_else(|| WalletError::Internal("plan did not update a task".to_string()))
    }
}

/// 양방향 완료 작업 (이상거래 탐지용)
/// Completed tasks with a counterparty that has worked in both directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReciprocalDeals {
    pub counterparty_id: u64,
    pub completed_tasks: u32,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// plan 전체를 원자적으로 실행
    /// Execute the whole plan atomically
    async fn execute(&self, plan: LedgerPlan) -> Result<PlanOutcome, WalletError>;

    // ----- 잔고 / 원장 조회 -----

    async fn get_user_balance(&self, user_id: u64) -> Result<Option<UserBalance>, WalletError>;

    /// 게이트웨이 결제 ID로 조회 (중복 웹훅 확인)
    async fn find_entry_by_gateway(
        &self,
        gateway: Gateway,
        gateway_payment_id: &str,
    ) -> Result<Option<LedgerEntry>, WalletError>;

    /// 사용자 원장 (최신순)
    async fn list_entries_for_user(
        &self,
        user_id: u64,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, WalletError>;

    async fn list_entries_for_task(&self, task_id: u64) -> Result<Vec<LedgerEntry>, WalletError>;

    /// 영수증 ID 연결 (한 번만)
    async fn attach_receipt(
        &self,
        entry_id: u64,
        receipt_id: &str,
    ) -> Result<ReceiptAttach, WalletError>;

    // ----- 작업 / 에스크로 -----

    async fn create_task(&self, task: NewTask) -> Result<Task, WalletError>;

    async fn get_task(&self, task_id: u64) -> Result<Option<Task>, WalletError>;

    async fn reservations_for_task(
        &self,
        task_id: u64,
    ) -> Result<Vec<EscrowReservation>, WalletError>;

    async fn dispute_for_task(&self, task_id: u64) -> Result<Option<Dispute>, WalletError>;

    async fn get_dispute(&self, dispute_id: u64) -> Result<Option<Dispute>, WalletError>;

    /// since 이후 양방향으로 완료된 작업 수 (상대방별)
    async fn reciprocal_deals(
        &self,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReciprocalDeals>, WalletError>;

    // ----- T-Bank -----

    /// 사용자의 OPEN 딜 조회, 없으면 생성
    async fn open_or_create_deal(&self, user_id: u64) -> Result<TBankDeal, WalletError>;

    /// 지급 가능한 OPEN 딜 조회
    async fn open_deal_for_user(&self, user_id: u64) -> Result<Option<TBankDeal>, WalletError>;

    async fn create_tbank_payment(
        &self,
        payment: NewTBankPayment,
    ) -> Result<TBankPayment, WalletError>;

    async fn set_tbank_payment_id(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<(), WalletError>;

    async fn find_tbank_payment(&self, order_id: &str) -> Result<Option<TBankPayment>, WalletError>;

    // ----- 카탈로그 -----

    async fn list_categories(&self) -> Result<Vec<Category>, WalletError>;
}
