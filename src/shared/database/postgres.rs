use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::BTreeMap;
use crate::domains::catalog::models::Category;
use crate::domains::escrow::models::{Dispute, EscrowReservation, NewTask, Task};
use crate::domains::payments::models::{
    NewTBankPayment, PayoutStatus, TBankDeal, TBankPayment,
};
use crate::domains::wallet::models::{Gateway, LedgerEntry, ReceiptAttach, UserBalance};
use crate::shared::database::connection::Database;
use crate::shared::database::repositories::{
    CategoryRepository, DisputeRepository, LedgerEntryRepository, ReservationRepository,
    TBankRepository, TaskRepository, UserBalanceRepository,
};
use crate::shared::database::store::{
    LedgerOp, LedgerPlan, LedgerStore, PlanOutcome, ReciprocalDeals,
};
use crate::shared::errors::WalletError;

// =====================================================
// PgLedgerStore
// =====================================================
// 역할: PostgreSQL 기반 LedgerStore
//
// execute(plan) 순서:
// 1. BEGIN
// 2. plan이 건드리는 users 행을 id 순서로 SELECT ... FOR UPDATE
// 3. 잠긴 잔고로 op를 순서대로 검증/적용 (UserBalance::apply)
// 4. 작업/예약/분쟁/딜/결제/지급 행은 각 op에서 FOR UPDATE 후 CAS
// 5. 변경된 잔고 저장 후 COMMIT
// 에러 발생 시 트랜잭션은 drop 시점에 ROLLBACK
// =====================================================

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL LedgerStore
#[derive(Clone)]
pub struct PgLedgerStore {
    db: Database,
}

impl PgLedgerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn apply_ops(
        &self,
        conn: &mut PgConnection,
        plan: &LedgerPlan,
    ) -> Result<PlanOutcome, WalletError> {
        // 1. 사용자 행 잠금
        let locked_ids = plan.locked_users();
        let mut users: BTreeMap<u64, UserBalance> = BTreeMap::new();
        if !locked_ids.is_empty() {
            let rows = UserBalanceRepository::lock_many(&mut *conn, &locked_ids)
                .await
                .map_err(db_error)?;
            for user in rows {
                users.insert(user.user_id, user);
            }
            if let Some(missing) = locked_ids.iter().find(|id| !users.contains_key(id)) {
                return Err(WalletError::not_found("User", missing));
            }
        }

        let now = Utc::now();
        let mut outcome = PlanOutcome::default();

        // 2. op 순서대로 적용
        for op in plan.ops() {
            match op {
                LedgerOp::Balance { user_id, change } => {
                    let user = users
                        .get_mut(user_id)
                        .ok_or_else(|| WalletError::not_found("User", user_id))?;
                    user.apply(*change)?;
                }
                LedgerOp::RecordEntry(entry) => {
                    let created = LedgerEntryRepository::insert(&mut *conn, entry)
                        .await
                        .map_err(|e| {
                            if is_unique_violation(&e) {
                                WalletError::Duplicate {
                                    key: entry.correlation_key().unwrap_or_default(),
                                }
                            } else {
                                db_error(e)
                            }
                        })?;
                    outcome.entries.push(created);
                }
                LedgerOp::OpenReservation(reservation) => {
                    let created = ReservationRepository::insert(&mut *conn, reservation)
                        .await
                        .map_err(|e| {
                            if is_unique_violation(&e) {
                                WalletError::Conflict(format!(
                                    "Task {} already has an open escrow reservation",
                                    reservation.task_id
                                ))
                            } else {
                                db_error(e)
                            }
                        })?;
                    outcome.reservation = Some(created);
                }
                LedgerOp::ReleaseReservation { task_id, kind, reason } => {
                    let mut reservation = ReservationRepository::lock_open(&mut *conn, *task_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| {
                            WalletError::Conflict(format!(
                                "Task {} has no open escrow reservation",
                                task_id
                            ))
                        })?;
                    reservation.release(*kind, reason.clone(), now)?;
                    ReservationRepository::save_release(&mut *conn, &reservation)
                        .await
                        .map_err(db_error)?;
                    outcome.reservation = Some(reservation);
                }
                LedgerOp::UpdateTask { task_id, guard, patch } => {
                    let mut task = TaskRepository::lock(&mut *conn, *task_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("Task", task_id))?;
                    guard.check(&task)?;
                    patch.apply_to(&mut task, now);
                    TaskRepository::save(&mut *conn, &task).await.map_err(db_error)?;
                    outcome.task = Some(task);
                }
                LedgerOp::EnsureNoOpenDispute { task_id } => {
                    // 분쟁 생성 plan도 같은 작업 행을 먼저 잠그므로 여기서 보이는 값이 최신
                    let open = DisputeRepository::has_open_for_task(&mut *conn, *task_id)
                        .await
                        .map_err(db_error)?;
                    if open {
                        return Err(WalletError::Conflict(format!(
                            "Task {} has an open dispute",
                            task_id
                        )));
                    }
                }
                LedgerOp::OpenDispute(dispute) => {
                    let created = DisputeRepository::insert(&mut *conn, dispute)
                        .await
                        .map_err(|e| {
                            if is_unique_violation(&e) {
                                WalletError::Conflict(format!(
                                    "Task {} already has a dispute",
                                    dispute.task_id
                                ))
                            } else {
                                db_error(e)
                            }
                        })?;
                    outcome.dispute = Some(created);
                }
                LedgerOp::ResolveDispute { dispute_id, outcome: result, resolved_by, note } => {
                    let mut dispute = DisputeRepository::lock(&mut *conn, *dispute_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("Dispute", dispute_id))?;
                    dispute.resolve(*result, *resolved_by, note.clone(), now)?;
                    DisputeRepository::save(&mut *conn, &dispute).await.map_err(db_error)?;
                    outcome.dispute = Some(dispute);
                }
                LedgerOp::UpdateTBankPayment { order_id, expected, status, payment_id } => {
                    let mut payment = TBankRepository::lock_payment(&mut *conn, order_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("T-Bank payment", order_id))?;
                    if payment.status != *expected {
                        return Err(WalletError::Conflict(format!(
                            "T-Bank payment {} is {}, expected {}",
                            order_id, payment.status, expected
                        )));
                    }
                    payment.status = *status;
                    if payment_id.is_some() {
                        payment.payment_id = payment_id.clone();
                    }
                    payment.updated_at = now;
                    TBankRepository::save_payment(&mut *conn, &payment)
                        .await
                        .map_err(db_error)?;
                    outcome.tbank_payment = Some(payment);
                }
                LedgerOp::RecordDealPayment { deal_row_id, amount, deal_id } => {
                    let mut deal = TBankRepository::lock_deal(&mut *conn, *deal_row_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.record_payment(*amount, deal_id.as_deref())?;
                    TBankRepository::save_deal(&mut *conn, &deal).await.map_err(db_error)?;
                    outcome.deal = Some(deal);
                }
                LedgerOp::CreatePayout(payout) => {
                    let created = TBankRepository::insert_payout(&mut *conn, payout)
                        .await
                        .map_err(db_error)?;
                    outcome.payout = Some(created);
                }
                LedgerOp::ReserveDealPayout { deal_row_id, amount } => {
                    let mut deal = TBankRepository::lock_deal(&mut *conn, *deal_row_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.reserve_payout(*amount)?;
                    TBankRepository::save_deal(&mut *conn, &deal).await.map_err(db_error)?;
                    outcome.deal = Some(deal);
                }
                LedgerOp::ReleaseDealPayout { deal_row_id, amount } => {
                    let mut deal = TBankRepository::lock_deal(&mut *conn, *deal_row_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.release_payout(*amount)?;
                    TBankRepository::save_deal(&mut *conn, &deal).await.map_err(db_error)?;
                    outcome.deal = Some(deal);
                }
                LedgerOp::RecordDealPayout { deal_row_id, amount, is_final } => {
                    let mut deal = TBankRepository::lock_deal(&mut *conn, *deal_row_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.record_payout(*amount, *is_final)?;
                    TBankRepository::save_deal(&mut *conn, &deal).await.map_err(db_error)?;
                    outcome.deal = Some(deal);
                }
                LedgerOp::FinishPayout { payout_id, status, gateway_payout_id, error_message } => {
                    let mut payout = TBankRepository::lock_payout(&mut *conn, *payout_id)
                        .await
                        .map_err(db_error)?
                        .ok_or_else(|| WalletError::not_found("T-Bank payout", payout_id))?;
                    if payout.status != PayoutStatus::Pending {
                        return Err(WalletError::Conflict(format!(
                            "T-Bank payout {} is already {}",
                            payout_id,
                            payout.status.as_str()
                        )));
                    }
                    payout.status = *status;
                    payout.gateway_payout_id = gateway_payout_id.clone();
                    payout.error_message = error_message.clone();
                    payout.updated_at = now;
                    TBankRepository::save_payout(&mut *conn, &payout)
                        .await
                        .map_err(db_error)?;
                    outcome.payout = Some(payout);
                }
            }
        }

        // 3. 잠긴 잔고 저장
        for user in users.values() {
            UserBalanceRepository::save(&mut *conn, user)
                .await
                .map_err(db_error)?;
        }
        outcome.balances = users;

        Ok(outcome)
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

fn db_error(err: anyhow::Error) -> WalletError {
    WalletError::Database(format!("{:#}", err))
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn execute(&self, plan: LedgerPlan) -> Result<PlanOutcome, WalletError> {
        let mut tx = self.db.pool().begin().await?;

        match self.apply_ops(&mut *tx, &plan).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "ledger plan rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn get_user_balance(&self, user_id: u64) -> Result<Option<UserBalance>, WalletError> {
        UserBalanceRepository::new(self.db.pool().clone())
            .get(user_id)
            .await
            .map_err(db_error)
    }

    async fn find_entry_by_gateway(
        &self,
        gateway: Gateway,
        gateway_payment_id: &str,
    ) -> Result<Option<LedgerEntry>, WalletError> {
        LedgerEntryRepository::new(self.db.pool().clone())
            .find_by_gateway(gateway, gateway_payment_id)
            .await
            .map_err(db_error)
    }

    async fn list_entries_for_user(
        &self,
        user_id: u64,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        LedgerEntryRepository::new(self.db.pool().clone())
            .list_for_user(user_id, limit)
            .await
            .map_err(db_error)
    }

    async fn list_entries_for_task(&self, task_id: u64) -> Result<Vec<LedgerEntry>, WalletError> {
        LedgerEntryRepository::new(self.db.pool().clone())
            .list_for_task(task_id)
            .await
            .map_err(db_error)
    }

    async fn attach_receipt(
        &self,
        entry_id: u64,
        receipt_id: &str,
    ) -> Result<ReceiptAttach, WalletError> {
        LedgerEntryRepository::new(self.db.pool().clone())
            .attach_receipt(entry_id, receipt_id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| WalletError::not_found("Transaction", entry_id))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, WalletError> {
        TaskRepository::new(self.db.pool().clone())
            .create(&task)
            .await
            .map_err(db_error)
    }

    async fn get_task(&self, task_id: u64) -> Result<Option<Task>, WalletError> {
        TaskRepository::new(self.db.pool().clone())
            .get(task_id)
            .await
            .map_err(db_error)
    }

    async fn reservations_for_task(
        &self,
        task_id: u64,
    ) -> Result<Vec<EscrowReservation>, WalletError> {
        ReservationRepository::new(self.db.pool().clone())
            .list_for_task(task_id)
            .await
            .map_err(db_error)
    }

    async fn dispute_for_task(&self, task_id: u64) -> Result<Option<Dispute>, WalletError> {
        DisputeRepository::new(self.db.pool().clone())
            .get_for_task(task_id)
            .await
            .map_err(db_error)
    }

    async fn get_dispute(&self, dispute_id: u64) -> Result<Option<Dispute>, WalletError> {
        DisputeRepository::new(self.db.pool().clone())
            .get(dispute_id)
            .await
            .map_err(db_error)
    }

    async fn reciprocal_deals(
        &self,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReciprocalDeals>, WalletError> {
        TaskRepository::new(self.db.pool().clone())
            .reciprocal_deals(user_id, since)
            .await
            .map_err(db_error)
    }

    async fn open_or_create_deal(&self, user_id: u64) -> Result<TBankDeal, WalletError> {
        TBankRepository::new(self.db.pool().clone())
            .open_or_create_deal(user_id)
            .await
            .map_err(db_error)
    }

    async fn open_deal_for_user(&self, user_id: u64) -> Result<Option<TBankDeal>, WalletError> {
        TBankRepository::new(self.db.pool().clone())
            .get_open_deal(user_id)
            .await
            .map_err(db_error)
    }

    async fn create_tbank_payment(
        &self,
        payment: NewTBankPayment,
    ) -> Result<TBankPayment, WalletError> {
        TBankRepository::new(self.db.pool().clone())
            .create_payment(&payment)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    WalletError::Duplicate {
                        key: format!("tbank-order:{}", payment.order_id),
                    }
                } else {
                    db_error(e)
                }
            })
    }

    async fn set_tbank_payment_id(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<(), WalletError> {
        let updated = TBankRepository::new(self.db.pool().clone())
            .set_payment_id(order_id, payment_id)
            .await
            .map_err(db_error)?;
        if updated == 0 {
            return Err(WalletError::not_found("T-Bank payment", order_id));
        }
        Ok(())
    }

    async fn find_tbank_payment(&self, order_id: &str) -> Result<Option<TBankPayment>, WalletError> {
        TBankRepository::new(self.db.pool().clone())
            .find_payment(order_id)
            .await
            .map_err(db_error)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, WalletError> {
        CategoryRepository::new(self.db.pool().clone())
            .list()
            .await
            .map_err(db_error)
    }
}
