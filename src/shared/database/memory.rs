use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use crate::domains::catalog::models::Category;
use crate::domains::escrow::models::{
    Dispute, EscrowReservation, NewTask, Task, TaskStatus,
};
use crate::domains::payments::models::{
    DealStatus, NewTBankPayment, PayoutStatus, TBankDeal, TBankPayment, TBankPaymentStatus,
};
use crate::domains::payments::models::TBankPayout;
use crate::domains::wallet::models::{Gateway, LedgerEntry, ReceiptAttach, UserBalance};
use crate::shared::database::store::{
    LedgerOp, LedgerPlan, LedgerStore, PlanOutcome, ReciprocalDeals,
};
use crate::shared::errors::WalletError;

// =====================================================
// MemoryLedgerStore
// =====================================================
// 역할: 메모리 기반 LedgerStore (테스트 / 로컬 실행)
//
// 원자성:
// - 뮤텍스 하나로 전체 상태 보호
// - plan은 상태 복제본에 적용하고, 성공 시에만 교체
//   (실패 시 복제본 폐기 = ROLLBACK)
// =====================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<u64, UserBalance>,
    entries: Vec<LedgerEntry>,
    tasks: BTreeMap<u64, Task>,
    reservations: Vec<EscrowReservation>,
    disputes: Vec<Dispute>,
    deals: BTreeMap<u64, TBankDeal>,
    tbank_payments: Vec<TBankPayment>,
    payouts: BTreeMap<u64, TBankPayout>,
    categories: Vec<Category>,
    sequence: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn apply(&mut self, plan: LedgerPlan) -> Result<PlanOutcome, WalletError> {
        let locked = plan.locked_users();
        for user_id in &locked {
            if !self.users.contains_key(user_id) {
                return Err(WalletError::not_found("User", user_id));
            }
        }

        let now = Utc::now();
        let mut outcome = PlanOutcome::default();

        for op in plan.ops().iter().cloned() {
            match op {
                LedgerOp::Balance { user_id, change } => {
                    let user = self
                        .users
                        .get_mut(&user_id)
                        .ok_or_else(|| WalletError::not_found("User", user_id))?;
                    user.apply(change)?;
                }
                LedgerOp::RecordEntry(entry) => {
                    if let (Some(gateway), Some(payment_id)) = (&entry.gateway, &entry.gateway_payment_id) {
                        let exists = self.entries.iter().any(|e| {
                            e.gateway.as_ref() == Some(gateway)
                                && e.gateway_payment_id.as_ref() == Some(payment_id)
                        });
                        if exists {
                            return Err(WalletError::Duplicate {
                                key: entry.correlation_key().unwrap_or_default(),
                            });
                        }
                    }
                    let id = self.next_id();
                    let entry = entry.into_entry(id, now);
                    self.entries.push(entry.clone());
                    outcome.entries.push(entry);
                }
                LedgerOp::OpenReservation(reservation) => {
                    if self
                        .reservations
                        .iter()
                        .any(|r| r.task_id == reservation.task_id && r.is_open())
                    {
                        return Err(WalletError::Conflict(format!(
                            "Task {} already has an open escrow reservation",
                            reservation.task_id
                        )));
                    }
                    let id = self.next_id();
                    let reservation = reservation.into_reservation(id, now);
                    self.reservations.push(reservation.clone());
                    outcome.reservation = Some(reservation);
                }
                LedgerOp::ReleaseReservation { task_id, kind, reason } => {
                    let reservation = self
                        .reservations
                        .iter_mut()
                        .find(|r| r.task_id == task_id && r.is_open())
                        .ok_or_else(|| {
                            WalletError::Conflict(format!(
                                "Task {} has no open escrow reservation",
                                task_id
                            ))
                        })?;
                    reservation.release(kind, reason, now)?;
                    outcome.reservation = Some(reservation.clone());
                }
                LedgerOp::UpdateTask { task_id, guard, patch } => {
                    let task = self
                        .tasks
                        .get_mut(&task_id)
                        .ok_or_else(|| WalletError::not_found("Task", task_id))?;
                    guard.check(task)?;
                    patch.apply_to(task, now);
                    outcome.task = Some(task.clone());
                }
                LedgerOp::EnsureNoOpenDispute { task_id } => {
                    if self.disputes.iter().any(|d| d.task_id == task_id && d.is_open()) {
                        return Err(WalletError::Conflict(format!(
                            "Task {} has an open dispute",
                            task_id
                        )));
                    }
                }
                LedgerOp::OpenDispute(dispute) => {
                    if self.disputes.iter().any(|d| d.task_id == dispute.task_id) {
                        return Err(WalletError::Conflict(format!(
                            "Task {} already has a dispute",
                            dispute.task_id
                        )));
                    }
                    let id = self.next_id();
                    let dispute = dispute.into_dispute(id, now);
                    self.disputes.push(dispute.clone());
                    outcome.dispute = Some(dispute);
                }
                LedgerOp::ResolveDispute { dispute_id, outcome: result, resolved_by, note } => {
                    let dispute = self
                        .disputes
                        .iter_mut()
                        .find(|d| d.id == dispute_id)
                        .ok_or_else(|| WalletError::not_found("Dispute", dispute_id))?;
                    dispute.resolve(result, resolved_by, note, now)?;
                    outcome.dispute = Some(dispute.clone());
                }
                LedgerOp::UpdateTBankPayment { order_id, expected, status, payment_id } => {
                    let payment = self
                        .tbank_payments
                        .iter_mut()
                        .find(|p| p.order_id == order_id)
                        .ok_or_else(|| WalletError::not_found("T-Bank payment", &order_id))?;
                    if payment.status != expected {
                        return Err(WalletError::Conflict(format!(
                            "T-Bank payment {} is {}, expected {}",
                            order_id, payment.status, expected
                        )));
                    }
                    payment.status = status;
                    if payment_id.is_some() {
                        payment.payment_id = payment_id;
                    }
                    payment.updated_at = now;
                    outcome.tbank_payment = Some(payment.clone());
                }
                LedgerOp::RecordDealPayment { deal_row_id, amount, deal_id } => {
                    let deal = self
                        .deals
                        .get_mut(&deal_row_id)
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.record_payment(amount, deal_id.as_deref())?;
                    outcome.deal = Some(deal.clone());
                }
                LedgerOp::CreatePayout(payout) => {
                    let id = self.next_id();
                    let payout = payout.into_payout(id, now);
                    self.payouts.insert(id, payout.clone());
                    outcome.payout = Some(payout);
                }
                LedgerOp::ReserveDealPayout { deal_row_id, amount } => {
                    let deal = self
                        .deals
                        .get_mut(&deal_row_id)
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.reserve_payout(amount)?;
                    outcome.deal = Some(deal.clone());
                }
                LedgerOp::ReleaseDealPayout { deal_row_id, amount } => {
                    let deal = self
                        .deals
                        .get_mut(&deal_row_id)
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.release_payout(amount)?;
                    outcome.deal = Some(deal.clone());
                }
                LedgerOp::RecordDealPayout { deal_row_id, amount, is_final } => {
                    let deal = self
                        .deals
                        .get_mut(&deal_row_id)
                        .ok_or_else(|| WalletError::not_found("T-Bank deal", deal_row_id))?;
                    deal.record_payout(amount, is_final)?;
                    outcome.deal = Some(deal.clone());
                }
                LedgerOp::FinishPayout { payout_id, status, gateway_payout_id, error_message } => {
                    let payout = self
                        .payouts
                        .get_mut(&payout_id)
                        .ok_or_else(|| WalletError::not_found("T-Bank payout", payout_id))?;
                    if payout.status != PayoutStatus::Pending {
                        return Err(WalletError::Conflict(format!(
                            "T-Bank payout {} is already {}",
                            payout_id,
                            payout.status.as_str()
                        )));
                    }
                    payout.status = status;
                    payout.gateway_payout_id = gateway_payout_id;
                    payout.error_message = error_message;
                    payout.updated_at = now;
                    outcome.payout = Some(payout.clone());
                }
            }
        }

        for user_id in locked {
            if let Some(user) = self.users.get(&user_id) {
                outcome.balances.insert(user_id, user.clone());
            }
        }

        Ok(outcome)
    }
}

/// 메모리 기반 LedgerStore
/// In-memory LedgerStore
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 사용자 추가 (인증 계층이 만드는 사용자 대신)
    /// Seed a user row the auth layer would normally own
    pub fn seed_user(
        &self,
        user_id: u64,
        balance: Decimal,
        frozen_balance: Decimal,
        created_at: DateTime<Utc>,
    ) -> UserBalance {
        let mut user = UserBalance::new(user_id, created_at);
        user.balance = balance;
        user.frozen_balance = frozen_balance;
        self.state.lock().users.insert(user_id, user.clone());
        user
    }

    pub fn seed_category(&self, category: Category) {
        self.state.lock().categories.push(category);
    }

    /// 작업 직접 추가 (과거 이력 구성용)
    pub fn seed_task(&self, task: Task) {
        let mut state = self.state.lock();
        state.sequence = state.sequence.max(task.id);
        state.tasks.insert(task.id, task);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().entries.clone()
    }

    pub fn payouts(&self) -> Vec<TBankPayout> {
        self.state.lock().payouts.values().cloned().collect()
    }

    pub fn users(&self) -> Vec<UserBalance> {
        self.state.lock().users.values().cloned().collect()
    }

    pub fn deals(&self) -> Vec<TBankDeal> {
        self.state.lock().deals.values().cloned().collect()
    }

    pub fn tbank_payments(&self) -> Vec<TBankPayment> {
        self.state.lock().tbank_payments.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn execute(&self, plan: LedgerPlan) -> Result<PlanOutcome, WalletError> {
        let mut state = self.state.lock();
        let mut draft = state.clone();
        let outcome = draft.apply(plan)?;
        *state = draft;
        Ok(outcome)
    }

    async fn get_user_balance(&self, user_id: u64) -> Result<Option<UserBalance>, WalletError> {
        Ok(self.state.lock().users.get(&user_id).cloned())
    }

    async fn find_entry_by_gateway(
        &self,
        gateway: Gateway,
        gateway_payment_id: &str,
    ) -> Result<Option<LedgerEntry>, WalletError> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .find(|e| {
                e.gateway == Some(gateway)
                    && e.gateway_payment_id.as_deref() == Some(gateway_payment_id)
            })
            .cloned())
    }

    async fn list_entries_for_user(
        &self,
        user_id: u64,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == Some(user_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_entries_for_task(&self, task_id: u64) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| e.task_id == Some(task_id))
            .cloned()
            .collect())
    }

    async fn attach_receipt(
        &self,
        entry_id: u64,
        receipt_id: &str,
    ) -> Result<ReceiptAttach, WalletError> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| WalletError::not_found("Transaction", entry_id))?;

        let result = match entry.receipt_id.clone() {
            None => {
                entry.receipt_id = Some(receipt_id.to_string());
                ReceiptAttach::Attached(entry.clone())
            }
            Some(existing) if existing == receipt_id => ReceiptAttach::AlreadyAttached(entry.clone()),
            Some(existing) => ReceiptAttach::Mismatch {
                entry: entry.clone(),
                existing,
            },
        };
        Ok(result)
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, WalletError> {
        let mut state = self.state.lock();
        let id = state.next_id();
        let now = Utc::now();
        let task = Task {
            id,
            customer_id: task.customer_id,
            executor_id: None,
            title: task.title,
            budget: task.budget,
            escrow_amount: Decimal::ZERO,
            status: TaskStatus::Open,
            cancellation_requested_at: None,
            cancellation_reason: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: u64) -> Result<Option<Task>, WalletError> {
        Ok(self.state.lock().tasks.get(&task_id).cloned())
    }

    async fn reservations_for_task(
        &self,
        task_id: u64,
    ) -> Result<Vec<EscrowReservation>, WalletError> {
        Ok(self
            .state
            .lock()
            .reservations
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn dispute_for_task(&self, task_id: u64) -> Result<Option<Dispute>, WalletError> {
        Ok(self
            .state
            .lock()
            .disputes
            .iter()
            .find(|d| d.task_id == task_id)
            .cloned())
    }

    async fn get_dispute(&self, dispute_id: u64) -> Result<Option<Dispute>, WalletError> {
        Ok(self
            .state
            .lock()
            .disputes
            .iter()
            .find(|d| d.id == dispute_id)
            .cloned())
    }

    async fn reciprocal_deals(
        &self,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReciprocalDeals>, WalletError> {
        let state = self.state.lock();

        // counterparty -> (user가 고객인 건수, user가 실행자인 건수)
        let mut pairs: HashMap<u64, (u32, u32)> = HashMap::new();
        for task in state.tasks.values() {
            if task.status != TaskStatus::Completed {
                continue;
            }
            if task.completed_at.map_or(true, |at| at < since) {
                continue;
            }
            let Some(executor_id) = task.executor_id else {
                continue;
            };
            if task.customer_id == user_id {
                pairs.entry(executor_id).or_default().0 += 1;
            } else if executor_id == user_id {
                pairs.entry(task.customer_id).or_default().1 += 1;
            }
        }

        let mut deals: Vec<ReciprocalDeals> = pairs
            .into_iter()
            .filter(|(_, (as_customer, as_executor))| *as_customer > 0 && *as_executor > 0)
            .map(|(counterparty_id, (a, b))| ReciprocalDeals {
                counterparty_id,
                completed_tasks: a + b,
            })
            .collect();
        deals.sort_by_key(|d| d.counterparty_id);
        Ok(deals)
    }

    async fn open_or_create_deal(&self, user_id: u64) -> Result<TBankDeal, WalletError> {
        let mut state = self.state.lock();
        if let Some(deal) = state
            .deals
            .values()
            .find(|d| d.user_id == user_id && d.status == DealStatus::Open)
        {
            return Ok(deal.clone());
        }

        let id = state.next_id();
        let now = Utc::now();
        let deal = TBankDeal {
            id,
            user_id,
            deal_id: None,
            status: DealStatus::Open,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            remaining_balance: Decimal::ZERO,
            reserved_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        state.deals.insert(id, deal.clone());
        Ok(deal)
    }

    async fn open_deal_for_user(&self, user_id: u64) -> Result<Option<TBankDeal>, WalletError> {
        Ok(self
            .state
            .lock()
            .deals
            .values()
            .find(|d| d.user_id == user_id && d.status == DealStatus::Open)
            .cloned())
    }

    async fn create_tbank_payment(
        &self,
        payment: NewTBankPayment,
    ) -> Result<TBankPayment, WalletError> {
        let mut state = self.state.lock();
        if state.tbank_payments.iter().any(|p| p.order_id == payment.order_id) {
            return Err(WalletError::Duplicate {
                key: format!("tbank-order:{}", payment.order_id),
            });
        }
        let id = state.next_id();
        let now = Utc::now();
        let payment = TBankPayment {
            id,
            order_id: payment.order_id,
            user_id: payment.user_id,
            deal_row_id: payment.deal_row_id,
            payment_id: None,
            amount: payment.amount,
            status: TBankPaymentStatus::New,
            created_at: now,
            updated_at: now,
        };
        state.tbank_payments.push(payment.clone());
        Ok(payment)
    }

    async fn set_tbank_payment_id(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        let payment = state
            .tbank_payments
            .iter_mut()
            .find(|p| p.order_id == order_id)
            .ok_or_else(|| WalletError::not_found("T-Bank payment", order_id))?;
        payment.payment_id = Some(payment_id.to_string());
        payment.updated_at = Utc::now();
        Ok(())
    }

    async fn find_tbank_payment(&self, order_id: &str) -> Result<Option<TBankPayment>, WalletError> {
        Ok(self
            .state
            .lock()
            .tbank_payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, WalletError> {
        let mut categories = self.state.lock().categories.clone();
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::wallet::models::{BalanceChange, EntryKind, NewLedgerEntry};

    #[tokio::test]
    async fn failed_plan_leaves_state_untouched() {
        let store = MemoryLedgerStore::new();
        store.seed_user(1, Decimal::from(1000), Decimal::ZERO, Utc::now());

        // 첫 op는 성공하지만 두 번째 op가 실패 → 전체 롤백
        let plan = LedgerPlan::new()
            .balance(1, BalanceChange::Debit(Decimal::from(100)))
            .record(NewLedgerEntry::new(Some(1), Decimal::from(-100), EntryKind::Withdraw, "w"))
            .balance(1, BalanceChange::Freeze(Decimal::from(5000)));

        assert!(matches!(
            store.execute(plan).await,
            Err(WalletError::InsufficientFunds { .. })
        ));

        let user = store.get_user_balance(1).await.unwrap().unwrap();
        assert_eq!(user.balance, Decimal::from(1000));
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn gateway_correlation_is_unique() {
        let store = MemoryLedgerStore::new();
        store.seed_user(1, Decimal::ZERO, Decimal::ZERO, Utc::now());

        let credit = || {
            LedgerPlan::new()
                .balance(1, BalanceChange::Credit(Decimal::from(100)))
                .record(
                    NewLedgerEntry::new(Some(1), Decimal::from(100), EntryKind::Deposit, "d")
                        .with_gateway(Gateway::YooKassa, "abc123"),
                )
        };

        store.execute(credit()).await.unwrap();
        assert!(matches!(
            store.execute(credit()).await,
            Err(WalletError::Duplicate { .. })
        ));

        let user = store.get_user_balance(1).await.unwrap().unwrap();
        assert_eq!(user.balance, Decimal::from(100));
        assert_eq!(store.entries().len(), 1);
    }

    #[tokio::test]
    async fn plan_on_unknown_user_is_not_found() {
        let store = MemoryLedgerStore::new();
        let plan = LedgerPlan::new().balance(99, BalanceChange::Credit(Decimal::ONE));
        assert!(matches!(
            store.execute(plan).await,
            Err(WalletError::NotFound { .. })
        ));
    }
}
