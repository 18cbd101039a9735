use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use crate::domains::escrow::models::{
    CancellationAction, Dispute, DisputeOutcome, EscrowReservation, NewDispute, NewReservation,
    NewTask, ReleaseKind, Task, TaskPatch, TaskStatus,
};
use crate::domains::wallet::models::{
    Amount, BalanceChange, EntryKind, LedgerEntry, MoneyInput, NewLedgerEntry,
};
use crate::shared::database::{LedgerOp, LedgerPlan, LedgerStore};
use crate::shared::errors::WalletError;
use crate::shared::services::notifier::{notify_quietly, Notification, NotificationKind, Notifier};

// =====================================================
// EscrowService: 작업 생명주기 오케스트레이터
// =====================================================
// 잔고 변경은 모두 작업 CAS와 같은 LedgerPlan에 포함
// (frozen_balance 감소 = 작업 상태/escrow_amount 변경, 한 트랜잭션)
// CAS 기준은 plan을 계산한 작업 스냅샷 전체 (TaskGuard)
// 서비스의 사전 확인은 빠른 에러용, 최종 판정은 plan 안에서
//
// 환불 경로 (in_progress → open):
//   Unfreeze(고객, escrow) + 예약 해제(refund)
// 지급 경로 (in_progress → completed):
//   SettleFrozen(고객, price) + Credit(실행자, price - 수수료)
//   + payment / payout / commission 기록 + 예약 해제(paid_out)
// =====================================================

/// 수수료 계산 (소수 둘째 자리, 0.5는 0에서 먼 쪽으로)
/// Platform commission, rounded half away from zero to kopecks
pub fn calculate_commission(price: Decimal, rate: Decimal) -> Decimal {
    (price * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// 작업 상세 (예약, 분쟁 포함)
#[derive(Debug, Clone)]
pub struct TaskDetails {
    pub task: Task,
    pub reservations: Vec<EscrowReservation>,
    pub dispute: Option<Dispute>,
}

/// 작업 완료 결과
#[derive(Debug, Clone)]
pub struct Completion {
    pub task: Task,
    pub payout: Decimal,
    pub commission: Decimal,
    pub entries: Vec<LedgerEntry>,
}

/// 취소 요청 응답 결과
#[derive(Debug, Clone)]
pub struct CancellationResponse {
    pub task: Task,
    /// dispute 선택 시 다음 단계 안내
    pub message: Option<String>,
}

/// 지급 경로 plan과 금액 분배
#[derive(Debug, Clone)]
pub struct CompletionPlan {
    pub plan: LedgerPlan,
    pub executor_id: u64,
    pub price: Decimal,
    pub net: Decimal,
    pub commission: Decimal,
}

/// 분쟁 생성/해결 결과
#[derive(Debug, Clone)]
pub struct DisputeResolution {
    pub dispute: Dispute,
    pub task: Task,
}

#[derive(Clone)]
pub struct EscrowService {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
    commission_rate: Decimal,
}

impl EscrowService {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>, commission_rate: Decimal) -> Self {
        Self {
            store,
            notifier,
            commission_rate,
        }
    }

    /// 작업 생성 (open)
    pub async fn create_task(
        &self,
        customer_id: u64,
        title: &str,
        budget: &MoneyInput,
    ) -> Result<Task, WalletError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WalletError::InvalidInput("Title is required".to_string()));
        }
        let budget = Amount::parse(budget)?.value();

        let task = self
            .store
            .create_task(NewTask {
                customer_id,
                title: title.to_string(),
                budget,
            })
            .await?;

        tracing::info!(task_id = task.id, customer_id, %budget, "task created");
        Ok(task)
    }

    /// 작업 조회 (고객, 실행자, 관리자만)
    pub async fn get_task(
        &self,
        viewer_id: u64,
        is_admin: bool,
        task_id: u64,
    ) -> Result<TaskDetails, WalletError> {
        let task = self.load_task(task_id).await?;
        if !is_admin && task.customer_id != viewer_id && task.executor_id != Some(viewer_id) {
            return Err(WalletError::forbidden("Only task participants can view escrow details"));
        }

        let reservations = self.store.reservations_for_task(task_id).await?;
        let dispute = self.store.dispute_for_task(task_id).await?;

        Ok(TaskDetails {
            task,
            reservations,
            dispute,
        })
    }

    /// 실행자 수락 (open → in_progress, 가격 동결)
    pub async fn accept_executor(
        &self,
        customer_id: u64,
        task_id: u64,
        executor_id: u64,
        price: Option<&MoneyInput>,
    ) -> Result<Task, WalletError> {
        let task = self.load_task(task_id).await?;
        Self::ensure_customer(&task, customer_id)?;
        task.ensure_status(TaskStatus::Open)?;
        if executor_id == task.customer_id {
            return Err(WalletError::InvalidInput(
                "Customer cannot be the executor of their own task".to_string(),
            ));
        }

        let price = match price {
            Some(input) => Amount::parse(input)?.value(),
            None => Amount::from_decimal(task.budget)?.value(),
        };

        // 동결 가능 여부는 잠긴 행에서 다시 확인
        let plan = LedgerPlan::new()
            .update_task(&task, TaskPatch::accept(executor_id, price))
            .balance(customer_id, BalanceChange::Freeze(price))
            .push(LedgerOp::OpenReservation(NewReservation {
                task_id,
                customer_id,
                amount: price,
                reason: format!("Escrow for task {}", task_id),
            }));

        let outcome = self.store.execute(plan).await.inspect_err(|e| {
            tracing::info!(task_id, customer_id, %price, error = %e, "executor acceptance rejected");
        })?;
        let task = outcome.task()?.clone();

        tracing::info!(task_id, customer_id, executor_id, %price, "executor accepted, escrow frozen");
        notify_quietly(
            self.notifier.as_ref(),
            Notification::to_user(
                executor_id,
                NotificationKind::TaskAccepted,
                format!("You were selected as executor for \"{}\"", task.title),
            )
            .for_task(task_id),
        )
        .await;

        Ok(task)
    }

    /// 고객 취소 (in_progress → open, 환불)
    pub async fn cancel_task(&self, customer_id: u64, task_id: u64) -> Result<Task, WalletError> {
        let task = self.load_task(task_id).await?;
        Self::ensure_customer(&task, customer_id)?;
        task.ensure_status(TaskStatus::InProgress)?;
        self.ensure_no_open_dispute(task_id).await?;

        let former_executor = task.executor_id;
        let task = self.refund(&task, "Cancelled by customer", LedgerPlan::new()).await?;

        if let Some(executor_id) = former_executor {
            notify_quietly(
                self.notifier.as_ref(),
                Notification::to_user(
                    executor_id,
                    NotificationKind::TaskCancelled,
                    format!("Task \"{}\" was cancelled by the customer", task.title),
                )
                .for_task(task_id),
            )
            .await;
        }

        Ok(task)
    }

    /// 협의 취소 요청 (고객)
    pub async fn request_cancellation(
        &self,
        customer_id: u64,
        task_id: u64,
        reason: Option<String>,
    ) -> Result<Task, WalletError> {
        let task = self.load_task(task_id).await?;
        Self::ensure_customer(&task, customer_id)?;
        task.ensure_status(TaskStatus::InProgress)?;
        if task.has_pending_cancellation() {
            return Err(WalletError::Conflict(format!(
                "Task {} already has a pending cancellation request",
                task_id
            )));
        }
        self.ensure_no_open_dispute(task_id).await?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let plan = LedgerPlan::new()
            .update_task(&task, TaskPatch::request_cancellation(Utc::now(), reason))
            .push(LedgerOp::EnsureNoOpenDispute { task_id });
        let outcome = self.store.execute(plan).await?;
        let task = outcome.task()?.clone();

        tracing::info!(task_id, customer_id, "cancellation requested");
        if let Some(executor_id) = task.executor_id {
            notify_quietly(
                self.notifier.as_ref(),
                Notification::to_user(
                    executor_id,
                    NotificationKind::CancellationRequested,
                    format!("The customer asked to cancel \"{}\"", task.title),
                )
                .for_task(task_id),
            )
            .await;
        }

        Ok(task)
    }

    /// 협의 취소 응답 (실행자)
    /// accept: 환불 경로, dispute: 상태 변경 없이 분쟁 생성 안내
    pub async fn respond_cancellation(
        &self,
        executor_id: u64,
        task_id: u64,
        action: CancellationAction,
    ) -> Result<CancellationResponse, WalletError> {
        let task = self.load_task(task_id).await?;
        if task.executor_id != Some(executor_id) {
            return Err(WalletError::forbidden("Only the assigned executor can respond"));
        }
        task.ensure_status(TaskStatus::InProgress)?;
        if !task.has_pending_cancellation() {
            return Err(WalletError::Conflict(format!(
                "Task {} has no pending cancellation request",
                task_id
            )));
        }

        match action {
            CancellationAction::Accept => {
                self.ensure_no_open_dispute(task_id).await?;
                let task = self
                    .refund(&task, "Cancellation accepted by executor", LedgerPlan::new())
                    .await?;

                notify_quietly(
                    self.notifier.as_ref(),
                    Notification::to_user(
                        task.customer_id,
                        NotificationKind::CancellationAccepted,
                        format!("The executor accepted cancellation of \"{}\"", task.title),
                    )
                    .for_task(task_id),
                )
                .await;

                Ok(CancellationResponse { task, message: None })
            }
            CancellationAction::Dispute => Ok(CancellationResponse {
                task,
                message: Some(format!(
                    "Open a dispute with POST /api/tasks/{}/dispute",
                    task_id
                )),
            }),
        }
    }

    /// 분쟁 생성 (고객 또는 실행자, 작업당 1회)
    pub async fn open_dispute(
        &self,
        user_id: u64,
        task_id: u64,
        reason: &str,
    ) -> Result<DisputeResolution, WalletError> {
        let task = self.load_task(task_id).await?;
        let counterparty = if task.customer_id == user_id {
            task.executor_id
        } else if task.executor_id == Some(user_id) {
            Some(task.customer_id)
        } else {
            return Err(WalletError::forbidden("Only task participants can open a dispute"));
        };
        task.ensure_status(TaskStatus::InProgress)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WalletError::InvalidInput("Dispute reason is required".to_string()));
        }
        if self.store.dispute_for_task(task_id).await?.is_some() {
            return Err(WalletError::Conflict(format!(
                "Task {} already has a dispute",
                task_id
            )));
        }

        let plan = LedgerPlan::new()
            .update_task(&task, TaskPatch::clear_cancellation())
            .push(LedgerOp::OpenDispute(NewDispute {
                task_id,
                opened_by: user_id,
                reason: reason.to_string(),
            }));
        let outcome = self.store.execute(plan).await?;
        let task = outcome.task()?.clone();
        let dispute = outcome
            .dispute
            .ok_or_else(|| WalletError::Internal("dispute missing from plan outcome".to_string()))?;

        tracing::info!(task_id, dispute_id = dispute.id, opened_by = user_id, "dispute opened");
        if let Some(other) = counterparty {
            notify_quietly(
                self.notifier.as_ref(),
                Notification::to_user(
                    other,
                    NotificationKind::DisputeOpened,
                    format!("A dispute was opened on \"{}\"", task.title),
                )
                .for_task(task_id),
            )
            .await;
        }

        Ok(DisputeResolution { dispute, task })
    }

    /// 작업 완료 (in_progress → completed, 지급 + 수수료)
    pub async fn complete_task(&self, customer_id: u64, task_id: u64) -> Result<Completion, WalletError> {
        let task = self.load_task(task_id).await?;
        Self::ensure_customer(&task, customer_id)?;
        task.ensure_status(TaskStatus::InProgress)?;
        self.ensure_no_open_dispute(task_id).await?;

        let completion = self.payout(&task, LedgerPlan::new()).await?;

        if let Some(executor_id) = completion.task.executor_id {
            notify_quietly(
                self.notifier.as_ref(),
                Notification::to_user(
                    executor_id,
                    NotificationKind::TaskCompleted,
                    format!(
                        "Task \"{}\" completed, {} credited to your balance",
                        completion.task.title, completion.payout
                    ),
                )
                .for_task(task_id),
            )
            .await;
        }

        Ok(completion)
    }

    /// 분쟁 해결 (관리자)
    /// customer: 환불 후 작업 재오픈, executor: 지급 경로
    pub async fn resolve_dispute(
        &self,
        admin_id: u64,
        dispute_id: u64,
        outcome: DisputeOutcome,
        note: Option<String>,
    ) -> Result<DisputeResolution, WalletError> {
        let dispute = self
            .store
            .get_dispute(dispute_id)
            .await?
            .ok_or_else(|| WalletError::not_found("Dispute", dispute_id))?;
        if !dispute.is_open() {
            return Err(WalletError::Conflict(format!(
                "Dispute {} is already resolved",
                dispute_id
            )));
        }
        let task = self.load_task(dispute.task_id).await?;
        task.ensure_status(TaskStatus::InProgress)?;
        let customer_id = task.customer_id;
        let executor_id = task.executor_id;

        let resolve = LedgerPlan::new().push(LedgerOp::ResolveDispute {
            dispute_id,
            outcome,
            resolved_by: admin_id,
            note,
        });

        let (task, dispute) = match outcome {
            DisputeOutcome::Customer => {
                let reason = format!("Dispute {} resolved in favour of customer", dispute_id);
                self.refund_with_outcome(&task, &reason, resolve).await?
            }
            DisputeOutcome::Executor => {
                let (completion, dispute) = self.payout_with_outcome(&task, resolve).await?;
                (completion.task, dispute)
            }
        };
        let dispute = dispute
            .ok_or_else(|| WalletError::Internal("dispute missing from plan outcome".to_string()))?;

        tracing::info!(dispute_id, task_id = task.id, admin_id, %outcome, "dispute resolved");
        for user_id in std::iter::once(customer_id).chain(executor_id) {
            notify_quietly(
                self.notifier.as_ref(),
                Notification::to_user(
                    user_id,
                    NotificationKind::DisputeResolved,
                    format!("Dispute on \"{}\" resolved in favour of the {}", task.title, outcome),
                )
                .for_task(task.id),
            )
            .await;
        }

        Ok(DisputeResolution { dispute, task })
    }

    // ----- 내부 -----

    async fn load_task(&self, task_id: u64) -> Result<Task, WalletError> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| WalletError::not_found("Task", task_id))
    }

    fn ensure_customer(task: &Task, user_id: u64) -> Result<(), WalletError> {
        if task.customer_id != user_id {
            return Err(WalletError::forbidden("Only the task customer can do this"));
        }
        Ok(())
    }

    async fn ensure_no_open_dispute(&self, task_id: u64) -> Result<(), WalletError> {
        match self.store.dispute_for_task(task_id).await? {
            Some(dispute) if dispute.is_open() => Err(WalletError::Conflict(format!(
                "Task {} has an open dispute",
                task_id
            ))),
            _ => Ok(()),
        }
    }

    async fn refund(&self, task: &Task, reason: &str, plan: LedgerPlan) -> Result<Task, WalletError> {
        Ok(self.refund_with_outcome(task, reason, plan).await?.0)
    }

    /// 환불 경로 plan (in_progress → open)
    /// `task` is the snapshot the refund was decided on; the plan fails with
    /// Conflict if the row moved or a dispute is open when it runs.
    pub fn refund_plan(task: &Task, reason: &str, plan: LedgerPlan) -> LedgerPlan {
        let escrow = task.escrow_amount;

        let mut plan = plan
            .update_task(task, TaskPatch::reopen())
            .push(LedgerOp::EnsureNoOpenDispute { task_id: task.id });
        if escrow > Decimal::ZERO {
            plan = plan.balance(task.customer_id, BalanceChange::Unfreeze(escrow));
        }
        plan.push(LedgerOp::ReleaseReservation {
            task_id: task.id,
            kind: ReleaseKind::Refund,
            reason: reason.to_string(),
        })
    }

    /// 지급 경로 plan (in_progress → completed)
    /// 기록 합계: -price + (price - commission) + commission = 0
    pub fn completion_plan(&self, task: &Task, plan: LedgerPlan) -> Result<CompletionPlan, WalletError> {
        let executor_id = task
            .executor_id
            .ok_or_else(|| WalletError::Conflict(format!("Task {} has no executor", task.id)))?;
        let price = task.escrow_amount;
        let commission = calculate_commission(price, self.commission_rate);
        let net = price - commission;

        let mut plan = plan
            .update_task(task, TaskPatch::complete())
            .push(LedgerOp::EnsureNoOpenDispute { task_id: task.id })
            .balance(task.customer_id, BalanceChange::SettleFrozen(price))
            .record(
                NewLedgerEntry::new(
                    Some(task.customer_id),
                    -price,
                    EntryKind::Payment,
                    format!("Payment for task {}", task.id),
                )
                .with_task(task.id),
            );
        if net > Decimal::ZERO {
            plan = plan
                .balance(executor_id, BalanceChange::Credit(net))
                .record(
                    NewLedgerEntry::new(
                        Some(executor_id),
                        net,
                        EntryKind::Payout,
                        format!("Payout for task {}", task.id),
                    )
                    .with_task(task.id),
                );
        }
        if commission > Decimal::ZERO {
            plan = plan.record(
                NewLedgerEntry::new(
                    None,
                    commission,
                    EntryKind::Commission,
                    format!("Platform commission for task {}", task.id),
                )
                .with_task(task.id),
            );
        }
        let plan = plan.push(LedgerOp::ReleaseReservation {
            task_id: task.id,
            kind: ReleaseKind::PaidOut,
            reason: format!("Paid out to executor {}", executor_id),
        });

        Ok(CompletionPlan {
            plan,
            executor_id,
            price,
            net,
            commission,
        })
    }

    async fn refund_with_outcome(
        &self,
        task: &Task,
        reason: &str,
        plan: LedgerPlan,
    ) -> Result<(Task, Option<Dispute>), WalletError> {
        let plan = Self::refund_plan(task, reason, plan);
        let outcome = self.store.execute(plan).await?;
        let updated = outcome.task()?.clone();

        tracing::info!(
            task_id = task.id,
            customer_id = task.customer_id,
            amount = %task.escrow_amount,
            reason,
            "escrow refunded"
        );
        Ok((updated, outcome.dispute))
    }

    async fn payout(&self, task: &Task, plan: LedgerPlan) -> Result<Completion, WalletError> {
        Ok(self.payout_with_outcome(task, plan).await?.0)
    }

    async fn payout_with_outcome(
        &self,
        task: &Task,
        plan: LedgerPlan,
    ) -> Result<(Completion, Option<Dispute>), WalletError> {
        let CompletionPlan {
            plan,
            executor_id,
            price,
            net,
            commission,
        } = self.completion_plan(task, plan)?;

        let outcome = self.store.execute(plan).await?;
        let updated = outcome.task()?.clone();

        tracing::info!(
            task_id = task.id,
            customer_id = task.customer_id,
            executor_id,
            %price,
            %net,
            %commission,
            "task completed, escrow paid out"
        );

        Ok((
            Completion {
                task: updated,
                payout: net,
                commission,
                entries: outcome.entries,
            },
            outcome.dispute,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_rounds_half_away_from_zero() {
        let rate = Decimal::new(10, 2);
        assert_eq!(calculate_commission(Decimal::from(1500), rate), Decimal::new(15000, 2));
        // 0.05 * 0.10 = 0.005 → 0.01
        assert_eq!(calculate_commission(Decimal::new(5, 2), rate), Decimal::new(1, 2));
        // 0.25 * 0.10 = 0.025 → 0.03 (banker's rounding would give 0.02)
        assert_eq!(calculate_commission(Decimal::new(25, 2), rate), Decimal::new(3, 2));
    }

    #[test]
    fn zero_rate_means_no_commission() {
        assert_eq!(calculate_commission(Decimal::from(999), Decimal::ZERO), Decimal::ZERO);
    }
}
