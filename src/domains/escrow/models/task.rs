use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use crate::shared::errors::WalletError;

// =====================================================
// Task 모델 (에스크로 관련 필드)
// =====================================================
// 역할: 작업의 상태와 에스크로 금액
//
// 상태 전이:
// - open → in_progress: 고객이 실행자 수락 (에스크로 동결)
// - in_progress → open: 고객 취소 / 협의 취소 / 분쟁에서 고객 승 (환불)
// - in_progress → completed: 작업 완료 / 분쟁에서 실행자 승 (지급 + 수수료)
//
// DB에는 정규 문자열만 저장: open, in_progress, completed
// =====================================================

/// 작업 상태 (닫힌 enum)
/// Task status, parsed strictly from its canonical string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// 작업 (DB 조회용)
/// Task with its escrow fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = Task)]
pub struct Task {
    pub id: u64,

    /// 고객 (작업 생성자)
    pub customer_id: u64,

    /// 수락된 실행자
    pub executor_id: Option<u64>,

    pub title: String,

    /// 예산 (수락 시 가격 기본값)
    /// Budget, the default price on acceptance
    #[schema(value_type = String, example = "1500.00")]
    pub budget: Decimal,

    /// 이 작업에 동결된 금액
    /// Funds frozen for this task
    #[schema(value_type = String, example = "1500.00")]
    pub escrow_amount: Decimal,

    pub status: TaskStatus,

    /// 협의 취소 요청 시각
    pub cancellation_requested_at: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,

    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 현재 상태가 기대 상태인지 확인
    /// Compare-and-set guard used by the store before patching
    pub fn ensure_status(&self, expected: TaskStatus) -> Result<(), WalletError> {
        if self.status != expected {
            return Err(WalletError::Conflict(format!(
                "Task {} is {}, expected {}",
                self.id, self.status, expected
            )));
        }
        Ok(())
    }

    pub fn has_pending_cancellation(&self) -> bool {
        self.cancellation_requested_at.is_some()
    }
}

/// 작업 CAS 조건: plan을 만든 시점의 스냅샷
/// The task fields a plan was computed from. The store rejects the plan
/// with Conflict unless the locked row still matches all of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskGuard {
    pub status: TaskStatus,
    pub executor_id: Option<u64>,
    pub escrow_amount: Decimal,
    pub cancellation_requested_at: Option<DateTime<Utc>>,
}

impl TaskGuard {
    pub fn of(task: &Task) -> Self {
        Self {
            status: task.status,
            executor_id: task.executor_id,
            escrow_amount: task.escrow_amount,
            cancellation_requested_at: task.cancellation_requested_at,
        }
    }

    pub fn check(&self, task: &Task) -> Result<(), WalletError> {
        task.ensure_status(self.status)?;
        // 같은 상태로 돌아온 작업 (취소 후 재수락 등)
        if task.executor_id != self.executor_id || task.escrow_amount != self.escrow_amount {
            return Err(WalletError::Conflict(format!(
                "Task {} was reassigned concurrently",
                task.id
            )));
        }
        if task.cancellation_requested_at != self.cancellation_requested_at {
            return Err(WalletError::Conflict(format!(
                "Task {} cancellation request changed concurrently",
                task.id
            )));
        }
        Ok(())
    }
}

/// 새 작업 생성
#[derive(Debug, Clone)]
pub struct NewTask {
    pub customer_id: u64,
    pub title: String,
    pub budget: Decimal,
}

/// 협의 취소 요청
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationRequest {
    pub requested_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// 작업 부분 업데이트 (None = 변경 없음)
/// Partial task update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub executor_id: Option<Option<u64>>,
    pub escrow_amount: Option<Decimal>,
    pub cancellation: Option<Option<CancellationRequest>>,
}

impl TaskPatch {
    /// 실행자 수락: in_progress, 실행자 지정, 에스크로 금액 설정
    pub fn accept(executor_id: u64, price: Decimal) -> Self {
        Self {
            status: Some(TaskStatus::InProgress),
            executor_id: Some(Some(executor_id)),
            escrow_amount: Some(price),
            cancellation: Some(None),
        }
    }

    /// 환불 경로: open으로 복귀, 실행자/에스크로/취소요청 초기화
    pub fn reopen() -> Self {
        Self {
            status: Some(TaskStatus::Open),
            executor_id: Some(None),
            escrow_amount: Some(Decimal::ZERO),
            cancellation: Some(None),
        }
    }

    /// 지급 경로: completed, 에스크로 0
    pub fn complete() -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            escrow_amount: Some(Decimal::ZERO),
            cancellation: Some(None),
            ..Default::default()
        }
    }

    pub fn request_cancellation(requested_at: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            cancellation: Some(Some(CancellationRequest { requested_at, reason })),
            ..Default::default()
        }
    }

    pub fn clear_cancellation() -> Self {
        Self {
            cancellation: Some(None),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            if status == TaskStatus::Completed && task.status != TaskStatus::Completed {
                task.completed_at = Some(now);
            }
            task.status = status;
        }
        if let Some(executor_id) = self.executor_id {
            task.executor_id = executor_id;
        }
        if let Some(escrow_amount) = self.escrow_amount {
            task.escrow_amount = escrow_amount;
        }
        if let Some(cancellation) = &self.cancellation {
            match cancellation {
                Some(request) => {
                    task.cancellation_requested_at = Some(request.requested_at);
                    task.cancellation_reason = request.reason.clone();
                }
                None => {
                    task.cancellation_requested_at = None;
                    task.cancellation_reason = None;
                }
            }
        }
        task.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: 7,
            customer_id: 1,
            executor_id: None,
            title: "Logo".to_string(),
            budget: Decimal::from(1500),
            escrow_amount: Decimal::ZERO,
            status,
            cancellation_requested_at: None,
            cancellation_reason: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parsing_is_strict() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("in progress".parse::<TaskStatus>().is_err());
        assert!("in-progress".parse::<TaskStatus>().is_err());
        assert!("IN_PROGRESS".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_serializes_to_canonical_string() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn accept_then_reopen_clears_escrow_fields() {
        let mut t = task(TaskStatus::Open);
        let now = Utc::now();

        TaskPatch::accept(2, Decimal::from(1500)).apply_to(&mut t, now);
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.executor_id, Some(2));
        assert_eq!(t.escrow_amount, Decimal::from(1500));

        TaskPatch::request_cancellation(now, Some("changed plans".into())).apply_to(&mut t, now);
        assert!(t.has_pending_cancellation());

        TaskPatch::reopen().apply_to(&mut t, now);
        assert_eq!(t.status, TaskStatus::Open);
        assert_eq!(t.executor_id, None);
        assert_eq!(t.escrow_amount, Decimal::ZERO);
        assert!(!t.has_pending_cancellation());
        assert_eq!(t.cancellation_reason, None);
    }

    #[test]
    fn complete_keeps_executor_and_stamps_time() {
        let mut t = task(TaskStatus::InProgress);
        t.executor_id = Some(2);
        t.escrow_amount = Decimal::from(1500);

        TaskPatch::complete().apply_to(&mut t, Utc::now());
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.executor_id, Some(2));
        assert_eq!(t.escrow_amount, Decimal::ZERO);
        assert!(t.completed_at.is_some());
    }

    #[test]
    fn ensure_status_reports_conflict() {
        let t = task(TaskStatus::Open);
        assert!(t.ensure_status(TaskStatus::Open).is_ok());
        assert!(matches!(
            t.ensure_status(TaskStatus::InProgress),
            Err(WalletError::Conflict(_))
        ));
    }

    #[test]
    fn guard_rejects_task_reaccepted_in_same_status() {
        let now = Utc::now();
        let mut t = task(TaskStatus::Open);
        TaskPatch::accept(2, Decimal::from(1500)).apply_to(&mut t, now);
        let snapshot = TaskGuard::of(&t);
        assert!(snapshot.check(&t).is_ok());

        // 취소 후 다른 실행자, 다른 금액으로 재수락
        TaskPatch::reopen().apply_to(&mut t, now);
        TaskPatch::accept(3, Decimal::from(600)).apply_to(&mut t, now);
        assert_eq!(t.status, snapshot.status);
        assert!(matches!(snapshot.check(&t), Err(WalletError::Conflict(_))));
    }

    #[test]
    fn guard_tracks_cancellation_request() {
        let now = Utc::now();
        let mut t = task(TaskStatus::Open);
        TaskPatch::accept(2, Decimal::from(1500)).apply_to(&mut t, now);
        TaskPatch::request_cancellation(now, None).apply_to(&mut t, now);
        let pending = TaskGuard::of(&t);

        TaskPatch::clear_cancellation().apply_to(&mut t, now);
        assert!(matches!(pending.check(&t), Err(WalletError::Conflict(_))));
    }
}
