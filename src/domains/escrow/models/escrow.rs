use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use rust_decimal::Decimal;
use crate::domains::escrow::models::{Dispute, DisputeOutcome, EscrowReservation, Task};
use crate::domains::wallet::models::{LedgerEntry, MoneyInput};

/// 작업 생성 요청
/// Create task request
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = CreateTaskRequest)]
pub struct CreateTaskRequest {
    #[schema(example = "Design a logo")]
    pub title: String,

    #[schema(value_type = String, example = "1500.00")]
    pub budget: MoneyInput,
}

/// 실행자 수락 요청
/// Accept executor request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = AcceptExecutorRequest)]
pub struct AcceptExecutorRequest {
    #[schema(example = 2)]
    pub executor_id: u64,

    /// 합의 가격 (없으면 작업 예산)
    /// Agreed price, defaults to the task budget
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub price: Option<MoneyInput>,
}

/// 협의 취소 요청
#[derive(Debug, Default, Deserialize, ToSchema)]
#[schema(as = CancellationRequestBody)]
pub struct CancellationRequestBody {
    pub reason: Option<String>,
}

/// 실행자의 취소 요청 응답
/// Executor's answer to a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancellationAction {
    Accept,
    Dispute,
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = CancellationRespondRequest)]
pub struct CancellationRespondRequest {
    pub action: CancellationAction,
}

/// 분쟁 생성 요청
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = OpenDisputeRequest)]
pub struct OpenDisputeRequest {
    #[schema(example = "Work was not delivered")]
    pub reason: String,
}

/// 분쟁 해결 요청 (관리자)
/// Resolve dispute request (admin)
#[derive(Debug, Deserialize, ToSchema)]
#[schema(as = ResolveDisputeRequest)]
pub struct ResolveDisputeRequest {
    pub outcome: DisputeOutcome,
    pub note: Option<String>,
}

/// 작업 조회 응답
#[derive(Debug, Serialize, ToSchema)]
#[schema(as = TaskResponse)]
pub struct TaskResponse {
    pub task: Task,
    pub reservations: Vec<EscrowReservation>,
    pub dispute: Option<Dispute>,
}

/// 작업 상태 전이 응답
/// Response of a task lifecycle transition
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = TaskActionResponse)]
pub struct TaskActionResponse {
    pub success: bool,
    pub task: Task,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 작업 완료 응답
/// Completion response with the commission split
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = CompletionResponse)]
pub struct CompletionResponse {
    pub success: bool,
    pub task: Task,

    /// 실행자 수령액
    #[schema(value_type = String, example = "1350.00")]
    pub payout: Decimal,

    /// 플랫폼 수수료
    #[schema(value_type = String, example = "150.00")]
    pub commission: Decimal,

    pub entries: Vec<LedgerEntry>,
}

/// 분쟁 생성/해결 응답
#[derive(Debug, Serialize, ToSchema)]
#[schema(as = DisputeResponse)]
pub struct DisputeResponse {
    pub success: bool,
    pub dispute: Dispute,
    pub task: Task,
}
