use crate::domains::escrow::models::{
    AcceptExecutorRequest, CancellationRequestBody, CancellationRespondRequest, CompletionResponse,
    CreateTaskRequest, DisputeResponse, OpenDisputeRequest, ResolveDisputeRequest,
    TaskActionResponse, TaskResponse,
};
use crate::shared::services::AppState;
use crate::shared::middleware::auth::{AdminUser, AuthenticatedUser};
use crate::shared::errors::WalletError;
use axum::{extract::{Path, State}, http::StatusCode, Json};

/// 작업 생성 핸들러
/// Create task handler
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskActionResponse),
        (status = 400, description = "Invalid title or budget"),
        (status = 401, description = "Unauthorized (missing or invalid token)")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn create_task(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskActionResponse>), (StatusCode, Json<serde_json::Value>)> {
    let task = app_state
        .escrow_state
        .escrow_service
        .create_task(authenticated_user.user_id, &request.title, &request.budget)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok((
        StatusCode::CREATED,
        Json(TaskActionResponse {
            success: true,
            task,
            message: None,
        }),
    ))
}

/// 작업 조회 핸들러 (예약, 분쟁 포함)
/// Get task with escrow reservations
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task retrieved", body = TaskResponse),
        (status = 403, description = "Not a participant of the task"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn get_task(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<serde_json::Value>)> {
    let details = app_state
        .escrow_state
        .escrow_service
        .get_task(authenticated_user.user_id, authenticated_user.is_admin, task_id)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TaskResponse {
        task: details.task,
        reservations: details.reservations,
        dispute: details.dispute,
    }))
}

/// 실행자 수락 핸들러 (에스크로 동결)
/// Accept executor handler (freezes the price)
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/accept",
    params(("id" = u64, Path, description = "Task ID")),
    request_body = AcceptExecutorRequest,
    responses(
        (status = 200, description = "Executor accepted, escrow frozen", body = TaskActionResponse),
        (status = 400, description = "Insufficient funds, invalid price or task not open"),
        (status = 403, description = "Not the task customer"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn accept_executor(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
    Json(request): Json<AcceptExecutorRequest>,
) -> Result<Json<TaskActionResponse>, (StatusCode, Json<serde_json::Value>)> {
    let task = app_state
        .escrow_state
        .escrow_service
        .accept_executor(
            authenticated_user.user_id,
            task_id,
            request.executor_id,
            request.price.as_ref(),
        )
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TaskActionResponse {
        success: true,
        task,
        message: None,
    }))
}

/// 고객 취소 핸들러 (환불)
/// Customer cancel handler (refunds the escrow)
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/cancel",
    params(("id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task cancelled, escrow refunded", body = TaskActionResponse),
        (status = 400, description = "Task not in progress or dispute open"),
        (status = 403, description = "Not the task customer"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn cancel_task(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
) -> Result<Json<TaskActionResponse>, (StatusCode, Json<serde_json::Value>)> {
    let task = app_state
        .escrow_state
        .escrow_service
        .cancel_task(authenticated_user.user_id, task_id)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TaskActionResponse {
        success: true,
        task,
        message: None,
    }))
}

/// 협의 취소 요청 핸들러
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/cancellation",
    params(("id" = u64, Path, description = "Task ID")),
    request_body = CancellationRequestBody,
    responses(
        (status = 200, description = "Cancellation requested", body = TaskActionResponse),
        (status = 400, description = "Request already pending or dispute open"),
        (status = 403, description = "Not the task customer")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn request_cancellation(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
    Json(request): Json<CancellationRequestBody>,
) -> Result<Json<TaskActionResponse>, (StatusCode, Json<serde_json::Value>)> {
    let task = app_state
        .escrow_state
        .escrow_service
        .request_cancellation(authenticated_user.user_id, task_id, request.reason)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TaskActionResponse {
        success: true,
        task,
        message: None,
    }))
}

/// 협의 취소 응답 핸들러 (실행자)
/// Executor response: accept → refund, dispute → open a dispute next
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/cancellation/respond",
    params(("id" = u64, Path, description = "Task ID")),
    request_body = CancellationRespondRequest,
    responses(
        (status = 200, description = "Response recorded", body = TaskActionResponse),
        (status = 400, description = "No pending cancellation request"),
        (status = 403, description = "Not the assigned executor")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn respond_cancellation(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
    Json(request): Json<CancellationRespondRequest>,
) -> Result<Json<TaskActionResponse>, (StatusCode, Json<serde_json::Value>)> {
    let response = app_state
        .escrow_state
        .escrow_service
        .respond_cancellation(authenticated_user.user_id, task_id, request.action)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(TaskActionResponse {
        success: true,
        task: response.task,
        message: response.message,
    }))
}

/// 작업 완료 핸들러 (지급 + 수수료)
/// Complete task handler (payout minus platform commission)
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/complete",
    params(("id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task completed, executor paid", body = CompletionResponse),
        (status = 400, description = "Task not in progress or dispute open"),
        (status = 403, description = "Not the task customer"),
        (status = 404, description = "Task not found")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn complete_task(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
) -> Result<Json<CompletionResponse>, (StatusCode, Json<serde_json::Value>)> {
    let completion = app_state
        .escrow_state
        .escrow_service
        .complete_task(authenticated_user.user_id, task_id)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(CompletionResponse {
        success: true,
        task: completion.task,
        payout: completion.payout,
        commission: completion.commission,
        entries: completion.entries,
    }))
}

/// 분쟁 생성 핸들러
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/dispute",
    params(("id" = u64, Path, description = "Task ID")),
    request_body = OpenDisputeRequest,
    responses(
        (status = 200, description = "Dispute opened", body = DisputeResponse),
        (status = 400, description = "Task not in progress or dispute already exists"),
        (status = 403, description = "Not a participant of the task")
    ),
    tag = "Tasks",
    security(("BearerAuth" = []))
)]
pub async fn open_dispute(
    State(app_state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(task_id): Path<u64>,
    Json(request): Json<OpenDisputeRequest>,
) -> Result<Json<DisputeResponse>, (StatusCode, Json<serde_json::Value>)> {
    let result = app_state
        .escrow_state
        .escrow_service
        .open_dispute(authenticated_user.user_id, task_id, &request.reason)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(DisputeResponse {
        success: true,
        dispute: result.dispute,
        task: result.task,
    }))
}

/// 분쟁 해결 핸들러 (관리자)
/// Resolve dispute handler (admin only)
#[utoipa::path(
    post,
    path = "/api/admin/disputes/{id}/resolve",
    params(("id" = u64, Path, description = "Dispute ID")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "Dispute resolved", body = DisputeResponse),
        (status = 400, description = "Dispute already resolved"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Dispute not found")
    ),
    tag = "Admin",
    security(("BearerAuth" = []))
)]
pub async fn resolve_dispute(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(dispute_id): Path<u64>,
    Json(request): Json<ResolveDisputeRequest>,
) -> Result<Json<DisputeResponse>, (StatusCode, Json<serde_json::Value>)> {
    let result = app_state
        .escrow_state
        .escrow_service
        .resolve_dispute(admin.user_id, dispute_id, request.outcome, request.note)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(DisputeResponse {
        success: true,
        dispute: result.dispute,
        task: result.task,
    }))
}
