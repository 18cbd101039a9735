// Escrow domain routes
// 에스크로 도메인 라우터
use axum::{routing::{get, post}, Router};
use crate::domains::escrow::handlers::escrow_handler;
use crate::shared::services::AppState;

/// Create task router (/api/tasks)
pub fn create_task_router() -> Router<AppState> {
    Router::new()
        .route("/", post(escrow_handler::create_task))
        .route("/:id", get(escrow_handler::get_task))
        .route("/:id/accept", post(escrow_handler::accept_executor))
        .route("/:id/cancel", post(escrow_handler::cancel_task))
        .route("/:id/cancellation", post(escrow_handler::request_cancellation))
        .route("/:id/cancellation/respond", post(escrow_handler::respond_cancellation))
        .route("/:id/complete", post(escrow_handler::complete_task))
        .route("/:id/dispute", post(escrow_handler::open_dispute))
}

/// Create admin router (/api/admin)
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/disputes/:id/resolve", post(escrow_handler::resolve_dispute))
}
