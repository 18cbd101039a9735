// Routes module: 라우팅 설정
// 역할: 모든 도메인의 라우터를 조합
// Routes module: combines all domain routers

use axum::Router;
use crate::shared::services::AppState;

// 각 도메인의 routes import
use crate::domains::wallet::routes::create_wallet_router;
use crate::domains::escrow::routes::{create_admin_router, create_task_router};
use crate::domains::payments::routes::{create_wallet_payments_router, create_webhook_router};
use crate::domains::catalog::routes::create_catalog_router;

/// Create main router (combines all domain routers)
/// 메인 라우터 생성 (모든 도메인 라우터 조합)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .nest(
            "/api/wallet",
            create_wallet_router().merge(create_wallet_payments_router()),
        )
        .nest("/api/tasks", create_task_router())
        .nest("/api/admin", create_admin_router())
        .nest("/api/payments", create_webhook_router())
        .nest("/api/categories", create_catalog_router())
}
