// Catalog domain routes
use axum::{routing::get, Router};
use crate::domains::catalog::handlers::category_handler;
use crate::shared::services::AppState;

/// Create catalog router (/api/categories)
pub fn create_catalog_router() -> Router<AppState> {
    Router::new().route("/", get(category_handler::list_categories))
}
