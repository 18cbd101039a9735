use crate::domains::catalog::models::CategoriesResponse;
use crate::shared::services::AppState;
use crate::shared::errors::WalletError;
use axum::{extract::State, http::StatusCode, Json};

/// 카테고리 목록 (캐시)
/// List task categories
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories retrieved", body = CategoriesResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(app_state): State<AppState>,
) -> Result<Json<CategoriesResponse>, (StatusCode, Json<serde_json::Value>)> {
    let categories = app_state
        .catalog_state
        .category_cache
        .categories()
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(CategoriesResponse {
        categories: categories.as_ref().clone(),
    }))
}
