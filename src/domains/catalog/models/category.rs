use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 카테고리 / 하위 카테고리
/// Task category; subcategories point at their parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = Category)]
pub struct Category {
    pub id: u64,
    pub parent_id: Option<u64>,
    #[schema(example = "Design")]
    pub name: String,
    #[schema(example = "design")]
    pub slug: String,
    pub sort_order: i32,
}

/// 카테고리 목록 응답
#[derive(Debug, Serialize, ToSchema)]
#[schema(as = CategoriesResponse)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}
