use sqlx::{PgPool, Row};
use anyhow::{Context, Result};
use crate::domains::catalog::models::Category;

/// 카테고리 저장소
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 전체 카테고리 (정렬 순서)
    pub async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT id, parent_id, name, slug, sort_order
            FROM categories
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch categories")?;

        rows.into_iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get::<i64, _>("id")? as u64,
                    parent_id: row.try_get::<Option<i64>, _>("parent_id")?.map(|id| id as u64),
                    name: row.try_get("name")?,
                    slug: row.try_get("slug")?,
                    sort_order: row.try_get("sort_order")?,
                })
            })
            .collect()
    }
}
