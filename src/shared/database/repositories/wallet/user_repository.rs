use sqlx::{PgConnection, PgPool, Row};
use sqlx::postgres::PgRow;
use anyhow::{Context, Result};
use chrono::Utc;
use crate::domains::wallet::models::UserBalance;

/// 사용자 잔고 저장소 (users.balance / users.frozen_balance)
/// User balance repository
pub struct UserBalanceRepository {
    pool: PgPool,
}

impl UserBalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 잔고 조회 (잠금 없음)
    /// Get balance without locking
    pub async fn get(&self, user_id: u64) -> Result<Option<UserBalance>> {
        let row = sqlx::query(
            r#"
            SELECT id, balance, frozen_balance, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user balance")?;

        row.map(|r| map_user(&r)).transpose()
    }

    /// 여러 사용자 행 잠금 (id 순서)
    /// Lock user rows in id order and return their fresh balances
    pub async fn lock_many(conn: &mut PgConnection, user_ids: &[u64]) -> Result<Vec<UserBalance>> {
        let ids: Vec<i64> = user_ids.iter().map(|id| *id as i64).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, balance, frozen_balance, created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to lock user balances")?;

        rows.iter().map(map_user).collect()
    }

    /// 잠긴 행의 잔고 저장
    /// Persist balances computed under the row lock
    pub async fn save(conn: &mut PgConnection, user: &UserBalance) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET balance = $1, frozen_balance = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(user.balance)
        .bind(user.frozen_balance)
        .bind(Utc::now())
        .bind(user.user_id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to update user balance")?;

        Ok(())
    }
}

fn map_user(row: &PgRow) -> Result<UserBalance> {
    Ok(UserBalance {
        user_id: row.try_get::<i64, _>("id")? as u64,
        balance: row.try_get("balance")?,
        frozen_balance: row.try_get("frozen_balance")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
