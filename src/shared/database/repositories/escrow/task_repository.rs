use sqlx::{PgConnection, PgPool, Row};
use sqlx::postgres::PgRow;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use crate::domains::escrow::models::{NewTask, Task};
use crate::shared::database::store::ReciprocalDeals;

const TASK_COLUMNS: &str = "id, customer_id, executor_id, title, budget, escrow_amount, status, \
                            cancellation_requested_at, cancellation_reason, completed_at, created_at, updated_at";

/// 작업 저장소 (tasks)
/// Task repository
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        let query = format!(
            r#"
            INSERT INTO tasks (customer_id, title, budget, escrow_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, 0, 'open', $4, $4)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(task.customer_id as i64)
            .bind(&task.title)
            .bind(task.budget)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .context("Failed to create task")?;

        map_task(&row)
    }

    pub async fn get(&self, task_id: u64) -> Result<Option<Task>> {
        let query = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        let row = sqlx::query(&query)
            .bind(task_id as i64)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch task")?;

        row.map(|r| map_task(&r)).transpose()
    }

    /// 작업 행 잠금
    /// Lock the task row for a compare-and-set update
    pub async fn lock(conn: &mut PgConnection, task_id: u64) -> Result<Option<Task>> {
        let query = format!("SELECT {} FROM tasks WHERE id = $1 FOR UPDATE", TASK_COLUMNS);
        let row = sqlx::query(&query)
            .bind(task_id as i64)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock task")?;

        row.map(|r| map_task(&r)).transpose()
    }

    pub async fn save(conn: &mut PgConnection, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET executor_id = $1,
                escrow_amount = $2,
                status = $3,
                cancellation_requested_at = $4,
                cancellation_reason = $5,
                completed_at = $6,
                updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(task.executor_id.map(|id| id as i64))
        .bind(task.escrow_amount)
        .bind(task.status.as_str())
        .bind(task.cancellation_requested_at)
        .bind(&task.cancellation_reason)
        .bind(task.completed_at)
        .bind(task.updated_at)
        .bind(task.id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to update task")?;

        Ok(())
    }

    /// 양방향 완료 작업 집계
    /// Completed tasks per counterparty, only where both directions exist
    pub async fn reciprocal_deals(
        &self,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReciprocalDeals>> {
        let rows = sqlx::query(
            r#"
            SELECT counterparty_id,
                   COUNT(*) FILTER (WHERE as_customer) AS as_customer,
                   COUNT(*) FILTER (WHERE NOT as_customer) AS as_executor
            FROM (
                SELECT CASE WHEN customer_id = $1 THEN executor_id ELSE customer_id END AS counterparty_id,
                       customer_id = $1 AS as_customer
                FROM tasks
                WHERE status = 'completed'
                  AND completed_at >= $2
                  AND executor_id IS NOT NULL
                  AND (customer_id = $1 OR executor_id = $1)
            ) t
            GROUP BY counterparty_id
            HAVING COUNT(*) FILTER (WHERE as_customer) > 0
               AND COUNT(*) FILTER (WHERE NOT as_customer) > 0
            ORDER BY counterparty_id
            "#,
        )
        .bind(user_id as i64)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("Failed to count reciprocal deals")?;

        rows.iter()
            .map(|row| {
                let as_customer: i64 = row.try_get("as_customer")?;
                let as_executor: i64 = row.try_get("as_executor")?;
                Ok(ReciprocalDeals {
                    counterparty_id: row.try_get::<i64, _>("counterparty_id")? as u64,
                    completed_tasks: (as_customer + as_executor) as u32,
                })
            })
            .collect()
    }
}

fn map_task(row: &PgRow) -> Result<Task> {
    let status: String = row.try_get("status")?;

    Ok(Task {
        id: row.try_get::<i64, _>("id")? as u64,
        customer_id: row.try_get::<i64, _>("customer_id")? as u64,
        executor_id: row.try_get::<Option<i64>, _>("executor_id")?.map(|id| id as u64),
        title: row.try_get("title")?,
        budget: row.try_get("budget")?,
        escrow_amount: row.try_get("escrow_amount")?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        cancellation_requested_at: row.try_get("cancellation_requested_at")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
