use sqlx::{PgConnection, PgPool, Row};
use sqlx::postgres::PgRow;
use anyhow::{anyhow, Context, Result};
use crate::domains::escrow::models::{Dispute, DisputeOutcome, NewDispute};

const DISPUTE_COLUMNS: &str = "id, task_id, opened_by, reason, status, outcome, resolution_note, \
                               resolved_by, created_at, resolved_at";

/// 분쟁 저장소 (disputes)
pub struct DisputeRepository {
    pool: PgPool,
}

impl DisputeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 분쟁 생성 (task_id UNIQUE 위반 = 이미 분쟁 있음)
    pub async fn insert(conn: &mut PgConnection, dispute: &NewDispute) -> Result<Dispute> {
        let query = format!(
            r#"
            INSERT INTO disputes (task_id, opened_by, reason, status, created_at)
            VALUES ($1, $2, $3, 'open', NOW())
            RETURNING {}
            "#,
            DISPUTE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(dispute.task_id as i64)
            .bind(dispute.opened_by as i64)
            .bind(&dispute.reason)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to insert dispute")?;

        map_dispute(&row)
    }

    pub async fn lock(conn: &mut PgConnection, dispute_id: u64) -> Result<Option<Dispute>> {
        let query = format!("SELECT {} FROM disputes WHERE id = $1 FOR UPDATE", DISPUTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(dispute_id as i64)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock dispute")?;

        row.map(|r| map_dispute(&r)).transpose()
    }

    /// 열린 분쟁 존재 여부 (트랜잭션 내부, 작업 행 잠금 이후 호출)
    pub async fn has_open_for_task(conn: &mut PgConnection, task_id: u64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM disputes WHERE task_id = $1 AND status = 'open') AS has_open",
        )
        .bind(task_id as i64)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check open dispute")?;

        Ok(row.try_get("has_open")?)
    }

    pub async fn save(conn: &mut PgConnection, dispute: &Dispute) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE disputes
            SET status = $1, outcome = $2, resolution_note = $3, resolved_by = $4, resolved_at = $5
            WHERE id = $6
            "#,
        )
        .bind(dispute.status.as_str())
        .bind(dispute.outcome.map(|o| o.as_str()))
        .bind(&dispute.resolution_note)
        .bind(dispute.resolved_by.map(|id| id as i64))
        .bind(dispute.resolved_at)
        .bind(dispute.id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to update dispute")?;

        Ok(())
    }

    pub async fn get(&self, dispute_id: u64) -> Result<Option<Dispute>> {
        let query = format!("SELECT {} FROM disputes WHERE id = $1", DISPUTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(dispute_id as i64)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch dispute")?;

        row.map(|r| map_dispute(&r)).transpose()
    }

    pub async fn get_for_task(&self, task_id: u64) -> Result<Option<Dispute>> {
        let query = format!("SELECT {} FROM disputes WHERE task_id = $1", DISPUTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(task_id as i64)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch dispute for task")?;

        row.map(|r| map_dispute(&r)).transpose()
    }
}

fn map_dispute(row: &PgRow) -> Result<Dispute> {
    let status: String = row.try_get("status")?;
    let outcome: Option<String> = row.try_get("outcome")?;

    Ok(Dispute {
        id: row.try_get::<i64, _>("id")? as u64,
        task_id: row.try_get::<i64, _>("task_id")? as u64,
        opened_by: row.try_get::<i64, _>("opened_by")? as u64,
        reason: row.try_get("reason")?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        outcome: outcome
            .map(|o| o.parse::<DisputeOutcome>())
            .transpose()
            .map_err(|e| anyhow!(e))?,
        resolution_note: row.try_get("resolution_note")?,
        resolved_by: row.try_get::<Option<i64>, _>("resolved_by")?.map(|id| id as u64),
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}
