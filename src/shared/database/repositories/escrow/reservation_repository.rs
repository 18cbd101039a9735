use sqlx::{PgConnection, PgPool, Row};
use sqlx::postgres::PgRow;
use anyhow::{anyhow, Context, Result};
use crate::domains::escrow::models::{EscrowReservation, NewReservation, ReleaseKind};

const RESERVATION_COLUMNS: &str = "id, task_id, customer_id, amount, reason, release_kind, \
                                   release_reason, created_at, released_at";

/// 에스크로 예약 저장소 (escrow_reservations)
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(conn: &mut PgConnection, reservation: &NewReservation) -> Result<EscrowReservation> {
        let query = format!(
            r#"
            INSERT INTO escrow_reservations (task_id, customer_id, amount, reason, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(reservation.task_id as i64)
            .bind(reservation.customer_id as i64)
            .bind(reservation.amount)
            .bind(&reservation.reason)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to insert escrow reservation")?;

        map_reservation(&row)
    }

    /// 작업의 열린 예약 잠금
    pub async fn lock_open(conn: &mut PgConnection, task_id: u64) -> Result<Option<EscrowReservation>> {
        let query = format!(
            "SELECT {} FROM escrow_reservations WHERE task_id = $1 AND released_at IS NULL FOR UPDATE",
            RESERVATION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(task_id as i64)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock escrow reservation")?;

        row.map(|r| map_reservation(&r)).transpose()
    }

    pub async fn save_release(conn: &mut PgConnection, reservation: &EscrowReservation) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE escrow_reservations
            SET release_kind = $1, release_reason = $2, released_at = $3
            WHERE id = $4
            "#,
        )
        .bind(reservation.release_kind.map(|k| k.as_str()))
        .bind(&reservation.release_reason)
        .bind(reservation.released_at)
        .bind(reservation.id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to release escrow reservation")?;

        Ok(())
    }

    pub async fn list_for_task(&self, task_id: u64) -> Result<Vec<EscrowReservation>> {
        let query = format!(
            "SELECT {} FROM escrow_reservations WHERE task_id = $1 ORDER BY id ASC",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(task_id as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch escrow reservations")?;

        rows.iter().map(map_reservation).collect()
    }
}

fn map_reservation(row: &PgRow) -> Result<EscrowReservation> {
    let release_kind: Option<String> = row.try_get("release_kind")?;

    Ok(EscrowReservation {
        id: row.try_get::<i64, _>("id")? as u64,
        task_id: row.try_get::<i64, _>("task_id")? as u64,
        customer_id: row.try_get::<i64, _>("customer_id")? as u64,
        amount: row.try_get("amount")?,
        reason: row.try_get("reason")?,
        release_kind: release_kind
            .map(|k| k.parse::<ReleaseKind>())
            .transpose()
            .map_err(|e| anyhow!(e))?,
        release_reason: row.try_get("release_reason")?,
        created_at: row.try_get("created_at")?,
        released_at: row.try_get("released_at")?,
    })
}
