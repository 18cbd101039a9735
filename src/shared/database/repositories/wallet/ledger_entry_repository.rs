use sqlx::{PgConnection, PgPool, Row};
use sqlx::postgres::PgRow;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use crate::domains::wallet::models::{Gateway, LedgerEntry, NewLedgerEntry, ReceiptAttach};

const ENTRY_COLUMNS: &str = "id, user_id, amount, kind, reason, gateway, gateway_payment_id, \
                             deal_id, task_id, status, receipt_id, created_at";

/// 원장 기록 저장소 (ledger_entries)
/// Ledger entry repository
pub struct LedgerEntryRepository {
    pool: PgPool,
}

impl LedgerEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 원장 기록 추가 (트랜잭션 내부)
    /// Insert an entry; a unique violation on (gateway, gateway_payment_id) surfaces as sqlx::Error
    pub async fn insert(conn: &mut PgConnection, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        let query = format!(
            r#"
            INSERT INTO ledger_entries
                (user_id, amount, kind, reason, gateway, gateway_payment_id, deal_id, task_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(entry.user_id.map(|id| id as i64))
            .bind(entry.amount)
            .bind(entry.kind.as_str())
            .bind(&entry.reason)
            .bind(entry.gateway.map(|g| g.as_str()))
            .bind(&entry.gateway_payment_id)
            .bind(&entry.deal_id)
            .bind(entry.task_id.map(|id| id as i64))
            .bind(&entry.status)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
            .context("Failed to insert ledger entry")?;

        map_entry(&row)
    }

    /// 게이트웨이 결제 ID로 조회 (유니크 인덱스 직접 조회)
    /// Direct lookup on the gateway correlation index
    pub async fn find_by_gateway(
        &self,
        gateway: Gateway,
        gateway_payment_id: &str,
    ) -> Result<Option<LedgerEntry>> {
        let query = format!(
            "SELECT {} FROM ledger_entries WHERE gateway = $1 AND gateway_payment_id = $2",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(gateway.as_str())
            .bind(gateway_payment_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch ledger entry by gateway payment id")?;

        row.map(|r| map_entry(&r)).transpose()
    }

    pub async fn list_for_user(&self, user_id: u64, limit: u32) -> Result<Vec<LedgerEntry>> {
        let query = format!(
            "SELECT {} FROM ledger_entries WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch ledger entries for user")?;

        rows.iter().map(map_entry).collect()
    }

    pub async fn list_for_task(&self, task_id: u64) -> Result<Vec<LedgerEntry>> {
        let query = format!(
            "SELECT {} FROM ledger_entries WHERE task_id = $1 ORDER BY id ASC",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(task_id as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch ledger entries for task")?;

        rows.iter().map(map_entry).collect()
    }

    /// 영수증 ID 연결 (receipt_id가 비어 있을 때만)
    /// Attach a receipt id; the row is locked so two callbacks cannot both attach
    pub async fn attach_receipt(&self, entry_id: u64, receipt_id: &str) -> Result<Option<ReceiptAttach>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let query = format!("SELECT {} FROM ledger_entries WHERE id = $1 FOR UPDATE", ENTRY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(entry_id as i64)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock ledger entry")?;

        let mut entry = match row {
            Some(r) => map_entry(&r)?,
            None => return Ok(None),
        };

        let result = match entry.receipt_id.clone() {
            Some(existing) if existing == receipt_id => ReceiptAttach::AlreadyAttached(entry),
            Some(existing) => ReceiptAttach::Mismatch { entry, existing },
            None => {
                sqlx::query("UPDATE ledger_entries SET receipt_id = $1 WHERE id = $2")
                    .bind(receipt_id)
                    .bind(entry_id as i64)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to attach receipt id")?;
                entry.receipt_id = Some(receipt_id.to_string());
                ReceiptAttach::Attached(entry)
            }
        };

        tx.commit().await.context("Failed to commit receipt attach")?;
        Ok(Some(result))
    }
}

fn map_entry(row: &PgRow) -> Result<LedgerEntry> {
    let kind: String = row.try_get("kind")?;
    let gateway: Option<String> = row.try_get("gateway")?;

    Ok(LedgerEntry {
        id: row.try_get::<i64, _>("id")? as u64,
        user_id: row.try_get::<Option<i64>, _>("user_id")?.map(|id| id as u64),
        amount: row.try_get("amount")?,
        kind: kind.parse().map_err(|e: String| anyhow!(e))?,
        reason: row.try_get("reason")?,
        gateway: gateway
            .map(|g| g.parse::<Gateway>())
            .transpose()
            .map_err(|e| anyhow!(e))?,
        gateway_payment_id: row.try_get("gateway_payment_id")?,
        deal_id: row.try_get("deal_id")?,
        task_id: row.try_get::<Option<i64>, _>("task_id")?.map(|id| id as u64),
        status: row.try_get("status")?,
        receipt_id: row.try_get("receipt_id")?,
        created_at: row.try_get("created_at")?,
    })
}
