use sqlx::{PgConnection, PgPool, Row};
use sqlx::postgres::PgRow;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use crate::domains::payments::models::{
    NewTBankPayment, NewTBankPayout, TBankDeal, TBankPayment, TBankPayout,
};

const DEAL_COLUMNS: &str = "id, user_id, deal_id, status, total_amount, paid_amount, \
                            remaining_balance, reserved_amount, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, order_id, user_id, deal_row_id, payment_id, amount, status, \
                               created_at, updated_at";
const PAYOUT_COLUMNS: &str = "id, user_id, deal_row_id, amount, status, is_final, gateway_payout_id, \
                              error_message, created_at, updated_at";

/// T-Bank 딜/결제/지급 저장소
/// T-Bank deal, payment and payout repository
pub struct TBankRepository {
    pool: PgPool,
}

impl TBankRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----- 딜 -----

    pub async fn get_open_deal(&self, user_id: u64) -> Result<Option<TBankDeal>> {
        let query = format!(
            "SELECT {} FROM tbank_deals WHERE user_id = $1 AND status = 'OPEN'",
            DEAL_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch open T-Bank deal")?;

        row.map(|r| map_deal(&r)).transpose()
    }

    /// OPEN 딜 조회 또는 생성
    /// 사용자당 OPEN 딜 유니크 인덱스로 동시 생성 방지
    pub async fn open_or_create_deal(&self, user_id: u64) -> Result<TBankDeal> {
        if let Some(deal) = self.get_open_deal(user_id).await? {
            return Ok(deal);
        }

        sqlx::query(
            r#"
            INSERT INTO tbank_deals (user_id, status, total_amount, paid_amount, remaining_balance,
                                     reserved_amount, created_at, updated_at)
            VALUES ($1, 'OPEN', 0, 0, 0, 0, $2, $2)
            ON CONFLICT (user_id) WHERE status = 'OPEN' DO NOTHING
            "#,
        )
        .bind(user_id as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to create T-Bank deal")?;

        self.get_open_deal(user_id)
            .await?
            .context("T-Bank deal missing after insert")
    }

    pub async fn lock_deal(conn: &mut PgConnection, deal_row_id: u64) -> Result<Option<TBankDeal>> {
        let query = format!("SELECT {} FROM tbank_deals WHERE id = $1 FOR UPDATE", DEAL_COLUMNS);
        let row = sqlx::query(&query)
            .bind(deal_row_id as i64)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock T-Bank deal")?;

        row.map(|r| map_deal(&r)).transpose()
    }

    pub async fn save_deal(conn: &mut PgConnection, deal: &TBankDeal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tbank_deals
            SET deal_id = $1, status = $2, total_amount = $3, paid_amount = $4,
                remaining_balance = $5, reserved_amount = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(&deal.deal_id)
        .bind(deal.status.as_str())
        .bind(deal.total_amount)
        .bind(deal.paid_amount)
        .bind(deal.remaining_balance)
        .bind(deal.reserved_amount)
        .bind(deal.updated_at)
        .bind(deal.id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to update T-Bank deal")?;

        Ok(())
    }

    // ----- 입금 결제 -----

    pub async fn create_payment(&self, payment: &NewTBankPayment) -> Result<TBankPayment> {
        let query = format!(
            r#"
            INSERT INTO tbank_payments (order_id, user_id, deal_row_id, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'NEW', $5, $5)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&payment.order_id)
            .bind(payment.user_id as i64)
            .bind(payment.deal_row_id as i64)
            .bind(payment.amount)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .context("Failed to create T-Bank payment")?;

        map_payment(&row)
    }

    pub async fn set_payment_id(&self, order_id: &str, payment_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE tbank_payments SET payment_id = $1, updated_at = $2 WHERE order_id = $3",
        )
        .bind(payment_id)
        .bind(Utc::now())
        .bind(order_id)
        .execute(&self.pool)
        .await
        .context("Failed to set T-Bank payment id")?;

        Ok(result.rows_affected())
    }

    pub async fn find_payment(&self, order_id: &str) -> Result<Option<TBankPayment>> {
        let query = format!("SELECT {} FROM tbank_payments WHERE order_id = $1", PAYMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch T-Bank payment")?;

        row.map(|r| map_payment(&r)).transpose()
    }

    pub async fn lock_payment(conn: &mut PgConnection, order_id: &str) -> Result<Option<TBankPayment>> {
        let query = format!(
            "SELECT {} FROM tbank_payments WHERE order_id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock T-Bank payment")?;

        row.map(|r| map_payment(&r)).transpose()
    }

    pub async fn save_payment(conn: &mut PgConnection, payment: &TBankPayment) -> Result<()> {
        sqlx::query(
            "UPDATE tbank_payments SET payment_id = $1, status = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&payment.payment_id)
        .bind(payment.status.as_str())
        .bind(payment.updated_at)
        .bind(payment.id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to update T-Bank payment")?;

        Ok(())
    }

    // ----- 지급 -----

    pub async fn insert_payout(conn: &mut PgConnection, payout: &NewTBankPayout) -> Result<TBankPayout> {
        let query = format!(
            r#"
            INSERT INTO tbank_payouts (user_id, deal_row_id, amount, status, is_final, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $5)
            RETURNING {}
            "#,
            PAYOUT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(payout.user_id as i64)
            .bind(payout.deal_row_id as i64)
            .bind(payout.amount)
            .bind(payout.is_final)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
            .context("Failed to insert T-Bank payout")?;

        map_payout(&row)
    }

    pub async fn lock_payout(conn: &mut PgConnection, payout_id: u64) -> Result<Option<TBankPayout>> {
        let query = format!("SELECT {} FROM tbank_payouts WHERE id = $1 FOR UPDATE", PAYOUT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(payout_id as i64)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to lock T-Bank payout")?;

        row.map(|r| map_payout(&r)).transpose()
    }

    pub async fn save_payout(conn: &mut PgConnection, payout: &TBankPayout) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tbank_payouts
            SET status = $1, gateway_payout_id = $2, error_message = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(payout.status.as_str())
        .bind(&payout.gateway_payout_id)
        .bind(&payout.error_message)
        .bind(payout.updated_at)
        .bind(payout.id as i64)
        .execute(&mut *conn)
        .await
        .context("Failed to update T-Bank payout")?;

        Ok(())
    }
}

fn map_deal(row: &PgRow) -> Result<TBankDeal> {
    let status: String = row.try_get("status")?;

    Ok(TBankDeal {
        id: row.try_get::<i64, _>("id")? as u64,
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        deal_id: row.try_get("deal_id")?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        total_amount: row.try_get("total_amount")?,
        paid_amount: row.try_get("paid_amount")?,
        remaining_balance: row.try_get("remaining_balance")?,
        reserved_amount: row.try_get("reserved_amount")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_payment(row: &PgRow) -> Result<TBankPayment> {
    let status: String = row.try_get("status")?;

    Ok(TBankPayment {
        id: row.try_get::<i64, _>("id")? as u64,
        order_id: row.try_get("order_id")?,
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        deal_row_id: row.try_get::<i64, _>("deal_row_id")? as u64,
        payment_id: row.try_get("payment_id")?,
        amount: row.try_get("amount")?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_payout(row: &PgRow) -> Result<TBankPayout> {
    let status: String = row.try_get("status")?;

    Ok(TBankPayout {
        id: row.try_get::<i64, _>("id")? as u64,
        user_id: row.try_get::<i64, _>("user_id")? as u64,
        deal_row_id: row.try_get::<i64, _>("deal_row_id")? as u64,
        amount: row.try_get("amount")?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        is_final: row.try_get("is_final")?,
        gateway_payout_id: row.try_get("gateway_payout_id")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
