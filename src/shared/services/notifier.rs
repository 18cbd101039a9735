use async_trait::async_trait;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::PgPool;

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAccepted,
    TaskCancelled,
    CancellationRequested,
    CancellationAccepted,
    DisputeOpened,
    DisputeResolved,
    TaskCompleted,
    AdminAlert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskAccepted => "task_accepted",
            NotificationKind::TaskCancelled => "task_cancelled",
            NotificationKind::CancellationRequested => "cancellation_requested",
            NotificationKind::CancellationAccepted => "cancellation_accepted",
            NotificationKind::DisputeOpened => "dispute_opened",
            NotificationKind::DisputeResolved => "dispute_resolved",
            NotificationKind::TaskCompleted => "task_completed",
            NotificationKind::AdminAlert => "admin_alert",
        }
    }
}

/// 사용자 알림
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// None = 관리자 알림
    pub user_id: Option<u64>,
    pub kind: NotificationKind,
    pub message: String,
    pub task_id: Option<u64>,
}

impl Notification {
    pub fn to_user(user_id: u64, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            kind,
            message: message.into(),
            task_id: None,
        }
    }

    pub fn for_task(mut self, task_id: u64) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

/// 알림 발송
/// 실패해도 호출한 작업은 성공으로 처리 (notify_quietly 사용)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;

    async fn alert_admins(&self, message: &str) -> Result<()>;
}

/// 알림 발송, 실패는 로그만
pub async fn notify_quietly(notifier: &dyn Notifier, notification: Notification) {
    let kind = notification.kind.as_str();
    let user_id = notification.user_id;
    if let Err(e) = notifier.notify(notification).await {
        tracing::warn!(error = %e, kind, ?user_id, "failed to send notification");
    }
}

/// 관리자 알림 발송, 실패는 로그만
pub async fn alert_admins_quietly(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.alert_admins(message).await {
        tracing::warn!(error = %e, "failed to alert admins");
    }
}

/// notifications 테이블에 기록
pub struct DbNotifier {
    pool: PgPool,
}

impl DbNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for DbNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, message, task_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW())
            "#,
        )
        .bind(notification.user_id.map(|id| id as i64))
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.task_id.map(|id| id as i64))
        .execute(&self.pool)
        .await
        .context("Failed to insert notification")?;

        Ok(())
    }

    /// 관리자마다 한 건, 관리자가 없으면 user_id NULL 한 건
    async fn alert_admins(&self, message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, message, is_read, created_at)
            SELECT id, 'admin_alert', $1, FALSE, NOW() FROM users WHERE is_admin
            "#,
        )
        .bind(message)
        .execute(&self.pool)
        .await
        .context("Failed to insert admin alerts")?;

        if result.rows_affected() == 0 {
            self.notify(Notification {
                user_id: None,
                kind: NotificationKind::AdminAlert,
                message: message.to_string(),
                task_id: None,
            })
            .await?;
        }

        Ok(())
    }
}

/// 메모리 기록 (테스트 / 로컬 실행)
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: Mutex<bool>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn admin_alerts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.kind == NotificationKind::AdminAlert)
            .map(|n| n.message.clone())
            .collect()
    }

    /// 이후 모든 발송을 실패시킴
    pub fn fail_all(&self) {
        *self.fail.lock() = true;
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        if *self.fail.lock() {
            anyhow::bail!("notification channel unavailable");
        }
        self.sent.lock().push(notification);
        Ok(())
    }

    async fn alert_admins(&self, message: &str) -> Result<()> {
        self.notify(Notification {
            user_id: None,
            kind: NotificationKind::AdminAlert,
            message: message.to_string(),
            task_id: None,
        })
        .await
    }
}
