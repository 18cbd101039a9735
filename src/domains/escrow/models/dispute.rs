use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use crate::shared::errors::WalletError;

/// 분쟁 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for DisputeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(DisputeStatus::Open),
            "resolved" => Ok(DisputeStatus::Resolved),
            other => Err(format!("unknown dispute status: {}", other)),
        }
    }
}

/// 분쟁 결과 (누구의 손을 들어주었는지)
/// Which party the dispute was resolved in favor of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// 고객 승: 에스크로 환불, 작업 open 복귀
    Customer,
    /// 실행자 승: 수수료 제외 후 지급, 작업 completed
    Executor,
}

impl DisputeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeOutcome::Customer => "customer",
            DisputeOutcome::Executor => "executor",
        }
    }
}

impl fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisputeOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(DisputeOutcome::Customer),
            "executor" => Ok(DisputeOutcome::Executor),
            other => Err(format!("unknown dispute outcome: {}", other)),
        }
    }
}

/// 분쟁 (작업당 최대 1개)
/// Dispute, at most one per task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(as = Dispute)]
pub struct Dispute {
    pub id: u64,
    pub task_id: u64,

    /// 분쟁을 연 사용자 (고객 또는 실행자)
    pub opened_by: u64,

    pub reason: String,
    pub status: DisputeStatus,
    pub outcome: Option<DisputeOutcome>,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    pub fn is_open(&self) -> bool {
        self.status == DisputeStatus::Open
    }

    pub fn resolve(
        &mut self,
        outcome: DisputeOutcome,
        resolved_by: u64,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        if !self.is_open() {
            return Err(WalletError::Conflict(format!(
                "Dispute {} is already resolved",
                self.id
            )));
        }
        self.status = DisputeStatus::Resolved;
        self.outcome = Some(outcome);
        self.resolved_by = Some(resolved_by);
        self.resolution_note = note;
        self.resolved_at = Some(now);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDispute {
    pub task_id: u64,
    pub opened_by: u64,
    pub reason: String,
}

impl NewDispute {
    pub fn into_dispute(self, id: u64, created_at: DateTime<Utc>) -> Dispute {
        Dispute {
            id,
            task_id: self.task_id,
            opened_by: self.opened_by,
            reason: self.reason,
            status: DisputeStatus::Open,
            outcome: None,
            resolution_note: None,
            resolved_by: None,
            created_at,
            resolved_at: None,
        }
    }
}
