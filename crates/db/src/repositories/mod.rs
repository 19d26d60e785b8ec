use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hrflow_core::audit::AuditEvent;
use hrflow_core::domain::employee::{DepartmentId, EmployeeId, EmployeeProfile};
use hrflow_core::domain::request::{RequestId, WorkflowRequest};
use hrflow_core::workflow::engine::DecisionOutcome;
use hrflow_core::workflow::states::{Decision, Stage, StageState};

pub mod audit;
pub mod employee;
pub mod memory;
pub mod request;

pub use audit::SqlAuditRepository;
pub use employee::SqlEmployeeDirectory;
pub use memory::{
    InMemoryAuditRepository, InMemoryEmployeeDirectory, InMemoryRequestRepository,
};
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request `{}` not found", .request_id.0)]
    RequestNotFound { request_id: RequestId },
    #[error("request `{}` already exists", .request_id.0)]
    DuplicateRequest { request_id: RequestId },
    #[error("compensatory credit for {worked_on} of `{}` is not available", .employee_id.0)]
    CreditUnavailable { employee_id: EmployeeId, worked_on: NaiveDate },
    #[error("stage {stage:?} of request `{}` is no longer pending", .request_id.0)]
    ConcurrentModification { request_id: RequestId, stage: Stage },
}

/// Derived status value stored beside each request for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    InProgress,
    Rejected,
    Completed,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub employee_id: Option<EmployeeId>,
    pub department_id: Option<DepartmentId>,
    pub status: Option<StatusFilter>,
    /// Requests whose active stage is this one.
    pub awaiting_stage: Option<Stage>,
    /// Inclusive range on the request's effective date.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    /// Clamps the limit into `1..=MAX_LIMIT`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        Self { limit, offset: offset.unwrap_or(0) }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// One row of a request's append-only decision history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub request_id: RequestId,
    pub stage: Stage,
    pub decision: Decision,
    pub actor_id: EmployeeId,
    pub previous: StageState,
    pub applied: StageState,
    pub remarks: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn from_outcome(
        outcome: &DecisionOutcome,
        decision: Decision,
        actor_id: EmployeeId,
    ) -> Self {
        let remarks = match outcome.applied {
            StageState::Rejected => outcome.request.remarks.clone(),
            _ => None,
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: outcome.request.id.clone(),
            stage: outcome.stage,
            decision,
            actor_id,
            previous: outcome.previous,
            applied: outcome.applied,
            remarks,
            decided_at: outcome.request.updated_at,
        }
    }
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Stores a new request. A compensatory leave also takes its credit, failing with
    /// `CreditUnavailable` when another live request already holds it.
    async fn insert(&self, request: &WorkflowRequest) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<WorkflowRequest>, RepositoryError>;

    async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<Page<WorkflowRequest>, RepositoryError>;

    /// Writes `updated` only if `record.stage` is still pending in storage, and appends
    /// `record` to the history in the same unit of work. A rejection gives back any held
    /// compensatory credit.
    async fn apply_update(
        &self,
        updated: &WorkflowRequest,
        record: &DecisionRecord,
    ) -> Result<(), RepositoryError>;

    async fn history(&self, id: &RequestId) -> Result<Vec<DecisionRecord>, RepositoryError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, user_id: &EmployeeId)
        -> Result<Option<EmployeeProfile>, RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), RepositoryError>;

    async fn list_for_request(&self, id: &RequestId) -> Result<Vec<AuditEvent>, RepositoryError>;
}

/// Decodes a snake_case enum stored as TEXT using its serde representation.
pub(crate) fn decode_enum<T: DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_value(serde_json::Value::String(value.to_owned()))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

pub(crate) fn decode_timestamp(
    column: &str,
    value: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

pub(crate) fn decode_date(column: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}
