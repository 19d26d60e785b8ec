use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::employee::EmployeeId;
use crate::domain::request::{RequestId, RequestType, WorkflowRequest};
use crate::workflow::engine::DecisionOutcome;
use crate::workflow::sequence::outcome;
use crate::workflow::states::{RequestOutcome, Stage, StageState, StageStatus};

/// Status snapshot pushed to the requester after a change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub request_id: RequestId,
    pub requester_id: EmployeeId,
    pub request_type: RequestType,
    pub event: NotificationEvent,
    pub stage_status: StageStatus,
    pub outcome: RequestOutcome,
    pub remarks: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    Submitted,
    StageDecided { stage: Stage, applied: StageState },
}

impl StatusNotification {
    pub fn submitted(request: &WorkflowRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            requester_id: request.requester_id.clone(),
            request_type: request.request_type,
            event: NotificationEvent::Submitted,
            stage_status: request.stage_status,
            outcome: outcome(request),
            remarks: None,
            occurred_at: request.created_at,
        }
    }

    pub fn decided(decision: &DecisionOutcome) -> Self {
        let request = &decision.request;
        Self {
            request_id: request.id.clone(),
            requester_id: request.requester_id.clone(),
            request_type: request.request_type,
            event: NotificationEvent::StageDecided {
                stage: decision.stage,
                applied: decision.applied,
            },
            stage_status: request.stage_status,
            outcome: decision.outcome.clone(),
            remarks: request.remarks.clone(),
            occurred_at: request.updated_at,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification endpoint rejected the payload with status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: StatusNotification) -> Result<(), NotifyError>;
}

/// Writes notifications to the structured log only.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: StatusNotification) -> Result<(), NotifyError> {
        info!(
            event_name = "notify.status_changed",
            request_id = %notification.request_id.0,
            requester_id = %notification.requester_id.0,
            status = notification.outcome.status_label(),
            "request status changed"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<StatusNotification>>>,
    fail_with: Option<NotifyError>,
}

impl InMemoryNotifier {
    pub fn failing(error: NotifyError) -> Self {
        Self { sent: Arc::default(), fail_with: Some(error) }
    }

    pub fn sent(&self) -> Vec<StatusNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: StatusNotification) -> Result<(), NotifyError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use super::{InMemoryNotifier, NotificationEvent, Notifier, NotifyError, StatusNotification};
    use crate::domain::employee::{DepartmentId, EmployeeId, Role};
    use crate::domain::request::{
        PunchDirection, PunchMissedDetails, RequestId, RequestPayload, RequestType,
        WorkflowRequest,
    };
    use crate::workflow::engine::WorkflowEngine;
    use crate::workflow::states::{Decision, Stage, StageState, StageStatus};

    fn punch_missed() -> WorkflowRequest {
        WorkflowRequest {
            id: RequestId("PM-1".to_string()),
            requester_id: EmployeeId("E-100".to_string()),
            department_id: DepartmentId("OPS".to_string()),
            request_type: RequestType::PunchMissed,
            payload: RequestPayload::PunchMissed(PunchMissedDetails {
                date: NaiveDate::from_ymd_opt(2026, 2, 27).expect("date"),
                punch: PunchDirection::Out,
                claimed_time: NaiveTime::from_hms_opt(18, 30, 0).expect("time"),
                reason: "forgot to punch out".to_string(),
            }),
            stage_status: StageStatus::all_pending(),
            remarks: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn decided_notification_carries_stage_and_snapshot() {
        let decided = WorkflowEngine::new()
            .apply(&punch_missed(), Role::Hod, Decision::Approve, None)
            .expect("hod approves");
        let notifier = InMemoryNotifier::default();

        notifier.notify(StatusNotification::decided(&decided)).await.expect("notify");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].event,
            NotificationEvent::StageDecided { stage: Stage::Hod, applied: StageState::Approved }
        );
        assert_eq!(sent[0].stage_status.hod, StageState::Approved);
    }

    #[tokio::test]
    async fn failing_notifier_surfaces_error_without_recording() {
        let notifier = InMemoryNotifier::failing(NotifyError::Transport("offline".to_string()));

        let result = notifier.notify(StatusNotification::submitted(&punch_missed())).await;

        assert!(result.is_err());
        assert!(notifier.sent().is_empty());
    }
}
