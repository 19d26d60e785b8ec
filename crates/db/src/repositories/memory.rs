use std::collections::HashMap;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use hrflow_core::audit::AuditEvent;
use hrflow_core::domain::employee::{EmployeeId, EmployeeProfile};
use hrflow_core::domain::request::{RequestId, WorkflowRequest};
use hrflow_core::workflow::sequence::outcome;
use hrflow_core::workflow::states::{RequestOutcome, StageState};

use super::{
    AuditRepository, DecisionRecord, IdentityProvider, Page, PageRequest, RepositoryError,
    RequestFilter, RequestRepository, StatusFilter,
};

#[derive(Default)]
struct RequestState {
    requests: HashMap<String, WorkflowRequest>,
    history: HashMap<String, Vec<DecisionRecord>>,
}

#[derive(Default)]
pub struct InMemoryRequestRepository {
    state: RwLock<RequestState>,
}

fn matches_filter(request: &WorkflowRequest, filter: &RequestFilter) -> bool {
    let current = outcome(request);
    let status_matches = match (filter.status, &current) {
        (None, _) => true,
        (Some(StatusFilter::InProgress), RequestOutcome::InProgress { .. }) => true,
        (Some(StatusFilter::Rejected), RequestOutcome::Rejected { .. }) => true,
        (Some(StatusFilter::Completed), RequestOutcome::Completed) => true,
        _ => false,
    };
    let effective = request.payload.effective_date();

    filter.employee_id.as_ref().map_or(true, |id| *id == request.requester_id)
        && filter.department_id.as_ref().map_or(true, |id| *id == request.department_id)
        && status_matches
        && filter.awaiting_stage.map_or(true, |stage| current.active_stage() == Some(stage))
        && filter.date_range.map_or(true, |(from, to)| from <= effective && effective <= to)
}

/// Every request that is not rejected keeps its credit.
fn holds_credit(
    stored: &WorkflowRequest,
    incoming: &WorkflowRequest,
    worked_on: NaiveDate,
) -> bool {
    stored.requester_id == incoming.requester_id
        && stored.payload.compensated_for() == Some(worked_on)
        && !matches!(outcome(stored), RequestOutcome::Rejected { .. })
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn insert(&self, request: &WorkflowRequest) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.requests.contains_key(&request.id.0) {
            return Err(RepositoryError::DuplicateRequest { request_id: request.id.clone() });
        }
        if let Some(worked_on) = request.payload.compensated_for() {
            if state.requests.values().any(|stored| holds_credit(stored, request, worked_on)) {
                return Err(RepositoryError::CreditUnavailable {
                    employee_id: request.requester_id.clone(),
                    worked_on,
                });
            }
        }
        state.requests.insert(request.id.0.clone(), request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<WorkflowRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.requests.get(&id.0).cloned())
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<Page<WorkflowRequest>, RepositoryError> {
        let state = self.state.read().await;
        let mut matching: Vec<WorkflowRequest> = state
            .requests
            .values()
            .filter(|request| matches_filter(request, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.0.cmp(&b.id.0)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page { items, total, limit: page.limit, offset: page.offset })
    }

    async fn apply_update(
        &self,
        updated: &WorkflowRequest,
        record: &DecisionRecord,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .requests
            .get(&updated.id.0)
            .ok_or_else(|| RepositoryError::RequestNotFound { request_id: updated.id.clone() })?;
        if stored.stage_status.get(record.stage) != StageState::Pending {
            return Err(RepositoryError::ConcurrentModification {
                request_id: updated.id.clone(),
                stage: record.stage,
            });
        }

        state.requests.insert(updated.id.0.clone(), updated.clone());
        state.history.entry(updated.id.0.clone()).or_default().push(record.clone());
        Ok(())
    }

    async fn history(&self, id: &RequestId) -> Result<Vec<DecisionRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.history.get(&id.0).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryEmployeeDirectory {
    profiles: RwLock<HashMap<String, EmployeeProfile>>,
}

impl InMemoryEmployeeDirectory {
    pub fn with_profiles(profiles: impl IntoIterator<Item = EmployeeProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.actor.user_id.0.clone(), profile))
            .collect();
        Self { profiles: RwLock::new(profiles) }
    }

    pub async fn save(&self, profile: EmployeeProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.actor.user_id.0.clone(), profile);
    }
}

#[async_trait::async_trait]
impl IdentityProvider for InMemoryEmployeeDirectory {
    async fn resolve(
        &self,
        user_id: &EmployeeId,
    ) -> Result<Option<EmployeeProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&user_id.0).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditRepository {
    pub async fn all(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn record(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn list_for_request(&self, id: &RequestId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| event.request_id.as_ref() == Some(id)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use hrflow_core::domain::employee::{DepartmentId, EmployeeId, Role};
    use hrflow_core::domain::request::{
        OnDutyDetails, RequestId, RequestPayload, RequestType, WorkflowRequest,
    };
    use hrflow_core::workflow::engine::WorkflowEngine;
    use hrflow_core::workflow::states::{Decision, Stage, StageStatus};

    use crate::repositories::{
        DecisionRecord, InMemoryRequestRepository, PageRequest, RepositoryError, RequestFilter,
        RequestRepository, StatusFilter,
    };

    fn on_duty(id: &str) -> WorkflowRequest {
        WorkflowRequest {
            id: RequestId(id.to_string()),
            requester_id: EmployeeId("E-100".to_string()),
            department_id: DepartmentId("ENG".to_string()),
            request_type: RequestType::OnDuty,
            payload: RequestPayload::OnDuty(OnDutyDetails {
                date: NaiveDate::from_ymd_opt(2026, 3, 5).expect("date"),
                from_time: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
                to_time: NaiveTime::from_hms_opt(13, 0, 0).expect("time"),
                location: "client site".to_string(),
                purpose: "installation".to_string(),
            }),
            stage_status: StageStatus::all_pending(),
            remarks: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_update_enforces_pending_stage() {
        let repo = InMemoryRequestRepository::default();
        let original = on_duty("OD-1");
        repo.insert(&original).await.expect("insert");

        let decided =
            WorkflowEngine::new().apply(&original, Role::Hod, Decision::Approve, None).expect("hod");
        let record =
            DecisionRecord::from_outcome(&decided, Decision::Approve, EmployeeId("H-1".into()));
        repo.apply_update(&decided.request, &record).await.expect("first update");

        let error = repo.apply_update(&decided.request, &record).await.expect_err("replay");
        assert!(matches!(error, RepositoryError::ConcurrentModification { stage: Stage::Hod, .. }));
        assert_eq!(repo.history(&original.id).await.expect("history").len(), 1);
    }

    #[tokio::test]
    async fn in_memory_insert_reports_duplicate_ids() {
        let repo = InMemoryRequestRepository::default();
        repo.insert(&on_duty("OD-1")).await.expect("insert");

        let error = repo.insert(&on_duty("OD-1")).await.expect_err("same id");
        assert!(matches!(
            error,
            RepositoryError::DuplicateRequest { ref request_id } if request_id.0 == "OD-1"
        ));
    }

    #[tokio::test]
    async fn in_memory_list_applies_status_and_stage_filters() {
        let repo = InMemoryRequestRepository::default();
        let first = on_duty("OD-1");
        repo.insert(&first).await.expect("insert");
        repo.insert(&on_duty("OD-2")).await.expect("insert");

        let decided = WorkflowEngine::new()
            .apply(&first, Role::Hod, Decision::Reject, Some("no cover"))
            .expect("reject");
        let record =
            DecisionRecord::from_outcome(&decided, Decision::Reject, EmployeeId("H-1".into()));
        repo.apply_update(&decided.request, &record).await.expect("update");

        let rejected = repo
            .list(
                &RequestFilter { status: Some(StatusFilter::Rejected), ..RequestFilter::default() },
                PageRequest::default(),
            )
            .await
            .expect("list");
        assert_eq!(rejected.total, 1);
        assert_eq!(rejected.items[0].id.0, "OD-1");

        let awaiting_hod = repo
            .list(
                &RequestFilter { awaiting_stage: Some(Stage::Hod), ..RequestFilter::default() },
                PageRequest::default(),
            )
            .await
            .expect("list");
        assert_eq!(awaiting_hod.items.len(), 1);
        assert_eq!(awaiting_hod.items[0].id.0, "OD-2");
    }
}
