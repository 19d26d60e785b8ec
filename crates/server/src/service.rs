use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use hrflow_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, InMemoryAuditSink,
};
use hrflow_core::domain::employee::{EmployeeId, EmployeeProfile, Role};
use hrflow_core::domain::request::{RequestId, RequestPayload, WorkflowRequest};
use hrflow_core::errors::{ApplicationError, DomainError};
use hrflow_core::notify::{Notifier, StatusNotification};
use hrflow_core::validation::{ValidationError, ValidatorRegistry};
use hrflow_core::workflow::sequence::{
    allowed_decisions, can_act, initial_stage_status, outcome, stage_for_role,
};
use hrflow_core::workflow::{
    Decision, DecisionOutcome, RequestOutcome, Stage, WorkflowEngine, WorkflowError,
};
use hrflow_db::repositories::{
    AuditRepository, DecisionRecord, IdentityProvider, Page, PageRequest, RepositoryError,
    RequestFilter, RequestRepository,
};

/// What an actor may do on a request at this moment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PermissionView {
    pub request_id: RequestId,
    pub actor_id: EmployeeId,
    pub role: Role,
    pub actionable_stage: Option<Stage>,
    pub allowed_decisions: Vec<Decision>,
    pub outcome: RequestOutcome,
}

#[derive(Clone)]
pub struct WorkflowService {
    requests: Arc<dyn RequestRepository>,
    identities: Arc<dyn IdentityProvider>,
    audit: Arc<dyn AuditRepository>,
    notifier: Arc<dyn Notifier>,
    validators: Arc<ValidatorRegistry>,
    engine: WorkflowEngine,
}

impl WorkflowService {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        identities: Arc<dyn IdentityProvider>,
        audit: Arc<dyn AuditRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            requests,
            identities,
            audit,
            notifier,
            validators: Arc::new(ValidatorRegistry::default()),
            engine: WorkflowEngine::new(),
        }
    }

    pub async fn submit(
        &self,
        requester_id: &EmployeeId,
        payload: RequestPayload,
        correlation_id: &str,
    ) -> Result<WorkflowRequest, ApplicationError> {
        self.submit_at(requester_id, payload, correlation_id, Utc::now()).await
    }

    /// Validates and stores a new request as of `now`.
    pub async fn submit_at(
        &self,
        requester_id: &EmployeeId,
        payload: RequestPayload,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkflowRequest, ApplicationError> {
        let profile = self.resolve(requester_id).await?;
        self.validators.validate(&payload, &profile, now.date_naive())?;

        let request_type = payload.request_type();
        let request = WorkflowRequest {
            id: RequestId::generate(request_type),
            requester_id: requester_id.clone(),
            department_id: profile.actor.department_id.clone(),
            request_type,
            payload,
            stage_status: initial_stage_status(request_type, profile.actor.role),
            remarks: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.insert(&request).await.map_err(repository_error)?;

        info!(
            event_name = "workflow.request.submitted",
            correlation_id = %correlation_id,
            request_id = %request.id.0,
            request_type = request_type.as_str(),
            requester_id = %requester_id.0,
            "request submitted"
        );

        let context = AuditContext::new(correlation_id, requester_id.0.clone());
        let event = AuditEvent::new(
            &context,
            "workflow.request_submitted",
            AuditCategory::Submission,
            AuditOutcome::Success,
        )
        .for_request(&request.id)
        .with_metadata("request_type", request_type.as_str())
        .with_metadata("status", outcome(&request).status_label());
        self.persist_audit(&[event], correlation_id).await;
        self.dispatch(StatusNotification::submitted(&request), correlation_id).await;

        Ok(request)
    }

    pub async fn decide(
        &self,
        request_id: &RequestId,
        actor_id: &EmployeeId,
        decision: Decision,
        remarks: Option<&str>,
        correlation_id: &str,
    ) -> Result<DecisionOutcome, ApplicationError> {
        let actor = self.resolve(actor_id).await?;
        let request = self.load(request_id).await?;

        department_gate(&actor, &request)?;

        let sink = InMemoryAuditSink::default();
        let context = AuditContext::new(correlation_id, actor_id.0.clone());
        let applied = match self.engine.apply_with_audit(
            &request,
            actor.actor.role,
            decision,
            remarks,
            &sink,
            &context,
        ) {
            Ok(applied) => applied,
            Err(error) => {
                self.persist_audit(&sink.drain(), correlation_id).await;
                return Err(error.into());
            }
        };

        let record = DecisionRecord::from_outcome(&applied, decision, actor_id.clone());
        if let Err(error) = self.requests.apply_update(&applied.request, &record).await {
            warn!(
                event_name = "workflow.decision.persist_failed",
                correlation_id = %correlation_id,
                request_id = %request_id.0,
                stage = applied.stage.as_str(),
                error = %error,
                "decision was not stored"
            );
            return Err(repository_error(error));
        }

        info!(
            event_name = "workflow.decision.applied",
            correlation_id = %correlation_id,
            request_id = %request_id.0,
            actor_id = %actor_id.0,
            stage = applied.stage.as_str(),
            applied = applied.applied.as_str(),
            status = applied.outcome.status_label(),
            "decision applied"
        );

        self.persist_audit(&sink.drain(), correlation_id).await;
        self.dispatch(StatusNotification::decided(&applied), correlation_id).await;

        Ok(applied)
    }

    pub async fn permissions(
        &self,
        request_id: &RequestId,
        actor_id: &EmployeeId,
    ) -> Result<PermissionView, ApplicationError> {
        let actor = self.resolve(actor_id).await?;
        let request = self.load(request_id).await?;
        let role = actor.actor.role;

        let actionable_stage = stage_for_role(role).filter(|stage| {
            department_gate(&actor, &request).is_ok() && can_act(role, &request, *stage)
        });
        let allowed_decisions = actionable_stage
            .map(|stage| allowed_decisions(request.request_type, stage))
            .unwrap_or_default();

        Ok(PermissionView {
            request_id: request.id.clone(),
            actor_id: actor_id.clone(),
            role,
            actionable_stage,
            allowed_decisions,
            outcome: outcome(&request),
        })
    }

    pub async fn get(&self, request_id: &RequestId) -> Result<WorkflowRequest, ApplicationError> {
        self.load(request_id).await
    }

    pub async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<Page<WorkflowRequest>, ApplicationError> {
        self.requests.list(filter, page).await.map_err(repository_error)
    }

    pub async fn history(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<DecisionRecord>, ApplicationError> {
        self.load(request_id).await?;
        self.requests.history(request_id).await.map_err(repository_error)
    }

    async fn resolve(&self, employee_id: &EmployeeId) -> Result<EmployeeProfile, ApplicationError> {
        self.identities.resolve(employee_id).await.map_err(repository_error)?.ok_or_else(|| {
            ApplicationError::NotFound { entity: "employee", id: employee_id.0.clone() }
        })
    }

    async fn load(&self, request_id: &RequestId) -> Result<WorkflowRequest, ApplicationError> {
        self.requests
            .find_by_id(request_id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| ApplicationError::NotFound { entity: "request", id: request_id.0.clone() })
    }

    async fn persist_audit(&self, events: &[AuditEvent], correlation_id: &str) {
        for event in events {
            if let Err(error) = self.audit.record(event).await {
                warn!(
                    event_name = "workflow.audit.persist_failed",
                    correlation_id = %correlation_id,
                    audit_event = %event.event_type,
                    error = %error,
                    "audit event was not stored"
                );
            }
        }
    }

    /// Notification failures never undo a stored change.
    async fn dispatch(&self, notification: StatusNotification, correlation_id: &str) {
        let request_id = notification.request_id.0.clone();
        if let Err(error) = self.notifier.notify(notification).await {
            warn!(
                event_name = "workflow.notify.failed",
                correlation_id = %correlation_id,
                request_id = %request_id,
                error = %error,
                "status notification failed"
            );
        }
    }
}

/// HODs only sign off requests from their own department. Closed requests skip the check so
/// the engine reports them as terminal.
fn department_gate(
    actor: &EmployeeProfile,
    request: &WorkflowRequest,
) -> Result<(), WorkflowError> {
    let role = actor.actor.role;
    if role == Role::Hod
        && actor.actor.department_id != request.department_id
        && !outcome(request).is_terminal()
    {
        return Err(WorkflowError::NotAuthorized { role, stage: Some(Stage::Hod) });
    }
    Ok(())
}

fn repository_error(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::ConcurrentModification { request_id, stage } => {
            WorkflowError::ConcurrentModification { request_id, stage }.into()
        }
        RepositoryError::RequestNotFound { request_id } => {
            ApplicationError::NotFound { entity: "request", id: request_id.0 }
        }
        RepositoryError::CreditUnavailable { worked_on, .. } => ValidationError::new(
            "compensated_for",
            format!("no available compensatory credit for {worked_on}"),
        )
        .into(),
        error @ (RepositoryError::Decode(_) | RepositoryError::DuplicateRequest { .. }) => {
            ApplicationError::Domain(DomainError::InvariantViolation(error.to_string()))
        }
        RepositoryError::Database(error) => ApplicationError::Persistence(error.to_string()),
    }
}
