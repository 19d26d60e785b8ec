use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::employee::Role;
use crate::domain::request::{RequestId, WorkflowRequest};
use crate::workflow::sequence::{
    can_act, is_terminal_stage, next_stage, outcome, rule_for, stage_for_role,
};
use crate::workflow::states::{Decision, RequestOutcome, Stage, StageState};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("role {role:?} is not authorized to act on stage {stage:?}")]
    NotAuthorized { role: Role, stage: Option<Stage> },
    #[error("request is already closed ({outcome:?})")]
    AlreadyTerminal { outcome: RequestOutcome },
    #[error("remarks are required to reject at stage {stage:?}")]
    MissingRemarks { stage: Stage },
    #[error("decision {decision:?} is not valid at stage {stage:?}")]
    InvalidDecision { stage: Stage, decision: Decision },
    #[error("stage {stage:?} of request {} changed while the decision was applied", .request_id.0)]
    ConcurrentModification { request_id: RequestId, stage: Stage },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub request: WorkflowRequest,
    pub stage: Stage,
    pub previous: StageState,
    pub applied: StageState,
    pub unlocked: Option<Stage>,
    pub outcome: RequestOutcome,
}

/// Applies a human decision and returns the fully computed next state. The input request is
/// never mutated; on error nothing has changed.
pub fn apply_decision(
    request: &WorkflowRequest,
    role: Role,
    decision: Decision,
    remarks: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DecisionOutcome, WorkflowError> {
    let current = outcome(request);
    if current.is_terminal() {
        return Err(WorkflowError::AlreadyTerminal { outcome: current });
    }

    let stage = stage_for_role(role).ok_or(WorkflowError::NotAuthorized { role, stage: None })?;
    let rule = rule_for(request.request_type, stage)
        .ok_or(WorkflowError::NotAuthorized { role, stage: Some(stage) })?;
    if !can_act(role, request, stage) {
        return Err(WorkflowError::NotAuthorized { role, stage: Some(stage) });
    }

    let remarks = remarks.map(str::trim).filter(|value| !value.is_empty());
    let applied = match decision {
        Decision::Approve if rule.success == StageState::Approved => StageState::Approved,
        Decision::Acknowledge if is_terminal_stage(request.request_type, stage) => {
            StageState::Acknowledged
        }
        Decision::Reject if rule.allows_reject => {
            if remarks.is_none() {
                return Err(WorkflowError::MissingRemarks { stage });
            }
            StageState::Rejected
        }
        _ => return Err(WorkflowError::InvalidDecision { stage, decision }),
    };

    let previous = request.stage_status.get(stage);
    let mut updated = request.clone();
    updated.stage_status.set(stage, applied);
    updated.updated_at = now;

    let mut unlocked = None;
    if applied == StageState::Rejected {
        updated.remarks = remarks.map(str::to_owned);
    } else if let Some(next) = next_stage(request.request_type, stage) {
        // The requester's own stage keeps its Submitted pass-through.
        if updated.stage_status.get(next) != StageState::Submitted {
            updated.stage_status.set(next, StageState::Pending);
        }
        unlocked = outcome(&updated).active_stage();
    }

    let outcome = outcome(&updated);
    Ok(DecisionOutcome { request: updated, stage, previous, applied, unlocked, outcome })
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(
        &self,
        request: &WorkflowRequest,
        role: Role,
        decision: Decision,
        remarks: Option<&str>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        apply_decision(request, role, decision, remarks, Utc::now())
    }

    pub fn apply_with_audit<S>(
        &self,
        request: &WorkflowRequest,
        role: Role,
        decision: Decision,
        remarks: Option<&str>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<DecisionOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let result = self.apply(request, role, decision, remarks);
        match &result {
            Ok(applied) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "workflow.decision_applied",
                        AuditCategory::Workflow,
                        AuditOutcome::Success,
                    )
                    .for_request(&request.id)
                    .at_stage(applied.stage)
                    .with_metadata("from", applied.previous.as_str())
                    .with_metadata("to", applied.applied.as_str())
                    .with_metadata("status", applied.outcome.status_label()),
                );
            }
            Err(error) => {
                let mut event = AuditEvent::new(
                    audit,
                    "workflow.decision_rejected",
                    AuditCategory::Workflow,
                    AuditOutcome::Rejected,
                )
                .for_request(&request.id);
                if let Some(stage) = stage_for_role(role) {
                    event = event.at_stage(stage);
                }
                sink.emit(
                    event
                        .with_metadata("decision", decision.as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::employee::{DepartmentId, EmployeeId, Role};
    use crate::domain::request::{
        LeaveDetails, LeaveKind, OnDutyDetails, OvertimeDetails, PunchDirection,
        PunchMissedDetails, RequestId, RequestPayload, RequestType, WorkflowRequest,
    };
    use crate::workflow::engine::{WorkflowEngine, WorkflowError};
    use crate::workflow::sequence::initial_stage_status;
    use crate::workflow::states::{Decision, RequestOutcome, Stage, StageState, StageStatus};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    fn request(payload: RequestPayload) -> WorkflowRequest {
        WorkflowRequest {
            id: RequestId("REQ-1".to_string()),
            requester_id: EmployeeId("E-100".to_string()),
            department_id: DepartmentId("ENG".to_string()),
            request_type: payload.request_type(),
            payload,
            stage_status: StageStatus::all_pending(),
            remarks: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn leave() -> WorkflowRequest {
        request(RequestPayload::Leave(LeaveDetails {
            leave_kind: LeaveKind::Casual,
            from_date: date(9),
            to_date: date(10),
            reason: "family function".to_string(),
            certificate_ref: None,
            compensated_for: None,
        }))
    }

    fn on_duty() -> WorkflowRequest {
        request(RequestPayload::OnDuty(OnDutyDetails {
            date: date(5),
            from_time: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
            to_time: NaiveTime::from_hms_opt(17, 0, 0).expect("time"),
            location: "client site".to_string(),
            purpose: "installation".to_string(),
        }))
    }

    fn punch_missed() -> WorkflowRequest {
        request(RequestPayload::PunchMissed(PunchMissedDetails {
            date: date(3),
            punch: PunchDirection::In,
            claimed_time: NaiveTime::from_hms_opt(9, 5, 0).expect("time"),
            reason: "badge reader offline".to_string(),
        }))
    }

    #[test]
    fn hod_approval_unlocks_ceo_and_leaves_admin_untouched() {
        let engine = WorkflowEngine::new();
        let outcome =
            engine.apply(&leave(), Role::Hod, Decision::Approve, None).expect("hod approves");

        assert_eq!(
            outcome.request.stage_status,
            StageStatus {
                hod: StageState::Approved,
                ceo: StageState::Pending,
                admin: StageState::Pending,
            }
        );
        assert_eq!(outcome.unlocked, Some(Stage::Ceo));
        assert_eq!(outcome.outcome, RequestOutcome::InProgress { active_stage: Stage::Ceo });
    }

    #[test]
    fn ceo_cannot_approve_before_hod() {
        let overtime = request(RequestPayload::Overtime(OvertimeDetails {
            date: date(2),
            hours: Decimal::new(30, 1),
            reason: "month-end close".to_string(),
        }));
        assert_eq!(overtime.request_type, RequestType::Overtime);

        let error = WorkflowEngine::new()
            .apply(&overtime, Role::Ceo, Decision::Approve, None)
            .expect_err("ceo is gated behind hod");

        assert_eq!(error, WorkflowError::NotAuthorized { role: Role::Ceo, stage: Some(Stage::Ceo) });
    }

    #[test]
    fn employees_have_no_stage_to_act_on() {
        let error = WorkflowEngine::new()
            .apply(&leave(), Role::Employee, Decision::Approve, None)
            .expect_err("employee cannot decide");

        assert_eq!(error, WorkflowError::NotAuthorized { role: Role::Employee, stage: None });
    }

    #[test]
    fn rejection_requires_remarks() {
        let engine = WorkflowEngine::new();

        for remarks in [None, Some(""), Some("   ")] {
            let error = engine
                .apply(&leave(), Role::Hod, Decision::Reject, remarks)
                .expect_err("blank remarks are refused");
            assert_eq!(error, WorkflowError::MissingRemarks { stage: Stage::Hod });
        }

        let outcome = engine
            .apply(&leave(), Role::Hod, Decision::Reject, Some("insufficient cover"))
            .expect("reject with remarks");
        assert_eq!(outcome.request.stage_status.hod, StageState::Rejected);
        assert_eq!(outcome.request.remarks.as_deref(), Some("insufficient cover"));
        assert_eq!(outcome.unlocked, None);
        assert_eq!(outcome.outcome, RequestOutcome::Rejected { stage: Stage::Hod });
    }

    #[test]
    fn rejection_is_absorbing_for_every_role() {
        let engine = WorkflowEngine::new();
        let rejected = engine
            .apply(&leave(), Role::Hod, Decision::Reject, Some("insufficient cover"))
            .expect("reject")
            .request;

        assert_eq!(rejected.stage_status.ceo, StageState::Pending);
        for role in [Role::Hod, Role::Ceo, Role::Admin, Role::Employee] {
            let error = engine
                .apply(&rejected, role, Decision::Approve, None)
                .expect_err("closed request");
            assert!(matches!(error, WorkflowError::AlreadyTerminal { .. }));
        }
    }

    #[test]
    fn on_duty_completes_with_admin_acknowledgement() {
        let engine = WorkflowEngine::new();
        let mut current = on_duty();

        current = engine.apply(&current, Role::Hod, Decision::Approve, None).expect("hod").request;
        current = engine.apply(&current, Role::Ceo, Decision::Approve, None).expect("ceo").request;

        let error = engine
            .apply(&current, Role::Admin, Decision::Approve, None)
            .expect_err("on-duty terminal stage only acknowledges");
        assert_eq!(
            error,
            WorkflowError::InvalidDecision { stage: Stage::Admin, decision: Decision::Approve }
        );

        let done = engine
            .apply(&current, Role::Admin, Decision::Acknowledge, None)
            .expect("admin acknowledges");
        assert_eq!(done.request.stage_status.admin, StageState::Acknowledged);
        assert_eq!(done.outcome, RequestOutcome::Completed);

        for role in [Role::Hod, Role::Ceo, Role::Admin] {
            let error = engine
                .apply(&done.request, role, Decision::Acknowledge, None)
                .expect_err("completed request is closed");
            assert_eq!(error, WorkflowError::AlreadyTerminal { outcome: RequestOutcome::Completed });
        }
    }

    #[test]
    fn acknowledge_is_refused_before_the_terminal_stage() {
        let error = WorkflowEngine::new()
            .apply(&leave(), Role::Hod, Decision::Acknowledge, None)
            .expect_err("hod cannot acknowledge");

        assert_eq!(
            error,
            WorkflowError::InvalidDecision { stage: Stage::Hod, decision: Decision::Acknowledge }
        );
    }

    #[test]
    fn terminal_admin_stage_has_no_reject_path() {
        let engine = WorkflowEngine::new();
        let mut current = leave();
        current = engine.apply(&current, Role::Hod, Decision::Approve, None).expect("hod").request;
        current = engine.apply(&current, Role::Ceo, Decision::Approve, None).expect("ceo").request;

        let error = engine
            .apply(&current, Role::Admin, Decision::Reject, Some("late filing"))
            .expect_err("admin cannot reject leave");
        assert_eq!(
            error,
            WorkflowError::InvalidDecision { stage: Stage::Admin, decision: Decision::Reject }
        );
        assert_eq!(current.stage_status.admin, StageState::Pending);

        let done =
            engine.apply(&current, Role::Admin, Decision::Approve, None).expect("admin approves");
        assert_eq!(done.outcome, RequestOutcome::Completed);
    }

    #[test]
    fn ceo_requester_never_signs_their_own_stage() {
        let engine = WorkflowEngine::new();
        let mut own = leave();
        own.stage_status = initial_stage_status(RequestType::Leave, Role::Ceo);

        let early = engine.apply(&own, Role::Ceo, Decision::Approve, None).expect_err("own stage");
        assert_eq!(
            early,
            WorkflowError::NotAuthorized { role: Role::Ceo, stage: Some(Stage::Ceo) }
        );

        let after_hod = engine.apply(&own, Role::Hod, Decision::Approve, None).expect("hod");
        assert_eq!(after_hod.request.stage_status.ceo, StageState::Submitted);
        assert_eq!(after_hod.unlocked, Some(Stage::Admin));

        let done = engine
            .apply(&after_hod.request, Role::Admin, Decision::Approve, None)
            .expect("admin approves");
        assert_eq!(done.outcome, RequestOutcome::Completed);
    }

    #[test]
    fn punch_missed_routes_through_admin_before_ceo() {
        let engine = WorkflowEngine::new();
        let after_hod = engine
            .apply(&punch_missed(), Role::Hod, Decision::Approve, None)
            .expect("hod approves")
            .request;

        let error = engine
            .apply(&after_hod, Role::Ceo, Decision::Approve, None)
            .expect_err("ceo waits for admin");
        assert_eq!(error, WorkflowError::NotAuthorized { role: Role::Ceo, stage: Some(Stage::Ceo) });

        let after_admin =
            engine.apply(&after_hod, Role::Admin, Decision::Approve, None).expect("admin approves");
        assert_eq!(after_admin.unlocked, Some(Stage::Ceo));

        let done = engine
            .apply(&after_admin.request, Role::Ceo, Decision::Approve, None)
            .expect("ceo approves");
        assert_eq!(done.unlocked, None);
        assert_eq!(done.outcome, RequestOutcome::Completed);
    }

    #[test]
    fn decision_audit_records_success_and_rejection() {
        let engine = WorkflowEngine::new();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new("req-42", "E-200");

        engine
            .apply_with_audit(&leave(), Role::Hod, Decision::Approve, None, &sink, &audit)
            .expect("hod approves");
        engine
            .apply_with_audit(&leave(), Role::Admin, Decision::Approve, None, &sink, &audit)
            .expect_err("admin is gated");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "workflow.decision_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("approved"));
        assert_eq!(events[1].event_type, "workflow.decision_rejected");
        assert_eq!(events[1].correlation_id, "req-42");
        assert_eq!(events[1].stage, Some(Stage::Admin));
    }
}
