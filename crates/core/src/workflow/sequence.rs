use serde::{Deserialize, Serialize};

use crate::domain::employee::Role;
use crate::domain::request::{RequestType, WorkflowRequest};
use crate::workflow::states::{Decision, RequestOutcome, Stage, StageState, StageStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRule {
    pub stage: Stage,
    /// State recorded when the stage's approver signs off.
    pub success: StageState,
    pub allows_reject: bool,
}

const fn rule(stage: Stage, success: StageState, allows_reject: bool) -> StageRule {
    StageRule { stage, success, allows_reject }
}

const HOD_CEO_ADMIN: [StageRule; 3] = [
    rule(Stage::Hod, StageState::Approved, true),
    rule(Stage::Ceo, StageState::Approved, true),
    rule(Stage::Admin, StageState::Approved, false),
];

const HOD_CEO_ADMIN_ACK: [StageRule; 3] = [
    rule(Stage::Hod, StageState::Approved, true),
    rule(Stage::Ceo, StageState::Approved, true),
    rule(Stage::Admin, StageState::Acknowledged, false),
];

const HOD_ADMIN_CEO: [StageRule; 3] = [
    rule(Stage::Hod, StageState::Approved, true),
    rule(Stage::Admin, StageState::Approved, true),
    rule(Stage::Ceo, StageState::Approved, true),
];

pub fn sequence_for(request_type: RequestType) -> &'static [StageRule] {
    match request_type {
        RequestType::Leave | RequestType::Overtime => &HOD_CEO_ADMIN,
        RequestType::OnDuty => &HOD_CEO_ADMIN_ACK,
        RequestType::PunchMissed => &HOD_ADMIN_CEO,
    }
}

pub fn stages_for(request_type: RequestType) -> Vec<Stage> {
    sequence_for(request_type).iter().map(|rule| rule.stage).collect()
}

pub fn position_of(request_type: RequestType, stage: Stage) -> Option<usize> {
    sequence_for(request_type).iter().position(|rule| rule.stage == stage)
}

pub fn rule_for(request_type: RequestType, stage: Stage) -> Option<StageRule> {
    sequence_for(request_type).iter().copied().find(|rule| rule.stage == stage)
}

pub fn is_terminal_stage(request_type: RequestType, stage: Stage) -> bool {
    sequence_for(request_type).last().map(|rule| rule.stage) == Some(stage)
}

pub fn next_stage(request_type: RequestType, stage: Stage) -> Option<Stage> {
    let sequence = sequence_for(request_type);
    let position = position_of(request_type, stage)?;
    sequence.get(position + 1).map(|rule| rule.stage)
}

/// Decisions the engine accepts at `stage`, ignoring whose turn it is.
pub fn allowed_decisions(request_type: RequestType, stage: Stage) -> Vec<Decision> {
    let Some(rule) = rule_for(request_type, stage) else {
        return Vec::new();
    };
    let mut allowed = Vec::with_capacity(3);
    if rule.success == StageState::Approved {
        allowed.push(Decision::Approve);
    }
    if is_terminal_stage(request_type, stage) {
        allowed.push(Decision::Acknowledge);
    }
    if rule.allows_reject {
        allowed.push(Decision::Reject);
    }
    allowed
}

pub fn stage_for_role(role: Role) -> Option<Stage> {
    match role {
        Role::Hod => Some(Stage::Hod),
        Role::Ceo => Some(Stage::Ceo),
        Role::Admin => Some(Stage::Admin),
        Role::Employee => None,
    }
}

/// Initial status for a newly submitted request. The requester's own stage starts as
/// `Submitted` wherever it sits in the sequence; no one signs off their own request.
pub fn initial_stage_status(request_type: RequestType, requester_role: Role) -> StageStatus {
    let mut status = StageStatus::all_pending();
    if let Some(own) = stage_for_role(requester_role) {
        if position_of(request_type, own).is_some() {
            status.set(own, StageState::Submitted);
        }
    }
    status
}

pub fn outcome_of(request_type: RequestType, status: &StageStatus) -> RequestOutcome {
    let sequence = sequence_for(request_type);

    if let Some(rejected) =
        sequence.iter().find(|rule| status.get(rule.stage) == StageState::Rejected)
    {
        return RequestOutcome::Rejected { stage: rejected.stage };
    }

    match sequence.iter().find(|rule| !status.get(rule.stage).is_cleared()) {
        Some(rule) => RequestOutcome::InProgress { active_stage: rule.stage },
        None => RequestOutcome::Completed,
    }
}

pub fn outcome(request: &WorkflowRequest) -> RequestOutcome {
    outcome_of(request.request_type, &request.stage_status)
}

/// Whether `role` may act on `stage` of `request` right now.
pub fn can_act(role: Role, request: &WorkflowRequest, stage: Stage) -> bool {
    if stage_for_role(role) != Some(stage) {
        return false;
    }
    if request.stage_status.get(stage) != StageState::Pending {
        return false;
    }
    if outcome(request).is_terminal() {
        return false;
    }

    let Some(position) = position_of(request.request_type, stage) else {
        return false;
    };

    sequence_for(request.request_type)[..position].iter().all(|prior| {
        matches!(
            request.stage_status.get(prior.stage),
            StageState::Approved | StageState::Submitted
        )
    })
}
