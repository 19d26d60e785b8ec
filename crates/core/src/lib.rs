pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod validation;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::employee::{
    Actor, DepartmentId, EmployeeId, EmployeeProfile, EmploymentStatus, Gender, Role,
};
pub use domain::request::{
    LeaveDetails, LeaveKind, OnDutyDetails, OvertimeDetails, PunchDirection, PunchMissedDetails,
    RequestId, RequestPayload, RequestType, WorkflowRequest,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notify::{Notifier, NotifyError, StatusNotification};
pub use validation::{RequestValidator, ValidationError, ValidatorRegistry};
pub use workflow::{
    apply_decision, can_act, outcome, Decision, DecisionOutcome, RequestOutcome, Stage,
    StageState, StageStatus, WorkflowEngine, WorkflowError,
};
