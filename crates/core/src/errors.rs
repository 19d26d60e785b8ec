use thiserror::Error;

use crate::validation::ValidationError;
use crate::workflow::engine::WorkflowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<WorkflowError> for ApplicationError {
    fn from(value: WorkflowError) -> Self {
        Self::Domain(DomainError::Workflow(value))
    }
}

impl From<ValidationError> for ApplicationError {
    fn from(value: ValidationError) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { kind: &'static str, message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { kind: &'static str, message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { kind: &'static str, message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { kind: &'static str, message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { kind: &'static str, message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { kind: &'static str, message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { kind: &'static str, message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to act on this request right now.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Conflict { .. } => {
                "The request changed or is already closed. Reload it and try again."
            }
            Self::Unprocessable { .. } => "The request is missing required information.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// Stable machine-readable error kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest { kind, .. }
            | Self::Forbidden { kind, .. }
            | Self::NotFound { kind, .. }
            | Self::Conflict { kind, .. }
            | Self::Unprocessable { kind, .. }
            | Self::ServiceUnavailable { kind, .. }
            | Self::Internal { kind, .. } => *kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Unprocessable { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    fn set_correlation_id(&mut self, value: String) {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => *correlation_id = value,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let mut mapped = InterfaceError::from(self);
        mapped.set_correlation_id(correlation_id.into());
        mapped
    }
}

const UNASSIGNED: &str = "unassigned";

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = UNASSIGNED.to_owned();
        match value {
            ApplicationError::Domain(DomainError::Workflow(workflow)) => match workflow {
                WorkflowError::NotAuthorized { .. } => {
                    Self::Forbidden { kind: "not_authorized", message, correlation_id }
                }
                WorkflowError::AlreadyTerminal { .. } => {
                    Self::Conflict { kind: "already_terminal", message, correlation_id }
                }
                WorkflowError::ConcurrentModification { .. } => {
                    Self::Conflict { kind: "concurrent_modification", message, correlation_id }
                }
                WorkflowError::MissingRemarks { .. } => {
                    Self::Unprocessable { kind: "missing_remarks", message, correlation_id }
                }
                WorkflowError::InvalidDecision { .. } => {
                    Self::BadRequest { kind: "invalid_decision", message, correlation_id }
                }
            },
            ApplicationError::Domain(DomainError::Validation(_)) => {
                Self::Unprocessable { kind: "validation", message, correlation_id }
            }
            ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                Self::Internal { kind: "invariant_violation", message, correlation_id }
            }
            ApplicationError::NotFound { .. } => {
                Self::NotFound { kind: "not_found", message, correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { kind: "unavailable", message, correlation_id }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { kind: "configuration", message, correlation_id }
            }
        }
    }
}
