//! Pre-submission rules per request type. These run once, when a request is created; the
//! approval sequencing never re-validates request content.

pub mod attendance;
pub mod leave;

use std::collections::HashMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::employee::EmployeeProfile;
use crate::domain::request::{RequestPayload, RequestType};

pub use attendance::{OnDutyValidator, OvertimeValidator, PunchMissedValidator};
pub use leave::LeaveValidator;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid `{field}`: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

pub trait RequestValidator: Send + Sync {
    fn validate(
        &self,
        payload: &RequestPayload,
        profile: &EmployeeProfile,
        today: NaiveDate,
    ) -> Result<(), ValidationError>;
}

pub struct ValidatorRegistry {
    validators: HashMap<RequestType, Box<dyn RequestValidator>>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self { validators: HashMap::new() }
    }

    pub fn register(
        mut self,
        request_type: RequestType,
        validator: impl RequestValidator + 'static,
    ) -> Self {
        self.validators.insert(request_type, Box::new(validator));
        self
    }

    /// Runs the validator registered for the payload's type. Types without one pass.
    pub fn validate(
        &self,
        payload: &RequestPayload,
        profile: &EmployeeProfile,
        today: NaiveDate,
    ) -> Result<(), ValidationError> {
        match self.validators.get(&payload.request_type()) {
            Some(validator) => validator.validate(payload, profile, today),
            None => Ok(()),
        }
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::empty()
            .register(RequestType::Leave, LeaveValidator)
            .register(RequestType::OnDuty, OnDutyValidator)
            .register(RequestType::Overtime, OvertimeValidator::default())
            .register(RequestType::PunchMissed, PunchMissedValidator)
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}
