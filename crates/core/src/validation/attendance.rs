use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{require_text, RequestValidator, ValidationError};
use crate::domain::employee::EmployeeProfile;
use crate::domain::request::RequestPayload;

#[derive(Clone, Copy, Debug, Default)]
pub struct OnDutyValidator;

impl RequestValidator for OnDutyValidator {
    fn validate(
        &self,
        payload: &RequestPayload,
        _profile: &EmployeeProfile,
        _today: NaiveDate,
    ) -> Result<(), ValidationError> {
        let RequestPayload::OnDuty(on_duty) = payload else {
            return Ok(());
        };

        if on_duty.to_time <= on_duty.from_time {
            return Err(ValidationError::new("to_time", "must be later than from_time"));
        }
        require_text("location", &on_duty.location)?;
        require_text("purpose", &on_duty.purpose)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OvertimeValidator {
    pub max_hours_per_day: Decimal,
}

impl Default for OvertimeValidator {
    fn default() -> Self {
        Self { max_hours_per_day: Decimal::from(24) }
    }
}

impl RequestValidator for OvertimeValidator {
    fn validate(
        &self,
        payload: &RequestPayload,
        _profile: &EmployeeProfile,
        today: NaiveDate,
    ) -> Result<(), ValidationError> {
        let RequestPayload::Overtime(overtime) = payload else {
            return Ok(());
        };

        if overtime.hours <= Decimal::ZERO || overtime.hours > self.max_hours_per_day {
            return Err(ValidationError::new(
                "hours",
                format!("must be greater than 0 and at most {}", self.max_hours_per_day),
            ));
        }
        if overtime.date > today {
            return Err(ValidationError::new("date", "overtime cannot be claimed in advance"));
        }
        require_text("reason", &overtime.reason)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PunchMissedValidator;

impl RequestValidator for PunchMissedValidator {
    fn validate(
        &self,
        payload: &RequestPayload,
        _profile: &EmployeeProfile,
        today: NaiveDate,
    ) -> Result<(), ValidationError> {
        let RequestPayload::PunchMissed(punch) = payload else {
            return Ok(());
        };

        if punch.date > today {
            return Err(ValidationError::new("date", "cannot correct a future punch"));
        }
        require_text("reason", &punch.reason)
    }
}
