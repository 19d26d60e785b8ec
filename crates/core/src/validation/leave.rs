use chrono::NaiveDate;

use super::{require_text, RequestValidator, ValidationError};
use crate::domain::employee::{EmployeeProfile, EmploymentStatus, Gender};
use crate::domain::request::{LeaveDetails, LeaveKind, RequestPayload};

const MEDICAL_SPAN_DAYS: [i64; 2] = [3, 4];
const MATERNITY_SPAN_DAYS: i64 = 90;

#[derive(Clone, Copy, Debug, Default)]
pub struct LeaveValidator;

impl RequestValidator for LeaveValidator {
    fn validate(
        &self,
        payload: &RequestPayload,
        profile: &EmployeeProfile,
        _today: NaiveDate,
    ) -> Result<(), ValidationError> {
        let RequestPayload::Leave(leave) = payload else {
            return Ok(());
        };

        if leave.to_date < leave.from_date {
            return Err(ValidationError::new("to_date", "must not be before from_date"));
        }
        require_text("reason", &leave.reason)?;

        match leave.leave_kind {
            LeaveKind::Medical => validate_medical(leave, profile),
            LeaveKind::Maternity => validate_maternity(leave, profile),
            LeaveKind::Emergency => validate_emergency(leave, profile),
            LeaveKind::Compensatory => validate_compensatory(leave, profile),
            LeaveKind::Casual | LeaveKind::Sick | LeaveKind::LossOfPay => Ok(()),
        }
    }
}

fn validate_medical(leave: &LeaveDetails, profile: &EmployeeProfile) -> Result<(), ValidationError> {
    if profile.employment_status != EmploymentStatus::Confirmed {
        return Err(ValidationError::new(
            "leave_kind",
            "medical leave is available to confirmed employees only",
        ));
    }
    if !MEDICAL_SPAN_DAYS.contains(&leave.span_days()) {
        return Err(ValidationError::new(
            "to_date",
            format!("medical leave must span 3 or 4 days, got {}", leave.span_days()),
        ));
    }
    let has_certificate =
        leave.certificate_ref.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false);
    if !has_certificate {
        return Err(ValidationError::new(
            "certificate_ref",
            "medical leave requires a medical certificate",
        ));
    }
    Ok(())
}

fn validate_maternity(
    leave: &LeaveDetails,
    profile: &EmployeeProfile,
) -> Result<(), ValidationError> {
    if profile.gender != Gender::Female {
        return Err(ValidationError::new(
            "leave_kind",
            "maternity leave is available to female employees only",
        ));
    }
    if leave.span_days() != MATERNITY_SPAN_DAYS {
        return Err(ValidationError::new(
            "to_date",
            format!("maternity leave must span {MATERNITY_SPAN_DAYS} days, got {}", leave.span_days()),
        ));
    }
    Ok(())
}

fn validate_emergency(
    leave: &LeaveDetails,
    profile: &EmployeeProfile,
) -> Result<(), ValidationError> {
    if !profile.emergency_leave_granted {
        return Err(ValidationError::new(
            "leave_kind",
            "emergency leave requires a granted emergency permission",
        ));
    }
    if leave.from_date != leave.to_date {
        return Err(ValidationError::new("to_date", "emergency leave must be a single day"));
    }
    Ok(())
}

fn validate_compensatory(
    leave: &LeaveDetails,
    profile: &EmployeeProfile,
) -> Result<(), ValidationError> {
    let Some(worked_on) = leave.compensated_for else {
        return Err(ValidationError::new(
            "compensated_for",
            "compensatory leave must name the worked day being redeemed",
        ));
    };
    if !profile.has_compensatory_credit(worked_on) {
        return Err(ValidationError::new(
            "compensated_for",
            format!("no available compensatory credit for {worked_on}"),
        ));
    }
    Ok(())
}
