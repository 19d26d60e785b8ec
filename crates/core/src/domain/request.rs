use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::employee::{DepartmentId, EmployeeId};
use crate::workflow::states::StageStatus;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate(request_type: RequestType) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", request_type.id_prefix(), &suffix[..12]))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "leave")]
    Leave,
    #[serde(rename = "od")]
    OnDuty,
    #[serde(rename = "ot")]
    Overtime,
    #[serde(rename = "punch_missed")]
    PunchMissed,
}

impl RequestType {
    pub const ALL: [RequestType; 4] =
        [RequestType::Leave, RequestType::OnDuty, RequestType::Overtime, RequestType::PunchMissed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::OnDuty => "od",
            Self::Overtime => "ot",
            Self::PunchMissed => "punch_missed",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::Leave => "LV",
            Self::OnDuty => "OD",
            Self::Overtime => "OT",
            Self::PunchMissed => "PM",
        }
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leave" => Ok(Self::Leave),
            "od" | "on_duty" => Ok(Self::OnDuty),
            "ot" | "overtime" => Ok(Self::Overtime),
            "punch_missed" | "punchmissed" => Ok(Self::PunchMissed),
            other => Err(format!("unknown request type `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Casual,
    Sick,
    Medical,
    Maternity,
    Emergency,
    Compensatory,
    LossOfPay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunchDirection {
    In,
    Out,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveDetails {
    pub leave_kind: LeaveKind,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
    #[serde(default)]
    pub certificate_ref: Option<String>,
    #[serde(default)]
    pub compensated_for: Option<NaiveDate>,
}

impl LeaveDetails {
    /// Inclusive day count; zero when the range is inverted.
    pub fn span_days(&self) -> i64 {
        let days = (self.to_date - self.from_date).num_days();
        if days < 0 {
            0
        } else {
            days + 1
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDutyDetails {
    pub date: NaiveDate,
    pub from_time: NaiveTime,
    pub to_time: NaiveTime,
    pub location: String,
    pub purpose: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeDetails {
    pub date: NaiveDate,
    pub hours: Decimal,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunchMissedDetails {
    pub date: NaiveDate,
    pub punch: PunchDirection,
    pub claimed_time: NaiveTime,
    pub reason: String,
}

/// Type-specific content. Opaque to the approval sequencing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request_type")]
pub enum RequestPayload {
    #[serde(rename = "leave")]
    Leave(LeaveDetails),
    #[serde(rename = "od")]
    OnDuty(OnDutyDetails),
    #[serde(rename = "ot")]
    Overtime(OvertimeDetails),
    #[serde(rename = "punch_missed")]
    PunchMissed(PunchMissedDetails),
}

impl RequestPayload {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Leave(_) => RequestType::Leave,
            Self::OnDuty(_) => RequestType::OnDuty,
            Self::Overtime(_) => RequestType::Overtime,
            Self::PunchMissed(_) => RequestType::PunchMissed,
        }
    }

    /// The day the request is about; the first day for leave ranges.
    pub fn effective_date(&self) -> NaiveDate {
        match self {
            Self::Leave(leave) => leave.from_date,
            Self::OnDuty(on_duty) => on_duty.date,
            Self::Overtime(overtime) => overtime.date,
            Self::PunchMissed(punch) => punch.date,
        }
    }

    /// The worked day a compensatory leave redeems.
    pub fn compensated_for(&self) -> Option<NaiveDate> {
        match self {
            Self::Leave(leave) if leave.leave_kind == LeaveKind::Compensatory => {
                leave.compensated_for
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub id: RequestId,
    pub requester_id: EmployeeId,
    pub department_id: DepartmentId,
    pub request_type: RequestType,
    pub payload: RequestPayload,
    pub stage_status: StageStatus,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
