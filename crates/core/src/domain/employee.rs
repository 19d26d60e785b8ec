use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartmentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Hod,
    Ceo,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Hod => "hod",
            Self::Ceo => "ceo",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Self::Employee),
            "hod" => Ok(Self::Hod),
            "ceo" => Ok(Self::Ceo),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role `{other}` (expected employee|hod|ceo|admin)")),
        }
    }
}

/// The acting user as resolved by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: EmployeeId,
    pub role: Role,
    pub department_id: DepartmentId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Probation,
    Confirmed,
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probation => "probation",
            Self::Confirmed => "confirmed",
        }
    }
}

/// Eligibility data consulted by submission validators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub actor: Actor,
    pub name: String,
    pub gender: Gender,
    pub employment_status: EmploymentStatus,
    pub emergency_leave_granted: bool,
    /// Worked days not yet held by a request.
    pub compensatory_credits: Vec<NaiveDate>,
}

impl EmployeeProfile {
    pub fn has_compensatory_credit(&self, worked_on: NaiveDate) -> bool {
        self.compensatory_credits.contains(&worked_on)
    }
}
