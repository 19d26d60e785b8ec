use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Hod,
    Ceo,
    Admin,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Hod, Stage::Ceo, Stage::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hod => "hod",
            Self::Ceo => "ceo",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hod" => Ok(Self::Hod),
            "ceo" => Ok(Self::Ceo),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown stage `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Approved,
    Rejected,
    Submitted,
    Acknowledged,
}

impl StageState {
    /// States that unlock the following stage.
    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::Approved | Self::Submitted | Self::Acknowledged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Submitted => "submitted",
            Self::Acknowledged => "acknowledged",
        }
    }
}

impl std::str::FromStr for StageState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "submitted" => Ok(Self::Submitted),
            "acknowledged" => Ok(Self::Acknowledged),
            other => Err(format!("unknown stage state `{other}`")),
        }
    }
}

/// One state per stage. Every request type uses all three stages, only their order differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub hod: StageState,
    pub ceo: StageState,
    pub admin: StageState,
}

impl StageStatus {
    pub fn all_pending() -> Self {
        Self { hod: StageState::Pending, ceo: StageState::Pending, admin: StageState::Pending }
    }

    pub fn get(&self, stage: Stage) -> StageState {
        match stage {
            Stage::Hod => self.hod,
            Stage::Ceo => self.ceo,
            Stage::Admin => self.admin,
        }
    }

    pub fn set(&mut self, stage: Stage, state: StageState) {
        match stage {
            Stage::Hod => self.hod = state,
            Stage::Ceo => self.ceo = state,
            Stage::Admin => self.admin = state,
        }
    }
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::all_pending()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    Acknowledge,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Acknowledge => "acknowledge",
        }
    }

    pub fn resulting_state(&self) -> StageState {
        match self {
            Self::Approve => StageState::Approved,
            Self::Reject => StageState::Rejected,
            Self::Acknowledge => StageState::Acknowledged,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "acknowledge" => Ok(Self::Acknowledge),
            other => Err(format!("unrecognized decision `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestOutcome {
    InProgress { active_stage: Stage },
    Rejected { stage: Stage },
    Completed,
}

impl RequestOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            Self::InProgress { .. } => "in_progress",
            Self::Rejected { .. } => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            Self::InProgress { active_stage } => Some(*active_stage),
            Self::Rejected { .. } | Self::Completed => None,
        }
    }
}
