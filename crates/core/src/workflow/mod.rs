pub mod engine;
pub mod sequence;
pub mod states;

pub use engine::{apply_decision, DecisionOutcome, WorkflowEngine, WorkflowError};
pub use sequence::{
    allowed_decisions, can_act, initial_stage_status, outcome, sequence_for, stage_for_role,
    stages_for, StageRule,
};
pub use states::{Decision, RequestOutcome, Stage, StageState, StageStatus};
