use crate::commands::{with_migrated_pool, CommandResult, StepFailure};
use hrflow_db::migrations;

pub fn run() -> CommandResult {
    let result = with_migrated_pool("migrate", |pool| async move {
        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        if !pending.is_empty() {
            return Err(("migration", format!("versions still pending: {pending:?}"), 5u8));
        }
        Ok::<_, StepFailure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
