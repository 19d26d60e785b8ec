use crate::commands::{with_migrated_pool, CommandResult, StepFailure};
use hrflow_db::fixtures::SeedRequestInfo;
use hrflow_db::DemoDataset;

pub fn run(reset: bool) -> CommandResult {
    let result = with_migrated_pool("seed", |pool| async move {
        if reset {
            DemoDataset::clean(&pool)
                .await
                .map_err(|error| ("seed_reset", error.to_string(), 6u8))?;
        }

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 7u8))?;
        if !verification.all_present {
            return Err(("seed_verification", failure_message(&verification.checks), 7u8));
        }

        Ok::<_, StepFailure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded: {} employees, {} requests:\n{}",
                seeded.employees_seeded,
                seeded.requests_seeded.len(),
                describe(&seeded.requests_seeded)
            ),
        ),
        Err(failure) => failure,
    }
}

fn describe(requests: &[SeedRequestInfo]) -> String {
    requests
        .iter()
        .map(|info| {
            format!("  - {}: {} ({})", info.request_type, info.request_id, info.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed =
        checks.iter().filter_map(|(check, ok)| (!ok).then_some(*check)).collect::<Vec<_>>();
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}
