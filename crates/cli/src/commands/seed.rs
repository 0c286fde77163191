use leave_db::{connect_with_config, migrations, DbPool, DemoDirectorySeed};

use crate::commands::{prepare, CommandResult, StepFailure};

/// Migrates, loads the demo employees, then reads them back to confirm every record.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let seeded = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(StepFailure::connect)?;
        let outcome = seed_directory(&pool).await;
        pool.close().await;
        outcome
    });

    match seeded {
        Ok(employees) => CommandResult::success(
            "seed",
            format!("demo employee directory loaded: {}", employees.join(", ")),
        ),
        Err(failure) => failure.into_result("seed"),
    }
}

async fn seed_directory(pool: &DbPool) -> Result<Vec<String>, StepFailure> {
    migrations::run_pending(pool).await.map_err(StepFailure::migration)?;
    let seeded = DemoDirectorySeed::load(pool)
        .await
        .map_err(|error| StepFailure::new("seed_execution", error.to_string(), 5))?;
    let verification = DemoDirectorySeed::verify(pool)
        .await
        .map_err(|error| StepFailure::new("seed_verification", error.to_string(), 6))?;

    if verification.all_present {
        return Ok(seeded.employees_seeded);
    }
    let mismatched: Vec<&str> = verification
        .checks
        .iter()
        .filter(|(_, matches)| !matches)
        .map(|(employee_id, _)| employee_id.as_str())
        .collect();
    Err(StepFailure::new("seed_verification", verification_message(&mismatched), 6))
}

fn verification_message(mismatched: &[&str]) -> String {
    match mismatched {
        [] => "some demo employees failed to load".to_string(),
        ids => format!("seed verification failed for employees: {}", ids.join(", ")),
    }
}
