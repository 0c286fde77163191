use leave_db::{connect_with_config, migrations};

use crate::commands::{prepare, CommandResult, StepFailure};

/// Applies the directory schema to the configured database.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let applied = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(StepFailure::connect)?;
        let outcome = migrations::run_pending(&pool).await.map_err(StepFailure::migration);
        pool.close().await;
        outcome
    });

    match applied {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}
