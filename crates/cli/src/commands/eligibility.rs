//! One-shot eligibility check against the configured employee directory, without the
//! chat layer in between.

use std::sync::Arc;

use leave_core::config::DirectorySource;
use leave_core::{
    EmployeeDirectory, InMemoryEmployeeDirectory, LeavePolicyEngine, PolicyCatalog,
    RequestContext,
};
use leave_db::{connect_with_config, SqlEmployeeDirectory};

use crate::commands::{prepare, CommandResult, StepFailure};

#[derive(Debug, Clone)]
pub struct EligibilityArgs {
    pub employee_id: String,
    pub leave_type: String,
    pub start_date: String,
    pub num_days: u32,
}

pub fn run(args: &EligibilityArgs) -> CommandResult {
    let (config, runtime) = match prepare("eligibility") {
        Ok(ready) => ready,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let (directory, pool) = match config.directory.source {
            DirectorySource::Mock => {
                let directory: Arc<dyn EmployeeDirectory> =
                    Arc::new(InMemoryEmployeeDirectory::with_demo_employees());
                (directory, None)
            }
            DirectorySource::Database => {
                let pool =
                    connect_with_config(&config.database).await.map_err(StepFailure::connect)?;
                let directory: Arc<dyn EmployeeDirectory> =
                    Arc::new(SqlEmployeeDirectory::new(pool.clone()));
                (directory, Some(pool))
            }
        };

        let engine = LeavePolicyEngine::new(directory, Arc::new(PolicyCatalog::standard()));
        let ctx = RequestContext::begin("cli", Some(args.employee_id.as_str()));
        let decision = engine
            .check_leave_eligibility(
                &ctx,
                &args.employee_id,
                &args.leave_type,
                &args.start_date,
                args.num_days,
            )
            .await;
        ctx.end();

        if let Some(pool) = pool {
            pool.close().await;
        }
        Ok::<_, StepFailure>(decision)
    });

    match result {
        Ok(decision) => CommandResult::success_with_data(
            "eligibility",
            decision.reason(),
            Some(decision.to_payload()),
        ),
        Err(failure) => failure.into_result("eligibility"),
    }
}
