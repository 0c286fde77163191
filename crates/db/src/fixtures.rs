use leave_core::directory::demo_employees;
use tracing::info;

use crate::repositories::{RepositoryError, SqlEmployeeDirectory};
use crate::DbPool;

/// Demo employees loaded into the SQLite directory.
///
/// The dataset is the same one the in-memory directory serves, so switching
/// `directory.source` between `mock` and `database` does not change answers.
pub struct DemoDirectorySeed;

impl DemoDirectorySeed {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let directory = SqlEmployeeDirectory::new(pool.clone());
        let mut employees_seeded = Vec::new();

        for record in demo_employees() {
            directory.upsert(&record).await?;
            employees_seeded.push(record.employee_id.0);
        }

        info!(
            event_name = "db.seed.loaded",
            employees = employees_seeded.len(),
            "demo employee directory seeded"
        );
        Ok(SeedResult { employees_seeded })
    }

    /// Checks every demo employee exists with its expected balances.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let directory = SqlEmployeeDirectory::new(pool.clone());
        let mut checks = Vec::new();

        for expected in demo_employees() {
            let stored = directory.find_by_id(expected.employee_id.as_str()).await?;
            checks.push((expected.employee_id.0.clone(), stored.as_ref() == Some(&expected)));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for record in demo_employees() {
            sqlx::query("DELETE FROM employees WHERE employee_id = ?")
                .bind(record.employee_id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub employees_seeded: Vec<String>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
