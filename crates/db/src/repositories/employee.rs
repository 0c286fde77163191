use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use tracing::debug;

use leave_core::directory::{DirectoryError, EmployeeDirectory};
use leave_core::domain::employee::{EmployeeId, EmployeeRecord};

use super::RepositoryError;
use crate::DbPool;

/// Employee directory backed by the `employees` and `leave_balances` tables.
#[derive(Clone)]
pub struct SqlEmployeeDirectory {
    pool: DbPool,
}

impl SqlEmployeeDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(
        &self,
        employee_id: &str,
    ) -> Result<Option<EmployeeRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT employee_id, name, email, department, country, hire_date
             FROM employees WHERE employee_id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let balance_rows = sqlx::query(
            "SELECT leave_type, remaining_days FROM leave_balances
             WHERE employee_id = ? ORDER BY leave_type",
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        let mut leave_balances = BTreeMap::new();
        for balance in &balance_rows {
            let leave_type: String =
                balance.try_get("leave_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let remaining: i64 = balance
                .try_get("remaining_days")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let remaining = u32::try_from(remaining).map_err(|_| {
                RepositoryError::Decode(format!(
                    "balance for `{leave_type}` is out of range: {remaining}"
                ))
            })?;
            leave_balances.insert(leave_type, remaining);
        }

        row_to_employee(&row, leave_balances).map(Some)
    }

    /// Inserts or replaces an employee together with their full balance table.
    pub async fn upsert(&self, record: &EmployeeRecord) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO employees (employee_id, name, email, department, country, hire_date)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(employee_id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 department = excluded.department,
                 country = excluded.country,
                 hire_date = excluded.hire_date,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(record.employee_id.as_str())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.department)
        .bind(&record.country)
        .bind(record.hire_date.format("%Y-%m-%d").to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM leave_balances WHERE employee_id = ?")
            .bind(record.employee_id.as_str())
            .execute(&mut *tx)
            .await?;

        for (leave_type, remaining) in &record.leave_balances {
            sqlx::query(
                "INSERT INTO leave_balances (employee_id, leave_type, remaining_days)
                 VALUES (?, ?, ?)",
            )
            .bind(record.employee_id.as_str())
            .bind(leave_type)
            .bind(i64::from(*remaining))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM employees").fetch_one(&self.pool).await?;
        Ok(count)
    }
}

fn row_to_employee(
    row: &sqlx::sqlite::SqliteRow,
    leave_balances: BTreeMap<String, u32>,
) -> Result<EmployeeRecord, RepositoryError> {
    let employee_id: String =
        row.try_get("employee_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String = row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let department: String =
        row.try_get("department").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let country: String =
        row.try_get("country").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let hire_date_str: String =
        row.try_get("hire_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let hire_date = NaiveDate::parse_from_str(&hire_date_str, "%Y-%m-%d").map_err(|e| {
        RepositoryError::Decode(format!("hire_date `{hire_date_str}` for {employee_id}: {e}"))
    })?;

    Ok(EmployeeRecord {
        employee_id: EmployeeId(employee_id),
        name,
        email,
        department,
        country,
        hire_date,
        leave_balances,
    })
}

#[async_trait]
impl EmployeeDirectory for SqlEmployeeDirectory {
    async fn employee(&self, employee_id: &str) -> Result<Option<EmployeeRecord>, DirectoryError> {
        debug!(event_name = "db.employee.lookup", employee_id, "querying employee directory");
        self.find_by_id(employee_id).await.map_err(|error| match error {
            RepositoryError::Database(error) => DirectoryError::Query(error.to_string()),
            RepositoryError::Decode(reason) => {
                DirectoryError::MalformedRecord { employee_id: employee_id.to_string(), reason }
            }
        })
    }
}
