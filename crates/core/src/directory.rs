//! Employee directory access.
//!
//! The eligibility engine never talks to the primary data source directly. Every lookup goes
//! through [`ResilientDirectory`], which wraps the primary in a circuit breaker and answers from
//! the in-memory demo directory whenever the primary is failing or the breaker is open.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::domain::employee::{EmployeeId, EmployeeRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("employee directory unavailable: {0}")]
    Unavailable(String),
    #[error("employee directory query failed: {0}")]
    Query(String),
    #[error("employee record `{employee_id}` is malformed: {reason}")]
    MalformedRecord { employee_id: String, reason: String },
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// `Ok(None)` means the directory answered and has no such employee.
    async fn employee(&self, employee_id: &str) -> Result<Option<EmployeeRecord>, DirectoryError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryEmployeeDirectory {
    records: BTreeMap<String, EmployeeRecord>,
}

impl InMemoryEmployeeDirectory {
    pub fn new(records: impl IntoIterator<Item = EmployeeRecord>) -> Self {
        let records =
            records.into_iter().map(|record| (record.employee_id.0.clone(), record)).collect();
        Self { records }
    }

    pub fn with_demo_employees() -> Self {
        Self::new(demo_employees())
    }

    pub fn records(&self) -> impl Iterator<Item = &EmployeeRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryEmployeeDirectory {
    async fn employee(&self, employee_id: &str) -> Result<Option<EmployeeRecord>, DirectoryError> {
        Ok(self.records.get(employee_id).cloned())
    }
}

/// Two demo employees, one per supported country.
pub fn demo_employees() -> Vec<EmployeeRecord> {
    vec![
        EmployeeRecord {
            employee_id: EmployeeId("E001".to_string()),
            name: "John Doe".to_string(),
            email: "john.doe@company.com".to_string(),
            department: "Engineering".to_string(),
            country: "US".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2022, 1, 15).unwrap_or_default(),
            leave_balances: BTreeMap::from([
                ("PTO".to_string(), 15),
                ("Sick Leave".to_string(), 8),
                ("Parental Leave".to_string(), 0),
            ]),
        },
        EmployeeRecord {
            employee_id: EmployeeId("E002".to_string()),
            name: "Priya Sharma".to_string(),
            email: "priya.sharma@company.com".to_string(),
            department: "Marketing".to_string(),
            country: "India".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2021, 6, 10).unwrap_or_default(),
            leave_balances: BTreeMap::from([
                ("Privilege Leave".to_string(), 12),
                ("Casual Leave".to_string(), 10),
                ("Sick Leave".to_string(), 12),
                ("Optional Holidays".to_string(), 2),
            ]),
        },
    ]
}

pub struct ResilientDirectory {
    primary: Arc<dyn EmployeeDirectory>,
    fallback: InMemoryEmployeeDirectory,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientDirectory {
    pub fn new(
        primary: Arc<dyn EmployeeDirectory>,
        fallback: InMemoryEmployeeDirectory,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self { primary, fallback, breaker }
    }

    /// Demo mode: the demo directory serves as both primary and fallback.
    pub fn demo(breaker: Arc<CircuitBreaker>) -> Self {
        let demo = InMemoryEmployeeDirectory::with_demo_employees();
        Self::new(Arc::new(demo.clone()), demo, breaker)
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl EmployeeDirectory for ResilientDirectory {
    async fn employee(&self, employee_id: &str) -> Result<Option<EmployeeRecord>, DirectoryError> {
        match self.breaker.call(|| self.primary.employee(employee_id)).await {
            Ok(record) => Ok(record),
            Err(CircuitBreakerError::Open { name }) => {
                info!(
                    event_name = "system.directory.fallback",
                    breaker = %name,
                    employee_id,
                    "circuit open, serving employee lookup from fallback directory"
                );
                self.fallback.employee(employee_id).await
            }
            Err(CircuitBreakerError::Inner(error)) => {
                warn!(
                    event_name = "system.directory.fallback",
                    employee_id,
                    error = %error,
                    "primary directory lookup failed, serving from fallback directory"
                );
                self.fallback.employee(employee_id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{
        DirectoryError, EmployeeDirectory, InMemoryEmployeeDirectory, ResilientDirectory,
    };
    use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    use crate::domain::employee::EmployeeRecord;

    #[derive(Default)]
    struct FailingDirectory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmployeeDirectory for FailingDirectory {
        async fn employee(&self, _: &str) -> Result<Option<EmployeeRecord>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DirectoryError::Unavailable("warehouse connection refused".to_string()))
        }
    }

    fn breaker(threshold: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "employee-directory",
            CircuitBreakerConfig::default()
                .with_failure_threshold(threshold)
                .with_reset_timeout(Duration::from_secs(60)),
        ))
    }

    #[tokio::test]
    async fn demo_directory_resolves_known_employees_only() {
        let directory = InMemoryEmployeeDirectory::with_demo_employees();

        let john = directory.employee("E001").await.ok().flatten();
        assert_eq!(john.as_ref().map(|record| record.name.as_str()), Some("John Doe"));
        assert_eq!(john.map(|record| record.balance("PTO")), Some(15));

        let missing = directory.employee("E999").await;
        assert_eq!(missing, Ok(None));
    }

    #[tokio::test]
    async fn failing_primary_falls_back_and_eventually_opens_the_breaker() {
        let primary = Arc::new(FailingDirectory::default());
        let breaker = breaker(2);
        let directory = ResilientDirectory::new(
            primary.clone(),
            InMemoryEmployeeDirectory::with_demo_employees(),
            breaker.clone(),
        );

        for _ in 0..4 {
            let record = directory.employee("E002").await.ok().flatten();
            assert_eq!(record.map(|record| record.country), Some("India".to_string()));
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn primary_not_found_is_not_replaced_by_fallback() {
        let primary = Arc::new(InMemoryEmployeeDirectory::default());
        let directory = ResilientDirectory::new(
            primary,
            InMemoryEmployeeDirectory::with_demo_employees(),
            breaker(5),
        );

        assert_eq!(directory.employee("E001").await, Ok(None));
        assert_eq!(directory.breaker().failure_count(), 0);
    }
}
