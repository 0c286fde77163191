use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

impl EmployeeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: EmployeeId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub country: String,
    pub hire_date: NaiveDate,
    /// Remaining days per leave type name.
    pub leave_balances: BTreeMap<String, u32>,
}

impl EmployeeRecord {
    pub fn balance(&self, leave_type: &str) -> u32 {
        self.leave_balances.get(leave_type).copied().unwrap_or(0)
    }
}
