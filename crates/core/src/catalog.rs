//! Leave policy catalogue keyed by country and leave type.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::policy::{BlackoutPeriod, Country, CountryPolicies, LeavePolicy};

/// Source of leave policy data for the eligibility engine.
pub trait PolicyProvider: Send + Sync {
    /// Every policy defined for `country`, or `None` when the provider holds no data for it.
    fn country_policies(&self, country: Country) -> Option<&CountryPolicies>;

    fn policy(&self, country: Country, leave_type: &str) -> Option<&LeavePolicy> {
        self.country_policies(country).and_then(|policies| policies.get(leave_type))
    }
}

#[derive(Clone, Debug, Default)]
pub struct PolicyCatalog {
    countries: BTreeMap<Country, CountryPolicies>,
}

impl PolicyCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country: Country, policies: CountryPolicies) -> Self {
        self.countries.insert(country, policies);
        self
    }

    /// Built-in US and India leave policies.
    pub fn standard() -> Self {
        Self::empty()
            .with_country(Country::Us, us_policies())
            .with_country(Country::India, india_policies())
    }
}

impl PolicyProvider for PolicyCatalog {
    fn country_policies(&self, country: Country) -> Option<&CountryPolicies> {
        self.countries.get(&country).filter(|policies| !policies.is_empty())
    }
}

fn us_policies() -> CountryPolicies {
    let mut policies = BTreeMap::new();
    policies.insert(
        "PTO".to_string(),
        LeavePolicy {
            annual_allowance: Some(20),
            carryover_limit: 5,
            min_notice_days: 3,
            max_consecutive_days: Some(10),
            blackout_periods: year_end_freeze(2026).into_iter().collect(),
            approval_required: true,
            description: "Paid Time Off for US employees".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies.insert(
        "Sick Leave".to_string(),
        LeavePolicy {
            annual_allowance: Some(10),
            documentation_required_after_days: Some(3),
            description: "Sick leave for health-related absences".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies.insert(
        "Parental Leave".to_string(),
        LeavePolicy {
            allowance_weeks: Some(16),
            eligibility_months: Some(12),
            paid: Some(true),
            description: "Paid parental leave for new parents".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies
}

fn india_policies() -> CountryPolicies {
    let mut policies = BTreeMap::new();
    policies.insert(
        "Privilege Leave".to_string(),
        LeavePolicy {
            annual_allowance: Some(18),
            carryover_limit: 30,
            min_notice_days: 7,
            encashment_allowed: true,
            description: "Privilege leave (earned leave) for India employees".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies.insert(
        "Casual Leave".to_string(),
        LeavePolicy {
            annual_allowance: Some(12),
            max_consecutive_days: Some(3),
            description: "Short-term casual leave".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies.insert(
        "Sick Leave".to_string(),
        LeavePolicy {
            annual_allowance: Some(12),
            documentation_required_after_days: Some(2),
            description: "Sick leave for health-related absences".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies.insert(
        "Optional Holidays".to_string(),
        LeavePolicy {
            annual_allowance: Some(3),
            from_list: true,
            advance_booking_required: true,
            description: "Optional holidays from a predefined list".to_string(),
            ..LeavePolicy::default()
        },
    );
    policies
}

fn year_end_freeze(year: i32) -> Option<BlackoutPeriod> {
    let start = NaiveDate::from_ymd_opt(year, 12, 20)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    Some(BlackoutPeriod { start, end })
}
