use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "US")]
    Us,
    India,
}

impl Country {
    pub const ALL: [Country; 2] = [Country::Us, Country::India];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::India => "India",
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized country code `{0}`")]
pub struct UnknownCountry(pub String);

impl std::str::FromStr for Country {
    type Err = UnknownCountry;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Self::Us),
            "india" => Ok(Self::India),
            _ => Err(UnknownCountry(value.to_string())),
        }
    }
}

/// Inclusive date range during which a leave type cannot be taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BlackoutPeriod {
    /// `[a, b]` and `[c, d]` overlap unless `b < c` or `a > d`.
    pub fn overlaps(&self, first_day: NaiveDate, last_day: NaiveDate) -> bool {
        !(last_day < self.start || first_day > self.end)
    }
}

impl std::fmt::Display for BlackoutPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid blackout period `{0}` (expected YYYY-MM-DD:YYYY-MM-DD)")]
pub struct InvalidBlackoutPeriod(pub String);

impl std::str::FromStr for BlackoutPeriod {
    type Err = InvalidBlackoutPeriod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidBlackoutPeriod(value.to_string());
        let (start, end) = value.split_once(':').ok_or_else(invalid)?;
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
        let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_allowance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowance_weeks: Option<u32>,
    pub carryover_limit: u32,
    pub min_notice_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_days: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blackout_periods: Vec<BlackoutPeriod>,
    pub approval_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_required_after_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    pub encashment_allowed: bool,
    pub from_list: bool,
    pub advance_booking_required: bool,
    pub description: String,
}

/// Leave type name to policy, for one country.
pub type CountryPolicies = BTreeMap<String, LeavePolicy>;

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{BlackoutPeriod, Country};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_default()
    }

    #[test]
    fn country_codes_parse_case_insensitively() {
        assert_eq!("US".parse::<Country>(), Ok(Country::Us));
        assert_eq!(" india ".parse::<Country>(), Ok(Country::India));
        assert!("UK".parse::<Country>().is_err());
        assert!("".parse::<Country>().is_err());
    }

    #[test]
    fn blackout_period_parses_and_round_trips_display() {
        let period: BlackoutPeriod = "2026-12-20:2026-12-31".parse().unwrap_or(BlackoutPeriod {
            start: date("2000-01-01"),
            end: date("2000-01-01"),
        });
        assert_eq!(period.start, date("2026-12-20"));
        assert_eq!(period.to_string(), "2026-12-20:2026-12-31");
        assert!("2026-12-31:2026-12-20".parse::<BlackoutPeriod>().is_err());
        assert!("2026-12-20".parse::<BlackoutPeriod>().is_err());
    }

    #[test]
    fn overlap_is_inclusive_at_both_edges() {
        let period = BlackoutPeriod { start: date("2026-12-20"), end: date("2026-12-31") };

        assert!(period.overlaps(date("2026-12-18"), date("2026-12-20")));
        assert!(period.overlaps(date("2026-12-31"), date("2027-01-02")));
        assert!(period.overlaps(date("2026-12-23"), date("2026-12-25")));
        assert!(!period.overlaps(date("2026-12-10"), date("2026-12-19")));
        assert!(!period.overlaps(date("2027-01-01"), date("2027-01-03")));
    }
}
