use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;

static DAY_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*days?").expect("valid day count regex"));

/// Lowercase needles and the catalogue key each one resolves to. Later entries win when a
/// message names more than one leave type.
const LEAVE_TYPE_NEEDLES: &[(&str, &str)] = &[
    ("pto", "PTO"),
    ("sick leave", "Sick Leave"),
    ("privilege leave", "Privilege Leave"),
    ("casual leave", "Casual Leave"),
    ("parental leave", "Parental Leave"),
    ("optional holiday", "Optional Holidays"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveField {
    LeaveType,
    StartDate,
    NumDays,
}

impl LeaveField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaveType => "leave_type",
            Self::StartDate => "start_date",
            Self::NumDays => "num_days",
        }
    }

    pub fn clarifying_question(&self) -> &'static str {
        match self {
            Self::LeaveType => "Which type of leave is this (PTO, Sick Leave, etc)?",
            Self::StartDate => "When should the leave start?",
            Self::NumDays => "How many days do you want?",
        }
    }
}

/// The leave request a user is building up across turns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LeaveRequestState {
    pub leave_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub num_days: Option<u32>,
}

impl LeaveRequestState {
    pub fn missing_fields(&self) -> Vec<LeaveField> {
        let mut missing = Vec::new();
        if self.leave_type.as_deref().map_or(true, str::is_empty) {
            missing.push(LeaveField::LeaveType);
        }
        if self.start_date.is_none() {
            missing.push(LeaveField::StartDate);
        }
        if self.num_days.map_or(true, |days| days == 0) {
            missing.push(LeaveField::NumDays);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct LeaveRequestExtractor;

impl LeaveRequestExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Folds whatever the message states into `state` and returns the fields it set.
    /// Fields the message says nothing about keep their previous value.
    pub fn apply(
        &self,
        message: &str,
        today: NaiveDate,
        state: &mut LeaveRequestState,
    ) -> Vec<LeaveField> {
        let normalized_text = normalize_text(message);
        let mut updated = Vec::new();

        if let Some(days) = extract_day_count(&normalized_text) {
            state.num_days = Some(days);
            updated.push(LeaveField::NumDays);
        }

        if let Some(leave_type) = extract_leave_type(&normalized_text) {
            state.leave_type = Some(leave_type.to_string());
            updated.push(LeaveField::LeaveType);
        }

        if let Some(start_date) = extract_start_date(&normalized_text, today) {
            state.start_date = Some(start_date);
            updated.push(LeaveField::StartDate);
        }

        updated
    }
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}

fn extract_day_count(text: &str) -> Option<u32> {
    DAY_COUNT.captures(text).and_then(|captures| captures.get(1)?.as_str().parse().ok())
}

fn extract_leave_type(text: &str) -> Option<&'static str> {
    LEAVE_TYPE_NEEDLES
        .iter()
        .filter(|(needle, _)| text.contains(needle))
        .map(|(_, canonical)| *canonical)
        .last()
}

fn extract_start_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if text.contains("tomorrow") {
        today.checked_add_signed(Duration::days(1))
    } else {
        None
    }
}
