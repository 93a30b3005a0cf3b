use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Built-in leave types, matching the default business configuration.
/// Businesses can narrow this set through `leave_type_configs`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Annual,
    Sick,
    Emergency,
    Maternity,
    Paternity,
    Unpaid,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// Inclusive day count of a leave span. A single-day leave counts as 1.
pub fn days_between_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn duration_is_inclusive() {
        assert_eq!(days_between_inclusive(d("2024-01-15"), d("2024-01-19")), 5);
        assert_eq!(days_between_inclusive(d("2024-02-10"), d("2024-02-12")), 3);
    }

    #[test]
    fn single_day_leave_counts_one() {
        assert_eq!(days_between_inclusive(d("2024-03-01"), d("2024-03-01")), 1);
    }

    #[test]
    fn duration_spans_month_boundary() {
        assert_eq!(days_between_inclusive(d("2024-01-30"), d("2024-02-02")), 4);
    }

    #[test]
    fn leave_type_tags_round_trip() {
        assert_eq!(LeaveType::from_str("ANNUAL").unwrap(), LeaveType::Annual);
        assert_eq!(LeaveType::Maternity.to_string(), "MATERNITY");
        assert!(LeaveType::from_str("SABBATICAL").is_err());
    }

    #[test]
    fn status_tags_round_trip() {
        assert_eq!(LeaveStatus::from_str("PENDING").unwrap(), LeaveStatus::Pending);
        assert_eq!(LeaveStatus::Approved.to_string(), "APPROVED");
    }
}
