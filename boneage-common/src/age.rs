//! Age arithmetic for comparing bone age with chronological age
//!
//! Chronological age is counted in whole calendar months: the year and
//! month difference between the date of birth and the reference date,
//! ignoring the day of month.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::round_hundredths;

/// Age split into whole years and the remaining months
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgeBreakdown {
    pub years: i64,
    pub months: f64,
}

impl AgeBreakdown {
    /// Split an age in months, e.g. 87.46 -> 7 years, 3.46 months
    pub fn from_months(total_months: f64) -> Self {
        let years = (total_months / 12.0).floor();
        let months = round_hundredths(total_months - years * 12.0);
        Self {
            years: years as i64,
            months,
        }
    }
}

impl std::fmt::Display for AgeBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}y, {}m", self.years, self.months)
    }
}

/// Parse a `YYYY-MM-DD` date of birth
pub fn parse_date_of_birth(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Chronological age in months on `today`
///
/// Returns `None` for an empty or unparsable date of birth. A date of birth
/// in the future yields a negative age rather than an error.
pub fn chronological_age_months(date_of_birth: &str, today: NaiveDate) -> Option<i64> {
    let birth = parse_date_of_birth(date_of_birth)?;
    let years = i64::from(today.year() - birth.year());
    let months = i64::from(today.month()) - i64::from(birth.month());
    Some(years * 12 + months)
}

/// Bone age minus chronological age, in months (positive = advanced)
pub fn age_difference_months(bone_age_months: f64, chronological_months: i64) -> f64 {
    round_hundredths(bone_age_months - chronological_months as f64)
}
