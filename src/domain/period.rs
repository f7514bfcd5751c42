//! Calendar month periods.
//!
//! A [`Period`] is a validated (year, month) pair. Period-scoped reads and
//! recurring materialization both work in whole calendar months.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A calendar month, e.g. February 2024.
///
/// Deserialization goes through [`Period::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = LedgerError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Self::new(raw.month, raw.year)
    }
}

impl Period {
    /// Creates a period for the given month (1–12) of `year`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if the month is outside
    /// 1–12 or the year is outside the supported calendar range.
    pub fn new(month: u32, year: i32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidRequest(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(LedgerError::InvalidRequest(format!(
                "year {year} is out of range"
            )));
        }
        Ok(Self { year, month })
    }

    /// Returns the period containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month (1–12).
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the period.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the period.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Returns `true` if `date` falls inside the period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Date of `day_of_month` within the period, clamped to the last day
    /// (day 31 in February resolves to the 28th or 29th).
    #[must_use]
    pub fn clamped_date(&self, day_of_month: u32) -> NaiveDate {
        let last = self.last_day();
        let day = day_of_month.clamp(1, last.day());
        last.with_day(day).unwrap_or(last)
    }

    /// The following calendar month.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] when the following month is
    /// past the supported calendar range.
    pub fn next(&self) -> Result<Self, LedgerError> {
        if self.month == 12 {
            let year = self.year.checked_add(1).ok_or_else(|| {
                LedgerError::InvalidRequest(format!("year {} has no successor", self.year))
            })?;
            Self::new(1, year)
        } else {
            Self::new(self.month + 1, self.year)
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn period(month: u32, year: i32) -> Period {
        let Ok(p) = Period::new(month, year) else {
            panic!("valid period");
        };
        p
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        date
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert!(Period::new(0, 2024).is_err());
        assert!(Period::new(13, 2024).is_err());
    }

    #[test]
    fn bounds_of_leap_february() {
        let feb = period(2, 2024);
        assert_eq!(feb.first_day(), date(2024, 2, 1));
        assert_eq!(feb.last_day(), date(2024, 2, 29));
    }

    #[test]
    fn clamps_overflow_days() {
        assert_eq!(period(2, 2024).clamped_date(31), date(2024, 2, 29));
        assert_eq!(period(2, 2023).clamped_date(31), date(2023, 2, 28));
        assert_eq!(period(4, 2024).clamped_date(31), date(2024, 4, 30));
        assert_eq!(period(1, 2024).clamped_date(15), date(2024, 1, 15));
    }

    #[test]
    fn next_rolls_over_year() {
        assert_eq!(period(12, 2023).next().ok(), Some(period(1, 2024)));
        assert_eq!(period(6, 2024).next().ok(), Some(period(7, 2024)));
    }

    #[test]
    fn next_stops_at_last_supported_month() {
        let last = period(12, 262_142);
        assert_eq!(last.last_day(), date(262_142, 12, 31));
        assert!(matches!(last.next(), Err(LedgerError::InvalidRequest(_))));
        assert!(period(11, 262_142).next().is_ok());
    }

    #[test]
    fn deserialization_is_validated() {
        let Ok(parsed) = serde_json::from_str::<Period>(r#"{"year":2024,"month":2}"#) else {
            panic!("valid period json");
        };
        assert_eq!(parsed, period(2, 2024));
        assert!(serde_json::from_str::<Period>(r#"{"year":2024,"month":13}"#).is_err());
        assert!(serde_json::from_str::<Period>(r#"{"year":262143,"month":1}"#).is_err());
    }

    #[test]
    fn contains_only_its_own_days() {
        let march = period(3, 2024);
        assert!(march.contains(date(2024, 3, 31)));
        assert!(!march.contains(date(2024, 4, 1)));
        assert!(!march.contains(date(2023, 3, 15)));
    }

    #[test]
    fn displays_as_year_month() {
        assert_eq!(period(3, 2024).to_string(), "2024-03");
    }
}
