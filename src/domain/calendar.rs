//! Date-only calendar arithmetic.
//!
//! All dates cross the boundary as `YYYY-MM-DD` with no time zone attached.

use crate::error::{LedgerError, Result};
use chrono::{Months, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a strict `YYYY-MM-DD` date. `field` names the input in the error.
pub fn parse_date(input: &str, field: &str) -> Result<NaiveDate> {
    let text = input.trim();
    let well_formed = text.len() == 10
        && text.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(LedgerError::validation(format!(
            "{field} must be in YYYY-MM-DD format"
        )));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| LedgerError::validation(format!("{field} is not a valid calendar date")))
}

/// Advances `date` by whole calendar months, clamping to the last day of the
/// target month (Jan 31 + 1 month is Feb 28 or 29).
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| LedgerError::validation("due date out of range"))
}

/// Whole days from `from` to `to`; positive when `to` is later.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
