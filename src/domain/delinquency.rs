//! Payment status of installments and athletes.

use super::calendar::days_between;
use super::enrollment::Installment;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// An athlete with an installment overdue by more than this many days may not
/// log activities.
pub const BLOCK_AFTER_OVERDUE_DAYS: i64 = 10;

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(tag = "status", content = "overdue_days", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Paid,
    Open,
    /// Exactly one day past due.
    Overdue,
    OverdueNDays(i64),
    /// Display only; the athlete verdict is what gates activities.
    Blocked(i64),
}

impl InstallmentStatus {
    pub fn evaluate(due_date: NaiveDate, paid_at: Option<NaiveDate>, today: NaiveDate) -> Self {
        if paid_at.is_some() {
            return Self::Paid;
        }
        if today <= due_date {
            return Self::Open;
        }
        match days_between(due_date, today) {
            days if days > BLOCK_AFTER_OVERDUE_DAYS => Self::Blocked(days),
            days if days > 1 => Self::OverdueNDays(days),
            _ => Self::Overdue,
        }
    }

    pub fn of(installment: &Installment, today: NaiveDate) -> Self {
        Self::evaluate(installment.due_date, installment.paid_at, today)
    }

    pub fn overdue_days(&self) -> i64 {
        match self {
            Self::Paid | Self::Open => 0,
            Self::Overdue => 1,
            Self::OverdueNDays(days) | Self::Blocked(days) => *days,
        }
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paid => write!(f, "Paid"),
            Self::Open => write!(f, "Open"),
            Self::Overdue => write!(f, "Overdue"),
            Self::OverdueNDays(days) => write!(f, "Overdue for {days} days"),
            Self::Blocked(_) => write!(f, "Blocked"),
        }
    }
}

/// Aggregate payment health of an athlete.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentVerdict {
    OnTrack,
    GracePeriod { max_overdue_days: i64 },
    Blocked { max_overdue_days: i64 },
}

impl PaymentVerdict {
    /// Derives the verdict from the due dates of the athlete's unpaid
    /// installments. Only dates strictly before `today` count.
    pub fn from_unpaid_due_dates<I>(due_dates: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let max_overdue = due_dates
            .into_iter()
            .filter(|due| *due < today)
            .map(|due| days_between(due, today))
            .max();
        match max_overdue {
            None => Self::OnTrack,
            Some(days) if days > BLOCK_AFTER_OVERDUE_DAYS => Self::Blocked {
                max_overdue_days: days,
            },
            Some(days) => Self::GracePeriod {
                max_overdue_days: days,
            },
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn max_overdue_days(&self) -> i64 {
        match self {
            Self::OnTrack => 0,
            Self::GracePeriod { max_overdue_days } | Self::Blocked { max_overdue_days } => {
                *max_overdue_days
            }
        }
    }
}

impl fmt::Display for PaymentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnTrack => write!(f, "On track"),
            Self::GracePeriod { max_overdue_days } => {
                write!(f, "Late {max_overdue_days} day(s)")
            }
            Self::Blocked { .. } => write!(f, "Blocked for non-payment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_installment_status_table() {
        let due = d("2024-03-10");
        let paid = Some(d("2024-03-30"));
        assert_eq!(
            InstallmentStatus::evaluate(due, paid, d("2024-04-30")),
            InstallmentStatus::Paid
        );
        assert_eq!(
            InstallmentStatus::evaluate(due, None, d("2024-03-01")),
            InstallmentStatus::Open
        );
        assert_eq!(
            InstallmentStatus::evaluate(due, None, d("2024-03-10")),
            InstallmentStatus::Open
        );
        assert_eq!(
            InstallmentStatus::evaluate(due, None, d("2024-03-11")),
            InstallmentStatus::Overdue
        );
        assert_eq!(
            InstallmentStatus::evaluate(due, None, d("2024-03-12")),
            InstallmentStatus::OverdueNDays(2)
        );
        assert_eq!(
            InstallmentStatus::evaluate(due, None, d("2024-03-20")),
            InstallmentStatus::OverdueNDays(10)
        );
        assert_eq!(
            InstallmentStatus::evaluate(due, None, d("2024-03-21")),
            InstallmentStatus::Blocked(11)
        );
    }

    #[test]
    fn test_verdict_examples() {
        let today = d("2024-03-20");
        assert_eq!(
            PaymentVerdict::from_unpaid_due_dates([d("2024-03-01")], today),
            PaymentVerdict::Blocked { max_overdue_days: 19 }
        );
        assert_eq!(
            PaymentVerdict::from_unpaid_due_dates([d("2024-03-15")], today),
            PaymentVerdict::GracePeriod { max_overdue_days: 5 }
        );
        assert_eq!(
            PaymentVerdict::from_unpaid_due_dates([d("2024-03-20")], today),
            PaymentVerdict::OnTrack
        );
        assert_eq!(
            PaymentVerdict::from_unpaid_due_dates(std::iter::empty(), today),
            PaymentVerdict::OnTrack
        );
    }

    #[test]
    fn test_verdict_uses_the_oldest_debt() {
        let today = d("2024-03-20");
        let verdict = PaymentVerdict::from_unpaid_due_dates(
            [d("2024-03-18"), d("2024-03-09"), d("2024-04-01")],
            today,
        );
        assert_eq!(verdict, PaymentVerdict::Blocked { max_overdue_days: 11 });
        assert!(verdict.is_blocked());

        let verdict = PaymentVerdict::from_unpaid_due_dates([d("2024-03-10")], today);
        assert_eq!(verdict, PaymentVerdict::GracePeriod { max_overdue_days: 10 });
        assert!(!verdict.is_blocked());
    }

    #[test]
    fn test_verdict_serializes_with_tag() {
        let json =
            serde_json::to_string(&PaymentVerdict::GracePeriod { max_overdue_days: 3 }).unwrap();
        assert_eq!(json, r#"{"verdict":"GRACE_PERIOD","max_overdue_days":3}"#);
    }
}
