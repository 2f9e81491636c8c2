use super::calendar::{add_months, parse_date};
use super::money::Cents;
use super::{AthleteId, EnrollmentId, InstallmentId};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_INSTALLMENTS: u8 = 2;
pub const MAX_INSTALLMENTS: u8 = 12;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Installments,
}

impl FromStr for PaymentType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cash" => Ok(Self::Cash),
            "installments" => Ok(Self::Installments),
            other => Err(LedgerError::validation(format!(
                "invalid payment type: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Cash => write!(f, "cash"),
            PaymentType::Installments => write!(f, "installments"),
        }
    }
}

/// A payment plan as submitted by the organizer, before validation.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PlanRequest {
    pub total_amount: String,
    pub payment_type: String,
    /// Ignored for cash plans.
    pub installments_count: Option<i64>,
    pub first_due_date: String,
}

/// Validated payment terms. Constructing one is the only way to reach the
/// store, so every persisted plan has passed these checks.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PaymentTerms {
    pub total: Cents,
    pub payment_type: PaymentType,
    pub installments_count: u8,
    pub first_due_date: NaiveDate,
}

impl PlanRequest {
    pub fn validate(&self) -> Result<PaymentTerms> {
        let total = Cents::parse_positive(&self.total_amount)?;
        let payment_type: PaymentType = self.payment_type.parse()?;
        let installments_count = match payment_type {
            PaymentType::Cash => 1,
            PaymentType::Installments => {
                let count = self.installments_count.ok_or_else(|| {
                    LedgerError::validation("installments count is required")
                })?;
                u8::try_from(count)
                    .ok()
                    .filter(|c| (MIN_INSTALLMENTS..=MAX_INSTALLMENTS).contains(c))
                    .ok_or_else(|| {
                        LedgerError::validation(format!(
                            "installments count must be between {MIN_INSTALLMENTS} and {MAX_INSTALLMENTS}"
                        ))
                    })?
            }
        };
        let first_due_date = parse_date(&self.first_due_date, "first due date")?;
        Ok(PaymentTerms {
            total,
            payment_type,
            installments_count,
            first_due_date,
        })
    }
}

/// One obligation of a schedule that has not been persisted yet.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ScheduledInstallment {
    pub number: u8,
    pub due_date: NaiveDate,
    pub amount: Cents,
}

impl PaymentTerms {
    /// Expands the terms into the full installment schedule.
    ///
    /// Installment `k` (0-based) is due `k` calendar months after the first
    /// due date and receives its share of the total from [`Cents::split`].
    pub fn schedule(&self) -> Result<Vec<ScheduledInstallment>> {
        self.total
            .split(self.installments_count)
            .into_iter()
            .enumerate()
            .map(|(k, amount)| {
                Ok(ScheduledInstallment {
                    number: k as u8 + 1,
                    due_date: add_months(self.first_due_date, k as u32)?,
                    amount,
                })
            })
            .collect()
    }
}

/// Validated terms together with the schedule they expand to; what the store
/// persists when a plan is created or replaced.
#[derive(Debug, PartialEq, Clone)]
pub struct Plan {
    pub terms: PaymentTerms,
    pub schedule: Vec<ScheduledInstallment>,
}

impl Plan {
    pub fn from_request(request: &PlanRequest) -> Result<Self> {
        let terms = request.validate()?;
        let schedule = terms.schedule()?;
        Ok(Self { terms, schedule })
    }

    /// Turns the schedule into installment rows for `enrollment_id`, taking
    /// ids from `next_id` in order.
    pub fn installments(
        &self,
        enrollment_id: EnrollmentId,
        mut next_id: impl FnMut() -> InstallmentId,
    ) -> Vec<Installment> {
        self.schedule
            .iter()
            .map(|scheduled| Installment {
                id: next_id(),
                enrollment_id,
                number: scheduled.number,
                due_date: scheduled.due_date,
                amount: scheduled.amount,
                paid_at: None,
                note: String::new(),
            })
            .collect()
    }
}

/// An athlete's payment plan.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub athlete_id: AthleteId,
    pub total_amount: Cents,
    pub payment_type: PaymentType,
    pub installments_count: u8,
    pub first_due_date: NaiveDate,
}

impl Enrollment {
    pub fn new(id: EnrollmentId, athlete_id: AthleteId, terms: &PaymentTerms) -> Self {
        Self {
            id,
            athlete_id,
            total_amount: terms.total,
            payment_type: terms.payment_type,
            installments_count: terms.installments_count,
            first_due_date: terms.first_due_date,
        }
    }

    pub fn apply_terms(&mut self, terms: &PaymentTerms) {
        self.total_amount = terms.total;
        self.payment_type = terms.payment_type;
        self.installments_count = terms.installments_count;
        self.first_due_date = terms.first_due_date;
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Installment {
    pub id: InstallmentId,
    pub enrollment_id: EnrollmentId,
    pub number: u8,
    pub due_date: NaiveDate,
    pub amount: Cents,
    pub paid_at: Option<NaiveDate>,
    pub note: String,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    pub fn mark_paid(&mut self, paid_at: NaiveDate, note: Option<String>) {
        self.paid_at = Some(paid_at);
        if let Some(note) = note {
            self.note = note;
        }
    }

    pub fn reopen(&mut self, note: Option<String>) {
        self.paid_at = None;
        if let Some(note) = note {
            self.note = note;
        }
    }
}
