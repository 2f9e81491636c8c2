use super::engine::LedgerEngine;
use crate::domain::calendar::{days_between, parse_date};
use crate::domain::delinquency::{BLOCK_AFTER_OVERDUE_DAYS, InstallmentStatus, PaymentVerdict};
use crate::domain::enrollment::{Enrollment, Installment, Plan, PlanRequest};
use crate::domain::money::Cents;
use crate::domain::ports::InstallmentRow;
use crate::domain::{AthleteId, ChallengeId, InstallmentId, OwnerId};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct InstallmentView {
    #[serde(flatten)]
    pub installment: Installment,
    pub status: InstallmentStatus,
}

/// Everything the payments screen shows for one athlete.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AthletePayments {
    pub enrollment: Enrollment,
    pub installments: Vec<InstallmentView>,
    pub verdict: PaymentVerdict,
    pub challenge_id: ChallengeId,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Blocked,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Blocked => write!(f, "blocked"),
        }
    }
}

/// An unpaid installment past its due date.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PendingObligation {
    pub row: InstallmentRow,
    pub overdue_days: i64,
    pub severity: Severity,
}

impl PendingObligation {
    fn new(row: InstallmentRow, today: NaiveDate) -> Self {
        let overdue_days = days_between(row.installment.due_date, today);
        let severity = if overdue_days > BLOCK_AFTER_OVERDUE_DAYS {
            Severity::Blocked
        } else {
            Severity::Warning
        };
        Self {
            row,
            overdue_days,
            severity,
        }
    }
}

/// Filters for [`LedgerEngine::finance_summary`]. The date range applies to
/// due dates for the totals and to paid dates for the paid list.
#[derive(Debug, Default, Clone, Copy)]
pub struct FinanceFilter {
    pub challenge_id: Option<ChallengeId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FinanceFilter {
    fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub struct FinanceTotals {
    pub expected: Cents,
    pub received: Cents,
    pub open: Cents,
    pub delinquent: Cents,
    pub delinquent_athletes: usize,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct FinanceSummary {
    pub totals: FinanceTotals,
    /// Newest payment first.
    pub paid: Vec<InstallmentRow>,
    pub overdue: Vec<PendingObligation>,
}

impl LedgerEngine {
    /// Creates or replaces the athlete's payment plan.
    ///
    /// An existing enrollment keeps its id; its installments are all deleted
    /// and regenerated from the new terms in the same store operation.
    pub async fn submit_plan(
        &self,
        owner: OwnerId,
        athlete_id: AthleteId,
        request: &PlanRequest,
    ) -> Result<Enrollment> {
        self.authorize_athlete(owner, athlete_id).await?;
        let plan = Plan::from_request(request)?;
        let enrollment = self.store.replace_plan(athlete_id, &plan).await?;
        info!(
            athlete_id,
            enrollment_id = enrollment.id,
            total = %enrollment.total_amount,
            installments = enrollment.installments_count,
            "payment plan replaced"
        );
        Ok(enrollment)
    }

    /// Marks the installment paid on `paid_date`, or today when absent.
    /// Marking an already paid installment overwrites its date.
    pub async fn set_installment_paid(
        &self,
        owner: OwnerId,
        installment_id: InstallmentId,
        paid_date: Option<&str>,
        note: Option<&str>,
    ) -> Result<Installment> {
        let mut installment = self
            .authorize_installment(owner, installment_id)
            .await?
            .installment;
        let paid_at = match paid_date {
            Some(text) => parse_date(text, "payment date")?,
            None => self.clock.today(),
        };
        installment.mark_paid(paid_at, note.map(|n| n.trim().to_string()));
        self.store.update_installment(installment.clone()).await?;
        info!(installment_id, %paid_at, "installment marked paid");
        Ok(installment)
    }

    /// Clears the paid date of the installment.
    pub async fn set_installment_open(
        &self,
        owner: OwnerId,
        installment_id: InstallmentId,
        note: Option<&str>,
    ) -> Result<Installment> {
        let mut installment = self
            .authorize_installment(owner, installment_id)
            .await?
            .installment;
        installment.reopen(note.map(|n| n.trim().to_string()));
        self.store.update_installment(installment.clone()).await?;
        info!(installment_id, "installment reopened");
        Ok(installment)
    }

    pub async fn payment_verdict(
        &self,
        owner: OwnerId,
        athlete_id: AthleteId,
    ) -> Result<PaymentVerdict> {
        self.authorize_athlete(owner, athlete_id).await?;
        self.verdict_for(athlete_id).await
    }

    /// Verdict without the ownership check, for callers that already hold a
    /// resolved chain.
    pub(crate) async fn verdict_for(&self, athlete_id: AthleteId) -> Result<PaymentVerdict> {
        let today = self.clock.today();
        let overdue = self.store.unpaid_due_before(athlete_id, today).await?;
        let verdict =
            PaymentVerdict::from_unpaid_due_dates(overdue.iter().map(|i| i.due_date), today);
        debug!(athlete_id, %today, ?verdict, "payment verdict");
        Ok(verdict)
    }

    pub async fn athlete_payments(
        &self,
        owner: OwnerId,
        athlete_id: AthleteId,
    ) -> Result<AthletePayments> {
        let chain = self.authorize_athlete(owner, athlete_id).await?;
        let enrollment = self.store.enrollment_of(athlete_id).await?.ok_or_else(|| {
            LedgerError::validation(format!("athlete {} has no payment plan", chain.athlete_name))
        })?;
        let today = self.clock.today();
        let installments = self
            .store
            .installments_of(athlete_id)
            .await?
            .into_iter()
            .map(|installment| InstallmentView {
                status: InstallmentStatus::of(&installment, today),
                installment,
            })
            .collect();
        Ok(AthletePayments {
            enrollment,
            installments,
            verdict: self.verdict_for(athlete_id).await?,
            challenge_id: chain.challenge_id,
        })
    }

    /// Unpaid installments already past due across the owner's challenges.
    pub async fn pending_obligations(
        &self,
        owner: OwnerId,
        challenge_id: Option<ChallengeId>,
    ) -> Result<Vec<PendingObligation>> {
        let today = self.clock.today();
        Ok(self
            .store
            .unpaid_obligations(owner, challenge_id, today)
            .await?
            .into_iter()
            .map(|row| PendingObligation::new(row, today))
            .collect())
    }

    pub async fn finance_summary(
        &self,
        owner: OwnerId,
        filter: FinanceFilter,
    ) -> Result<FinanceSummary> {
        let today = self.clock.today();
        let rows = self.store.owner_installments(owner, filter.challenge_id).await?;

        let mut paid: Vec<InstallmentRow> = rows
            .iter()
            .filter(|r| r.installment.paid_at.is_some_and(|d| filter.contains(d)))
            .cloned()
            .collect();
        paid.sort_by(|a, b| b.installment.paid_at.cmp(&a.installment.paid_at));

        let in_range: Vec<InstallmentRow> = rows
            .into_iter()
            .filter(|r| filter.contains(r.installment.due_date))
            .collect();
        let expected: Cents = in_range.iter().map(|r| r.installment.amount).sum();
        let received: Cents = in_range
            .iter()
            .filter(|r| r.installment.is_paid())
            .map(|r| r.installment.amount)
            .sum();

        let overdue: Vec<PendingObligation> = in_range
            .into_iter()
            .filter(|r| !r.installment.is_paid() && r.installment.due_date < today)
            .map(|row| PendingObligation::new(row, today))
            .collect();
        let delinquent: Cents = overdue.iter().map(|o| o.row.installment.amount).sum();
        let delinquent_athletes = overdue
            .iter()
            .map(|o| o.row.athlete_id)
            .collect::<HashSet<_>>()
            .len();

        Ok(FinanceSummary {
            totals: FinanceTotals {
                expected,
                received,
                open: expected - received,
                delinquent,
                delinquent_athletes,
            },
            paid,
            overdue,
        })
    }
}
