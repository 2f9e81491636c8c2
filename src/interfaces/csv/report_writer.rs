//! Flat CSV rows for the command line reports.
//!
//! The csv crate cannot serialize nested or flattened structs, so every
//! report gets its own row type built from the application view.

use crate::application::activities::{ActivityEntry, RecordedActivity};
use crate::application::engine::AthleteSummary;
use crate::application::payments::{FinanceTotals, InstallmentView, PendingObligation};
use crate::domain::challenge::{ChallengeProgress, ChallengeSummary};
use crate::domain::enrollment::Enrollment;
use crate::domain::ports::InstallmentRow;
use crate::domain::ranking::Standing;
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one line per row after a header taken from the row's field
    /// names. An empty report writes nothing.
    pub fn write_rows<R, I>(&mut self, rows: I) -> Result<()>
    where
        R: Serialize,
        I: IntoIterator<Item = R>,
    {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ChallengeRow {
    pub id: u64,
    pub title: String,
    pub goal_km: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_km: f64,
    pub athletes: usize,
}

impl From<ChallengeSummary> for ChallengeRow {
    fn from(summary: ChallengeSummary) -> Self {
        Self {
            id: summary.challenge.id,
            title: summary.challenge.title,
            goal_km: summary.challenge.goal_km,
            start_date: summary.challenge.start_date,
            end_date: summary.challenge.end_date,
            total_km: summary.total_km,
            athletes: summary.athletes_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AthleteRow {
    pub id: u64,
    pub name: String,
    pub bib_number: Option<String>,
    pub total_km: f64,
    pub last_activity_date: Option<NaiveDate>,
    pub payment: String,
    pub overdue_days: i64,
}

impl From<AthleteSummary> for AthleteRow {
    fn from(summary: AthleteSummary) -> Self {
        Self {
            id: summary.athlete.id,
            name: summary.athlete.name,
            bib_number: summary.athlete.profile.bib_number,
            total_km: summary.total_km,
            last_activity_date: summary.last_activity_date,
            payment: summary.payment.to_string(),
            overdue_days: summary.payment.max_overdue_days(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentRow {
    pub enrollment: u64,
    pub athlete: u64,
    pub total_amount: String,
    pub payment_type: String,
    pub installments: u8,
    pub first_due_date: NaiveDate,
}

impl From<Enrollment> for EnrollmentRow {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            enrollment: enrollment.id,
            athlete: enrollment.athlete_id,
            total_amount: enrollment.total_amount.to_string(),
            payment_type: enrollment.payment_type.to_string(),
            installments: enrollment.installments_count,
            first_due_date: enrollment.first_due_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstallmentLine {
    pub id: u64,
    pub number: u8,
    pub due_date: NaiveDate,
    pub amount: String,
    pub paid_at: Option<NaiveDate>,
    pub status: String,
    pub note: String,
}

impl From<InstallmentView> for InstallmentLine {
    fn from(view: InstallmentView) -> Self {
        Self {
            id: view.installment.id,
            number: view.installment.number,
            due_date: view.installment.due_date,
            amount: view.installment.amount.to_string(),
            paid_at: view.installment.paid_at,
            status: view.status.to_string(),
            note: view.installment.note,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ObligationRow {
    pub installment: u64,
    pub challenge: String,
    pub athlete: String,
    pub number: u8,
    pub due_date: NaiveDate,
    pub amount: String,
    pub overdue_days: i64,
    pub severity: String,
}

impl From<PendingObligation> for ObligationRow {
    fn from(pending: PendingObligation) -> Self {
        let row = pending.row;
        Self {
            installment: row.installment.id,
            challenge: row.challenge_title,
            athlete: row.athlete_name,
            number: row.installment.number,
            due_date: row.installment.due_date,
            amount: row.installment.amount.to_string(),
            overdue_days: pending.overdue_days,
            severity: pending.severity.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentRow {
    pub installment: u64,
    pub challenge: String,
    pub athlete: String,
    pub number: u8,
    pub paid_at: Option<NaiveDate>,
    pub amount: String,
}

impl From<InstallmentRow> for PaymentRow {
    fn from(row: InstallmentRow) -> Self {
        Self {
            installment: row.installment.id,
            challenge: row.challenge_title,
            athlete: row.athlete_name,
            number: row.installment.number,
            paid_at: row.installment.paid_at,
            amount: row.installment.amount.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FinanceRow {
    pub expected: String,
    pub received: String,
    pub open: String,
    pub delinquent: String,
    pub delinquent_athletes: usize,
}

impl From<FinanceTotals> for FinanceRow {
    fn from(totals: FinanceTotals) -> Self {
        Self {
            expected: totals.expected.to_string(),
            received: totals.received.to_string(),
            open: totals.open.to_string(),
            delinquent: totals.delinquent.to_string(),
            delinquent_athletes: totals.delinquent_athletes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityLine {
    pub id: u64,
    pub athlete: u64,
    pub athlete_name: String,
    pub date: NaiveDate,
    pub km: f64,
    pub note: Option<String>,
}

impl From<ActivityEntry> for ActivityLine {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.activity.id,
            athlete: entry.activity.athlete_id,
            athlete_name: entry.athlete_name,
            date: entry.activity.date,
            km: entry.activity.km,
            note: entry.activity.note,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordedRow {
    pub id: u64,
    pub athlete: u64,
    pub challenge: u64,
    pub date: NaiveDate,
    pub km: f64,
    pub payment: String,
}

impl From<RecordedActivity> for RecordedRow {
    fn from(recorded: RecordedActivity) -> Self {
        Self {
            id: recorded.activity.id,
            athlete: recorded.activity.athlete_id,
            challenge: recorded.challenge_id,
            date: recorded.activity.date,
            km: recorded.activity.km,
            payment: recorded.verdict.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StandingRow {
    pub position: usize,
    pub athlete: u64,
    pub name: String,
    pub bib_number: Option<String>,
    pub total_km: f64,
    pub last_activity_date: Option<NaiveDate>,
    pub goal_reached_on: Option<NaiveDate>,
}

impl StandingRow {
    pub fn numbered(standings: Vec<Standing>) -> impl Iterator<Item = StandingRow> {
        standings
            .into_iter()
            .enumerate()
            .map(|(i, standing)| StandingRow {
                position: i + 1,
                athlete: standing.athlete_id,
                name: standing.name,
                bib_number: standing.bib_number,
                total_km: standing.total_km,
                last_activity_date: standing.last_activity_date,
                goal_reached_on: standing.goal_reached.map(|m| m.date),
            })
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressRow {
    pub challenge: u64,
    pub goal_km: f64,
    pub total_km: f64,
    pub percent: String,
}

impl ProgressRow {
    pub fn new(challenge: u64, progress: ChallengeProgress) -> Self {
        Self {
            challenge,
            goal_km: progress.goal_km,
            total_km: progress.total_km,
            percent: format!("{:.1}", progress.percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::payments::Severity;
    use crate::domain::enrollment::Installment;
    use crate::domain::money::Cents;

    fn render<R: Serialize>(rows: Vec<R>) -> String {
        let mut buffer = Vec::new();
        ReportWriter::new(&mut buffer).write_rows(rows).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_obligation_rows() {
        let pending = PendingObligation {
            row: InstallmentRow {
                installment: Installment {
                    id: 7,
                    enrollment_id: 1,
                    number: 2,
                    due_date: "2024-03-01".parse().unwrap(),
                    amount: Cents::new(12550),
                    paid_at: None,
                    note: String::new(),
                },
                athlete_id: 3,
                athlete_name: "Ana".to_string(),
                challenge_id: 1,
                challenge_title: "Spring".to_string(),
            },
            overdue_days: 19,
            severity: Severity::Blocked,
        };
        let output = render(vec![ObligationRow::from(pending)]);
        assert_eq!(
            output,
            "installment,challenge,athlete,number,due_date,amount,overdue_days,severity\n\
             7,Spring,Ana,2,2024-03-01,125.50,19,blocked\n"
        );
    }

    #[test]
    fn test_progress_row_and_empty_optionals() {
        let output = render(vec![ProgressRow::new(4, ChallengeProgress::new(0.0, 12.5))]);
        assert_eq!(output, "challenge,goal_km,total_km,percent\n4,0.0,12.5,0.0\n");

        let output = render(vec![FinanceRow::from(FinanceTotals::default())]);
        assert!(output.ends_with("0.00,0.00,0.00,0.00,0\n"));
    }
}
