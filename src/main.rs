use challenge_ledger::application::engine::LedgerEngine;
use challenge_ledger::application::payments::FinanceFilter;
use challenge_ledger::config::LedgerConfig;
use challenge_ledger::domain::calendar::parse_date;
use challenge_ledger::domain::challenge::{AthleteInput, ChallengeInput};
use challenge_ledger::domain::enrollment::PlanRequest;
use challenge_ledger::interfaces::csv::activity_reader::ActivityReader;
use challenge_ledger::interfaces::csv::report_writer::{
    ActivityLine, AthleteRow, ChallengeRow, EnrollmentRow, FinanceRow, InstallmentLine,
    ObligationRow, PaymentRow, ProgressRow, RecordedRow, ReportWriter, StandingRow,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the persistent ledger. Without it nothing outlives the process.
    #[arg(long, env = "LEDGER_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Organizer id every command acts as.
    #[arg(long, env = "LEDGER_OWNER", default_value_t = 1, global = true)]
    owner: u64,

    /// Pins today's date (YYYY-MM-DD).
    #[arg(long, env = "LEDGER_TODAY", global = true, value_parser = parse_day)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(subcommand)]
    Challenge(ChallengeCommand),
    #[command(subcommand)]
    Athlete(AthleteCommand),
    /// Replace an athlete's payment plan
    Plan {
        athlete: u64,
        #[command(flatten)]
        plan: PlanArgs,
    },
    #[command(subcommand)]
    Installment(InstallmentCommand),
    /// Show an athlete's installments and payment verdict
    Payments { athlete: u64 },
    /// Unpaid installments past due
    Pending {
        #[arg(long)]
        challenge: Option<u64>,
    },
    /// Expected, received and delinquent amounts
    Finance {
        #[arg(long)]
        challenge: Option<u64>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, value_enum, default_value_t = FinanceView::Totals)]
        view: FinanceView,
    },
    #[command(subcommand)]
    Activity(ActivityCommand),
    /// Standings of a challenge
    Ranking { challenge: u64 },
}

#[derive(Subcommand)]
enum ChallengeCommand {
    Create(ChallengeArgs),
    Update {
        id: u64,
        #[command(flatten)]
        fields: ChallengeArgs,
    },
    List,
    Delete { id: u64 },
    Progress { id: u64 },
}

#[derive(Args)]
struct ChallengeArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, default_value_t = 0.0)]
    goal_km: f64,
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
}

impl From<ChallengeArgs> for ChallengeInput {
    fn from(args: ChallengeArgs) -> Self {
        Self {
            title: args.title,
            description: args.description,
            goal_km: args.goal_km,
            start_date: args.start,
            end_date: args.end,
        }
    }
}

#[derive(Subcommand)]
enum AthleteCommand {
    /// Enroll an athlete with a payment plan
    Add {
        #[arg(long)]
        challenge: u64,
        #[command(flatten)]
        fields: AthleteArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    Update {
        id: u64,
        #[arg(long)]
        challenge: u64,
        #[command(flatten)]
        fields: AthleteArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    List {
        challenge: u64,
        #[arg(long, default_value = "")]
        filter: String,
    },
    Delete {
        id: u64,
        #[arg(long)]
        challenge: u64,
    },
}

#[derive(Args)]
struct AthleteArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    bib: Option<String>,
    #[arg(long)]
    birth_date: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    shirt_size: Option<String>,
    #[arg(long)]
    personal_goal_km: Option<f64>,
}

impl From<AthleteArgs> for AthleteInput {
    fn from(args: AthleteArgs) -> Self {
        Self {
            name: args.name,
            phone: args.phone,
            bib_number: args.bib,
            birth_date: args.birth_date,
            gender: args.gender,
            shirt_size: args.shirt_size,
            personal_goal_km: args.personal_goal_km,
        }
    }
}

#[derive(Args)]
struct PlanArgs {
    /// Total amount, e.g. 150.00
    #[arg(long)]
    total: String,
    /// `cash` or `installments`
    #[arg(long, default_value = "cash")]
    payment_type: String,
    #[arg(long)]
    installments: Option<i64>,
    #[arg(long)]
    first_due: String,
}

impl From<PlanArgs> for PlanRequest {
    fn from(args: PlanArgs) -> Self {
        Self {
            total_amount: args.total,
            payment_type: args.payment_type,
            installments_count: args.installments,
            first_due_date: args.first_due,
        }
    }
}

#[derive(Subcommand)]
enum InstallmentCommand {
    Pay {
        id: u64,
        /// Defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Open {
        id: u64,
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
enum ActivityCommand {
    Log {
        athlete: u64,
        date: String,
        km: f64,
        #[arg(long)]
        note: Option<String>,
    },
    List { challenge: u64 },
    /// Import `athlete,date,km,note` rows from a CSV file
    Import { input: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum FinanceView {
    Totals,
    Paid,
    Overdue,
}

fn parse_day(input: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(input, "today").map_err(|e| e.to_string())
}

fn optional_date(input: Option<&str>, field: &str) -> Result<Option<NaiveDate>> {
    Ok(input.map(|text| parse_date(text, field)).transpose()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = LedgerConfig {
        db_path: cli.db_path,
        owner: cli.owner,
        today: cli.today,
    };
    let engine = LedgerEngine::new(config.open_store()?, config.clock());
    let owner = config.owner;

    let stdout = io::stdout();
    let mut out = ReportWriter::new(stdout.lock());

    match cli.command {
        Command::Challenge(command) => match command {
            ChallengeCommand::Create(args) => {
                let challenge = engine.create_challenge(owner, &args.into()).await?;
                println!("{}", challenge.id);
            }
            ChallengeCommand::Update { id, fields } => {
                engine.update_challenge(owner, id, &fields.into()).await?;
            }
            ChallengeCommand::List => {
                let challenges = engine.list_challenges(owner).await?;
                out.write_rows(challenges.into_iter().map(ChallengeRow::from))?;
            }
            ChallengeCommand::Delete { id } => engine.delete_challenge(owner, id).await?,
            ChallengeCommand::Progress { id } => {
                let progress = engine.progress(owner, id).await?;
                out.write_rows([ProgressRow::new(id, progress)])?;
            }
        },
        Command::Athlete(command) => match command {
            AthleteCommand::Add {
                challenge,
                fields,
                plan,
            } => {
                let (athlete, enrollment) = engine
                    .create_athlete(owner, challenge, &fields.into(), &plan.into())
                    .await?;
                println!("{}", athlete.id);
                tracing::debug!(enrollment_id = enrollment.id, "enrollment created");
            }
            AthleteCommand::Update {
                id,
                challenge,
                fields,
                plan,
            } => {
                let (_, enrollment) = engine
                    .update_athlete(owner, challenge, id, &fields.into(), &plan.into())
                    .await?;
                out.write_rows([EnrollmentRow::from(enrollment)])?;
            }
            AthleteCommand::List { challenge, filter } => {
                let athletes = engine.list_athletes(owner, challenge, &filter).await?;
                out.write_rows(athletes.into_iter().map(AthleteRow::from))?;
            }
            AthleteCommand::Delete { id, challenge } => {
                engine.delete_athlete(owner, challenge, id).await?;
            }
        },
        Command::Plan { athlete, plan } => {
            let enrollment = engine.submit_plan(owner, athlete, &plan.into()).await?;
            out.write_rows([EnrollmentRow::from(enrollment)])?;
        }
        Command::Installment(command) => {
            let installment = match command {
                InstallmentCommand::Pay { id, date, note } => {
                    engine
                        .set_installment_paid(owner, id, date.as_deref(), note.as_deref())
                        .await?
                }
                InstallmentCommand::Open { id, note } => {
                    engine.set_installment_open(owner, id, note.as_deref()).await?
                }
            };
            println!(
                "{},{}",
                installment.id,
                installment.paid_at.map(|d| d.to_string()).unwrap_or_default()
            );
        }
        Command::Payments { athlete } => {
            let payments = engine.athlete_payments(owner, athlete).await?;
            eprintln!("Payment status: {}", payments.verdict);
            out.write_rows(payments.installments.into_iter().map(InstallmentLine::from))?;
        }
        Command::Pending { challenge } => {
            let pending = engine.pending_obligations(owner, challenge).await?;
            out.write_rows(pending.into_iter().map(ObligationRow::from))?;
        }
        Command::Finance {
            challenge,
            from,
            to,
            view,
        } => {
            let filter = FinanceFilter {
                challenge_id: challenge,
                from: optional_date(from.as_deref(), "from")?,
                to: optional_date(to.as_deref(), "to")?,
            };
            let summary = engine.finance_summary(owner, filter).await?;
            match view {
                FinanceView::Totals => out.write_rows([FinanceRow::from(summary.totals)])?,
                FinanceView::Paid => {
                    out.write_rows(summary.paid.into_iter().map(PaymentRow::from))?
                }
                FinanceView::Overdue => {
                    out.write_rows(summary.overdue.into_iter().map(ObligationRow::from))?
                }
            }
        }
        Command::Activity(command) => match command {
            ActivityCommand::Log {
                athlete,
                date,
                km,
                note,
            } => {
                let recorded = engine
                    .record_activity(owner, athlete, &date, km, note.as_deref())
                    .await?;
                out.write_rows([RecordedRow::from(recorded)])?;
            }
            ActivityCommand::List { challenge } => {
                let activities = engine.list_activities(owner, challenge).await?;
                out.write_rows(activities.into_iter().map(ActivityLine::from))?;
            }
            ActivityCommand::Import { input } => {
                let file = File::open(input).into_diagnostic()?;
                let mut recorded = Vec::new();
                for (line, record) in ActivityReader::new(file).records().enumerate() {
                    let row = line + 2;
                    match record {
                        Ok(record) => match engine
                            .record_activity(
                                owner,
                                record.athlete,
                                &record.date,
                                record.km,
                                record.note.as_deref(),
                            )
                            .await
                        {
                            Ok(activity) => recorded.push(RecordedRow::from(activity)),
                            Err(e) => eprintln!("Error recording row {row}: {e}"),
                        },
                        Err(e) => eprintln!("Error reading row {row}: {e}"),
                    }
                }
                out.write_rows(recorded)?;
            }
        },
        Command::Ranking { challenge } => {
            let standings = engine.ranking(owner, challenge).await?;
            out.write_rows(StandingRow::numbered(standings))?;
        }
    }

    Ok(())
}
