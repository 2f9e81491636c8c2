#![allow(dead_code)]

use challenge_ledger::application::engine::LedgerEngine;
use challenge_ledger::domain::challenge::{AthleteInput, ChallengeInput};
use challenge_ledger::domain::enrollment::PlanRequest;
use challenge_ledger::infrastructure::clock::FixedClock;
use challenge_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const OWNER: u64 = 1;

pub fn engine_at(today: &str) -> LedgerEngine {
    LedgerEngine::new(
        Box::new(InMemoryLedgerStore::new()),
        Box::new(FixedClock::new(today.parse().unwrap())),
    )
}

pub async fn challenge(engine: &LedgerEngine, goal_km: f64) -> u64 {
    engine
        .create_challenge(
            OWNER,
            &ChallengeInput {
                title: "Autumn 100".to_string(),
                description: None,
                goal_km,
                start_date: "2024-01-01".to_string(),
                end_date: "2024-12-31".to_string(),
            },
        )
        .await
        .unwrap()
        .id
}

pub fn installments(total: &str, count: i64, first_due: &str) -> PlanRequest {
    PlanRequest {
        total_amount: total.to_string(),
        payment_type: "installments".to_string(),
        installments_count: Some(count),
        first_due_date: first_due.to_string(),
    }
}

pub fn cash(total: &str, due: &str) -> PlanRequest {
    PlanRequest {
        total_amount: total.to_string(),
        payment_type: "cash".to_string(),
        installments_count: None,
        first_due_date: due.to_string(),
    }
}

pub async fn athlete(engine: &LedgerEngine, challenge: u64, name: &str, plan: &PlanRequest) -> u64 {
    let input = AthleteInput {
        name: name.to_string(),
        ..Default::default()
    };
    engine
        .create_athlete(OWNER, challenge, &input, plan)
        .await
        .unwrap()
        .0
        .id
}

pub fn generate_activity_csv(path: &Path, rows: &[(&str, &str, &str, &str)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["athlete", "date", "km", "note"])?;
    for (athlete, date, km, note) in rows {
        wtr.write_record([athlete, date, km, note])?;
    }
    wtr.flush()?;
    Ok(())
}
