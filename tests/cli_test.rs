mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn ledger(db_path: &Path, today: &str) -> Command {
    let mut cmd = Command::new(cargo_bin!("challenge-ledger"));
    cmd.arg("--db-path").arg(db_path).arg("--today").arg(today);
    cmd.env_remove("LEDGER_OWNER");
    cmd
}

fn seed(db_path: &Path) {
    ledger(db_path, "2024-03-20")
        .args(["challenge", "create", "--title", "Run", "--goal-km", "10"])
        .args(["--start", "2024-01-01", "--end", "2024-12-31"])
        .assert()
        .success()
        .stdout("1\n");
    ledger(db_path, "2024-03-20")
        .args(["athlete", "add", "--challenge", "1", "--name", "Ana"])
        .args(["--total", "100", "--payment-type", "installments"])
        .args(["--installments", "3", "--first-due", "2024-03-01"])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn test_cli_plan_payment_and_ranking() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let db_path = dir.path().join("ledger");
    seed(&db_path);

    ledger(&db_path, "2024-03-20")
        .args(["payments", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id,number,due_date,amount,paid_at,status,note"))
        .stdout(predicate::str::contains("1,1,2024-03-01,33.34,,Blocked,"))
        .stdout(predicate::str::contains("3,3,2024-05-01,33.33,,Open,"))
        .stderr(predicate::str::contains("Payment status: Blocked for non-payment"));

    ledger(&db_path, "2024-03-20")
        .args(["activity", "log", "1", "2024-03-19", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("19 days overdue"));

    ledger(&db_path, "2024-03-20")
        .args(["installment", "pay", "1", "--date", "2024-03-05"])
        .assert()
        .success()
        .stdout("1,2024-03-05\n");

    ledger(&db_path, "2024-03-20")
        .args(["activity", "log", "1", "2024-03-19", "12.5", "--note", "long run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id,athlete,challenge,date,km,payment"))
        .stdout(predicate::str::contains("1,1,1,2024-03-19,12.5,On track"));

    ledger(&db_path, "2024-03-20")
        .args(["ranking", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "position,athlete,name,bib_number,total_km,last_activity_date,goal_reached_on",
        ))
        .stdout(predicate::str::contains("1,1,Ana,,12.5,2024-03-19,2024-03-19"));

    ledger(&db_path, "2024-03-20")
        .args(["challenge", "progress", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1,10.0,12.5,100.0"));

    Ok(())
}

#[test]
fn test_cli_reports() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let db_path = dir.path().join("ledger");
    seed(&db_path);

    ledger(&db_path, "2024-04-05")
        .args(["pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1,Run,Ana,1,2024-03-01,33.34,35,blocked"))
        .stdout(predicate::str::contains("2,Run,Ana,2,2024-04-01,33.33,4,warning"));

    ledger(&db_path, "2024-04-05")
        .args(["finance", "--from", "2024-03-01", "--to", "2024-04-30"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "expected,received,open,delinquent,delinquent_athletes",
        ))
        .stdout(predicate::str::contains("66.67,0.00,66.67,66.67,1"));

    ledger(&db_path, "2024-04-05")
        .args(["athlete", "list", "1", "--filter", "AN"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1,Ana,,0.0,,Blocked for non-payment,35"));

    ledger(&db_path, "2024-04-05")
        .args(["finance", "--from", "04/01/2024"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY-MM-DD"));

    Ok(())
}

#[test]
fn test_cli_other_owner_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let db_path = dir.path().join("ledger");
    seed(&db_path);

    ledger(&db_path, "2024-03-20")
        .args(["--owner", "2", "ranking", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("challenge not found or not permitted"));

    ledger(&db_path, "2024-03-20")
        .args(["--owner", "2", "challenge", "list"])
        .assert()
        .success()
        .stdout("");

    Ok(())
}

#[test]
fn test_cli_bulk_import_skips_bad_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let db_path = dir.path().join("ledger");
    seed(&db_path);
    let input = dir.path().join("activities.csv");
    common::generate_activity_csv(
        &input,
        &[
            ("1", "2024-02-01", "4.5", "easy"),
            ("1", "2024-02-30", "3", ""),
            ("x", "2024-02-02", "3", ""),
            ("9", "2024-02-02", "3", ""),
            ("1", "2024-02-03", "6", ""),
        ],
    )?;

    ledger(&db_path, "2024-02-10")
        .args(["activity", "import"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1,1,1,2024-02-01,4.5,On track"))
        .stdout(predicate::str::contains("2,1,1,2024-02-03,6.0,On track"))
        .stderr(predicate::str::contains("Error recording row 3"))
        .stderr(predicate::str::contains("Error reading row 4"))
        .stderr(predicate::str::contains("Error recording row 5"));

    ledger(&db_path, "2024-02-10")
        .args(["activity", "list", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "2,1,Ana,2024-02-03,6.0,\n1,1,Ana,2024-02-01,4.5,easy",
        ));

    Ok(())
}
