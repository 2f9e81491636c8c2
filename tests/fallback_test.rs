use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_snapshot_fallback_warning() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.json");

    let mut cmd = Command::new(cargo_bin!("challenge-ledger"));
    cmd.arg("--db-path").arg(&db_path).args(["challenge", "list"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(
            "falling back to a JSON snapshot of the in-memory store",
        ));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    let mut cmd = Command::new(cargo_bin!("challenge-ledger"));
    cmd.arg("--db-path").arg(&db_path).args(["challenge", "list"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARN").not());
}

#[test]
fn test_without_db_path_nothing_persists() {
    let mut create = Command::new(cargo_bin!("challenge-ledger"));
    create
        .env_remove("LEDGER_DB_PATH")
        .args(["challenge", "create", "--title", "Run"])
        .args(["--start", "2024-01-01", "--end", "2024-01-31"]);
    create.assert().success().stdout("1\n");

    let mut list = Command::new(cargo_bin!("challenge-ledger"));
    list.env_remove("LEDGER_DB_PATH").args(["challenge", "list"]);
    list.assert().success().stdout("");
}
