//! Exit-code contract: 0 success, 1 refused operation, 2 setup error,
//! 3 conservation violations. Scripts depend on these staying put.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn kudos(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kudos").unwrap();
    cmd.env_remove("KUDOS_DB")
        .env_remove("KUDOS_ORG")
        .env_remove("KUDOS_CONFIG")
        .arg("--db")
        .arg(db)
        .arg("--org")
        .arg("acme");
    cmd
}

fn seed(db: &Path) {
    kudos(db).arg("init").assert().success();
    kudos(db)
        .args(["member", "add", "alice", "--controller"])
        .assert()
        .success();
    kudos(db).args(["member", "add", "bob"]).assert().success();
    kudos(db).args(["issue", "500"]).assert().success();
    kudos(db)
        .args(["period", "open", "2026-08"])
        .assert()
        .success();
}

#[test]
fn test_missing_database_is_config_error() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("absent.db");

    kudos(&db)
        .arg("balance")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no ledger database"));
}

#[test]
fn test_invalid_config_is_config_error() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("ledger.db");
    let config = temp.path().join("bad.yaml");
    std::fs::write(&config, "distribution_amount: 0\n").unwrap();

    kudos(&db).arg("init").assert().success();
    kudos(&db)
        .arg("--config")
        .arg(&config)
        .args(["issue", "100"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fatal"));
}

#[test]
fn test_refused_operations_are_op_failed() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("ledger.db");
    seed(&db);

    // Org already exists.
    kudos(&db)
        .arg("init")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    // Overspending the distribution balance.
    kudos(&db)
        .args(["send", "alice", "bob", "500"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("insufficient"));

    // Deciding a transfer that does not exist.
    kudos(&db)
        .args(["approve", "no-such-transfer", "--by", "alice"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));

    // Non-controllers cannot decide.
    let out = kudos(&db)
        .args(["send", "alice", "bob", "5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let transfer_id = text
        .split_whitespace()
        .nth(1)
        .unwrap()
        .trim_end_matches(':')
        .to_string();
    kudos(&db)
        .args(["approve", &transfer_id, "--by", "bob"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a controller"));
}

#[test]
fn test_tampered_ledger_fails_verify_with_exit_3() {
    let temp = tempdir().unwrap();
    let db = temp.path().join("ledger.db");
    seed(&db);

    kudos(&db).arg("verify").assert().success();

    // Inflate a balance behind the journal's back.
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute(
        "UPDATE accounts SET balance = balance + 7 WHERE kind = 'system'",
        [],
    )
    .unwrap();
    drop(conn);

    kudos(&db)
        .arg("verify")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("INCONSISTENT"));
}
