mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("user,course,status,progress"))
        // Paid and confirmed
        .stdout(predicate::str::contains("2,10,active,0"))
        // Free course, finished
        .stdout(predicate::str::contains("3,11,completed,100"))
        // Declined purchase never enrolls
        .stdout(predicate::str::contains("3,10,").not())
        // Second confirmation and the draft purchase are reported, not fatal
        .stderr(predicate::str::contains("Error processing command: Conflict"))
        .stderr(predicate::str::contains(
            "Error processing command: Invalid state",
        ));

    Ok(())
}

#[test]
fn test_cli_courses_report() {
    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv")
        .arg("--report")
        .arg("courses");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "course,title,status,price,enrollments",
        ))
        .stdout(predicate::str::contains("10,Rust for Everyone,published,100.00,1"))
        .stdout(predicate::str::contains("11,Free Intro,published,0.00,1"))
        .stdout(predicate::str::contains("12,Unreleased,draft,30.00,0"));
}

#[test]
fn test_cli_revenue_report() {
    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv")
        .arg("--report")
        .arg("revenue");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "instructor,sales,gross,platform_fee,payout",
        ))
        .stdout(predicate::str::contains("1,1,80.00,4.00,76.00"))
        .stdout(predicate::str::contains("total,1,80.00,4.00,76.00"));
}

#[test]
fn test_cli_custom_fee_rate() {
    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv")
        .arg("--report")
        .arg("revenue")
        .arg("--platform-fee-rate")
        .arg("0.10");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("total,1,80.00,8.00,72.00"));
}

#[test]
fn test_cli_rejects_invalid_fee_rate() {
    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv")
        .arg("--platform-fee-rate")
        .arg("1.5");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("platform fee rate"));
}

#[test]
fn test_cli_malformed_rows_continue() {
    let file = NamedTempFile::new().unwrap();
    common::write_commands(
        file.path(),
        &[
            "instructor,1,,,,Ada",
            "student,2,,,,Grace",
            "refund,2,10,,,",
            "course,1,10,0,,Free",
            "enroll_free,2,10,,,",
            "enroll_free,2,10,,,",
            "progress,2,10,12.5,,",
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2,10,active,0"))
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Error processing command: Conflict"))
        .stderr(predicate::str::contains("not a whole percentage"));
}

#[test]
fn test_cli_webhook_path() {
    let file = NamedTempFile::new().unwrap();
    common::write_commands(
        file.path(),
        &[
            "instructor,1,,,,Ada",
            "student,2,,,,Grace",
            "course,1,10,25.00,,Macros",
            "purchase,2,10,,,",
            "pay,2,10,,,",
            "webhook,2,10,,,",
            "webhook,2,10,,,",
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg(file.path())
        .arg("--report")
        .arg("courses")
        .arg("--webhook-secret")
        .arg("whsec_cli");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("10,Macros,published,25.00,1"))
        .stderr(predicate::str::contains("Error").not());
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_db_path_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv")
        .arg("--db-path")
        .arg(dir.path().join("coursemart_db"));

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."))
        // The replay still runs against memory.
        .stdout(predicate::str::contains("2,10,active,0"))
        .stdout(predicate::str::contains("3,11,completed,100"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_db_path_uses_rocksdb() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("coursemart"));
    cmd.arg("tests/fixtures/marketplace.csv")
        .arg("--db-path")
        .arg(dir.path().join("coursemart_db"));

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING").not())
        .stdout(predicate::str::contains("2,10,active,0"))
        .stdout(predicate::str::contains("3,11,completed,100"));
}
