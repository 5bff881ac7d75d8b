mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

fn orders_csv() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    common::write_orders_csv(file.path(), &[(1, "1200", "30"), (2, "450", "")]).unwrap();
    file
}

#[test]
fn test_cli_import_orders() -> Result<(), Box<dyn std::error::Error>> {
    let csv = orders_csv();
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("import-orders").arg(csv.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("imported 2 orders, skipped 0"));

    Ok(())
}

#[test]
fn test_cli_generate_deposit_link() -> Result<(), Box<dyn std::error::Error>> {
    let csv = orders_csv();
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("--orders")
        .arg(csv.path())
        .arg("--frontend-url")
        .arg("https://shop.example.com/")
        .arg("generate")
        .arg("--order")
        .arg("1")
        .arg("--type")
        .arg("deposit");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("payment_type: deposit"))
        .stdout(predicate::str::contains("amount: 360"))
        .stdout(predicate::str::is_match(r"url: https://shop\.example\.com/paiement/[0-9a-f]{32}\n").unwrap());

    Ok(())
}

#[test]
fn test_cli_generate_unknown_order_fails() {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("generate").arg("--order").arg("99");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("order 99 not found"));
}

#[test]
fn test_cli_validate_unknown_token() {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("validate").arg("0123456789abcdef0123456789abcdef");

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("invalid or does not exist"));
}

#[test]
fn test_cli_webhook_ignores_unknown_intent() {
    let mut event = tempfile::NamedTempFile::new().unwrap();
    write!(
        event,
        r#"{{"type":"payment_intent.succeeded","data":{{"object":{{"id":"pi_x","status":"succeeded"}}}}}}"#
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("webhook").arg(event.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ignored: unknown intent"));
}

#[test]
fn test_cli_webhook_applies_event() {
    let csv = orders_csv();
    let mut event = tempfile::NamedTempFile::new().unwrap();
    write!(
        event,
        r#"{{"type":"payment_intent.succeeded","data":{{"object":{{"id":"pi_1","status":"succeeded","metadata":{{"order_id":"2","payment_type":"full"}}}}}}}}"#
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("--orders").arg(csv.path()).arg("webhook").arg(event.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("payment_status: pending -> paid"))
        .stdout(predicate::str::contains("status: pending -> confirmed"));
}

#[test]
fn test_cli_stats_on_empty_store() {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("stats");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "total=0 active=0 used=0 expired=0 revoked=0 accessed=0",
        ));
}

#[test]
fn test_cli_rejects_bad_payment_type() {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("generate").arg("--order").arg("1").arg("--type").arg("installment");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown payment type"));
}
