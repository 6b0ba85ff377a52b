use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

const JOURNAL: &str = r#"{
  "commodities": [
    { "namespace": "CURRENCY", "mnemonic": "USD", "fraction": 100 },
    { "namespace": "NYSE", "mnemonic": "ACME", "fraction": 1 }
  ],
  "accounts": [
    { "path": "Assets", "kind": "ASSET", "commodity": "USD" },
    { "path": "Assets:Broker", "kind": "BANK", "commodity": "USD" },
    { "path": "Assets:ACME", "kind": "STOCK", "commodity": "ACME" }
  ],
  "transactions": [
    {
      "posted": "2024-01-02T00:00:00Z",
      "description": "buy 100 ACME",
      "currency": "USD",
      "splits": [
        { "account": "Assets:ACME", "amount": "100", "value": "1000" },
        { "account": "Assets:Broker", "amount": "-1000", "value": "-1000" }
      ]
    },
    {
      "posted": "2024-02-02T00:00:00Z",
      "description": "sell 60 ACME",
      "currency": "USD",
      "splits": [
        { "account": "Assets:ACME", "amount": "-60", "value": "-720" },
        { "account": "Assets:Broker", "amount": "720", "value": "720" }
      ]
    }
  ]
}"#;

fn lotbook() -> Command {
    let mut cmd = Command::cargo_bin("lotbook").expect("binary built");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn replay_json_reports_fifo_gain() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let journal = dir.path().join("journal.json");
    fs::write(&journal, JOURNAL)?;

    let out = lotbook()
        .args(["replay", "--format", "json", "--journal"])
        .arg(&journal)
        .output()?;
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(v["policy"], "FIFO");
    assert_eq!(v["transactions"], 2);
    assert_eq!(v["failures"].as_array().map(Vec::len), Some(0));

    let acme = &v["accounts"][0];
    assert_eq!(acme["account"], "Assets:ACME");
    assert_eq!(acme["realized_gain"], "120");
    assert_eq!(acme["lots"][0]["title"], "Lot 0");
    assert_eq!(acme["lots"][0]["balance"], "40");
    Ok(())
}

#[test]
fn replay_text_reads_yaml_journal_and_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let journal: serde_json::Value = serde_json::from_str(JOURNAL)?;
    let journal_path = dir.path().join("journal.yaml");
    fs::write(&journal_path, serde_yaml::to_string(&journal)?)?;

    let config = dir.path().join("lots.yaml");
    fs::write(
        &config,
        "lots:\n  policy: lifo\n  title_prefix: Batch\nlogging:\n  filter: warn\n",
    )?;

    lotbook()
        .args(["replay", "--journal"])
        .arg(&journal_path)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("policy=LIFO"))
        .stdout(predicate::str::contains(
            "account=Assets:ACME commodity=NYSE::ACME lots=1 realized_gain=120",
        ))
        .stdout(predicate::str::contains("lot=\"Batch 0\""))
        .stdout(predicate::str::contains("gain=120 \"sell 60 ACME\""))
        .stdout(predicate::str::contains("failures=0"));
    Ok(())
}

#[test]
fn unused_config_keys_warn_on_stderr() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let journal = dir.path().join("journal.json");
    fs::write(&journal, JOURNAL)?;
    let config = dir.path().join("extra.yaml");
    fs::write(&config, "lots:\n  policy: fifo\n  lot_size_hint: 10\n")?;

    lotbook()
        .args(["replay", "--journal"])
        .arg(&journal)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("/lots/lot_size_hint"))
        .stdout(predicate::str::contains("failures=0"));
    Ok(())
}

#[test]
fn strict_replay_fails_when_gains_cannot_be_booked() -> anyhow::Result<()> {
    // A fallback gain account name already taken by another currency.
    let mut journal: serde_json::Value = serde_json::from_str(JOURNAL)?;
    journal["commodities"]
        .as_array_mut()
        .expect("commodities")
        .push(serde_json::json!({ "namespace": "CURRENCY", "mnemonic": "EUR", "fraction": 100 }));
    journal["accounts"]
        .as_array_mut()
        .expect("accounts")
        .push(serde_json::json!({ "path": "Orphaned Gains-USD", "kind": "INCOME", "commodity": "EUR" }));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("journal.json");
    fs::write(&path, serde_json::to_string(&journal)?)?;

    lotbook()
        .args(["replay", "--journal"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("failures=1"));

    lotbook()
        .args(["replay", "--strict", "--journal"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("REPLAY_FAILURES"));
    Ok(())
}

#[test]
fn unbalanced_journal_is_rejected() -> anyhow::Result<()> {
    let mut journal: serde_json::Value = serde_json::from_str(JOURNAL)?;
    journal["transactions"][1]["splits"][1]["value"] = serde_json::json!("700");
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("journal.json");
    fs::write(&path, serde_json::to_string(&journal)?)?;

    lotbook()
        .args(["replay", "--journal"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("journal rejected"));
    Ok(())
}
