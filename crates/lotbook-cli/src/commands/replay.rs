//! `lotbook replay`: journal in, lots and realized gains out.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use lotbook_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, UnusedKeyPolicy, LOGGING_FILTER_POINTER,
};
use lotbook_ledger::{load_journal, Book, Numeric, RoundMode, SplitId};
use lotbook_lots::{account_lot_report, AccountLotReport, LotEngine, LotSettings};

use super::{init_tracing, read_journal};
use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct ReplayReport {
    config_hash: String,
    policy: &'static str,
    transactions: usize,
    accounts: Vec<AccountLotReport>,
    failures: Vec<FailureReport>,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    account: String,
    split: SplitId,
    error: String,
}

pub fn run(journal_path: &str, config_paths: &[String], format: OutputFormat, strict: bool) -> Result<()> {
    let loaded = if config_paths.is_empty() {
        LoadedConfig::empty()?
    } else {
        load_layered_yaml(config_paths)?
    };
    init_tracing(
        loaded
            .config_json
            .pointer(LOGGING_FILTER_POINTER)
            .and_then(|v| v.as_str()),
    );
    report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    let settings = LotSettings::from_config_json(&loaded.config_json)?;

    let journal = read_journal(journal_path)?;
    let mut book = Book::new();
    let txs = load_journal(&mut book, &journal, Utc::now())
        .with_context(|| format!("journal rejected: {}", journal_path))?;
    info!(
        transactions = txs.len(),
        config_hash = %loaded.config_hash,
        "journal loaded"
    );

    let engine = LotEngine::new(settings);
    let mut report = ReplayReport {
        config_hash: loaded.config_hash.clone(),
        policy: engine.policy_name(),
        transactions: txs.len(),
        accounts: Vec::new(),
        failures: Vec::new(),
    };

    let trading: Vec<_> = book
        .account_ids()
        .into_iter()
        .filter(|a| book.account_has_trades(*a))
        .collect();
    for account in trading {
        let run = engine
            .process_account(&mut book, account)
            .with_context(|| format!("lot processing failed for {}", book.full_name(account)))?;
        for (split, err) in run.failures {
            report.failures.push(FailureReport {
                account: book.full_name(account),
                split,
                error: err.to_string(),
            });
        }
        if let Some(r) = account_lot_report(&book, account) {
            report.accounts.push(r);
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&book, &report),
    }

    if strict && !report.failures.is_empty() {
        bail!(
            "REPLAY_FAILURES: gains could not be computed for {} split(s)",
            report.failures.len()
        );
    }
    Ok(())
}

fn print_text(book: &Book, report: &ReplayReport) {
    println!(
        "config_hash={} policy={} transactions={}",
        report.config_hash, report.policy, report.transactions
    );
    for acc in &report.accounts {
        let acc_fraction = acc
            .lots
            .iter()
            .flat_map(|l| l.splits.first())
            .map(|s| currency_fraction(book, s.split))
            .max()
            .unwrap_or(DEFAULT_FRACTION);
        println!(
            "account={} commodity={} lots={} realized_gain={}",
            acc.account,
            acc.commodity.as_deref().unwrap_or("-"),
            acc.lots.len(),
            rounded(&acc.realized_gain, acc_fraction)
        );
        for lot in &acc.lots {
            let fraction = lot
                .splits
                .first()
                .map(|s| currency_fraction(book, s.split))
                .unwrap_or(DEFAULT_FRACTION);
            println!(
                "  lot=\"{}\" opened={} balance={} open={} realized_gain={}",
                lot.title.as_deref().unwrap_or(""),
                lot.opened
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                lot.balance,
                lot.open,
                rounded(&lot.realized_gain, fraction)
            );
            for s in &lot.splits {
                let fraction = currency_fraction(book, s.split);
                let mut line = format!(
                    "    {} amount={} value={}",
                    s.posted.format("%Y-%m-%d"),
                    s.amount,
                    rounded(&s.value, fraction)
                );
                if s.gains_record {
                    line.push_str(" gains_record");
                } else if !s.realized_gain.is_zero() {
                    line.push_str(&format!(" gain={}", rounded(&s.realized_gain, fraction)));
                }
                println!("{} \"{}\"", line, s.description);
            }
        }
    }
    for f in &report.failures {
        println!("failure account={} split={} error=\"{}\"", f.account, f.split, f.error);
    }
    println!("failures={}", report.failures.len());
}

const DEFAULT_FRACTION: u64 = 100;

fn currency_fraction(book: &Book, split: SplitId) -> u64 {
    book.split_transaction(split)
        .and_then(|t| t.currency())
        .map(|c| c.fraction)
        .unwrap_or(DEFAULT_FRACTION)
}

fn rounded(n: &Numeric, fraction: u64) -> String {
    n.convert(fraction, RoundMode::HalfUp)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| n.to_string())
}
