//! Command handler modules for lotbook-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod replay;

use anyhow::{Context, Result};
use lotbook_ledger::Journal;
use std::fs;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Install the stderr subscriber. `RUST_LOG` wins, then `config_filter`,
/// then `info`.
pub fn init_tracing(config_filter: Option<&str>) {
    let mut rejected = None;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match config_filter {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| {
            rejected = Some(directives.to_string());
            EnvFilter::new("info")
        }),
        None => EnvFilter::new("info"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(directives) = rejected {
        warn!(%directives, "invalid logging.filter in config; using info");
    }
}

/// Parse a journal file, YAML by extension and JSON otherwise.
pub fn read_journal(path: &str) -> Result<Journal> {
    let bytes = fs::read(path).with_context(|| format!("read journal failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).context("journal must be UTF-8 text")?;

    let is_yaml = matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let journal = if is_yaml {
        serde_yaml::from_str(raw).with_context(|| format!("invalid journal yaml: {}", path))?
    } else {
        serde_json::from_str(raw).with_context(|| format!("invalid journal json: {}", path))?
    };
    Ok(journal)
}
