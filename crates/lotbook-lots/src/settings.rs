use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::PolicyKind;

pub const DEFAULT_TITLE_PREFIX: &str = "Lot";
pub const DEFAULT_ORPHAN_ACCOUNT_PREFIX: &str = "Orphaned Gains";
pub const DEFAULT_GAINS_DESCRIPTION: &str = "Realized Gain/Loss";

/// Config pointers read by [`LotSettings::from_config_json`].
pub const SETTINGS_POINTERS: &[&str] = &[
    "/lots/policy",
    "/lots/title_prefix",
    "/gains/orphan_account_prefix",
    "/gains/description",
];

/// Tunables for lot assignment and gains bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSettings {
    pub policy: PolicyKind,
    /// New lots are titled `"<title_prefix> <n>"`.
    pub title_prefix: String,
    /// Fallback gain accounts are named `"<orphan_account_prefix>-<mnemonic>"`.
    pub orphan_account_prefix: String,
    /// Description of gains transactions, their splits' memo and fallback
    /// gain accounts.
    pub gains_description: String,
}

impl Default for LotSettings {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Fifo,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
            orphan_account_prefix: DEFAULT_ORPHAN_ACCOUNT_PREFIX.to_string(),
            gains_description: DEFAULT_GAINS_DESCRIPTION.to_string(),
        }
    }
}

impl LotSettings {
    /// Read settings from a merged config document; absent keys keep defaults.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut out = Self::default();

        if let Some(policy) = opt_str(cfg, "/lots/policy")? {
            out.policy = policy
                .parse::<PolicyKind>()
                .map_err(|e: String| anyhow!(e))
                .context("invalid lots.policy")?;
        }
        if let Some(prefix) = opt_str(cfg, "/lots/title_prefix")? {
            out.title_prefix = non_empty(prefix, "lots.title_prefix")?;
        }
        if let Some(prefix) = opt_str(cfg, "/gains/orphan_account_prefix")? {
            out.orphan_account_prefix = non_empty(prefix, "gains.orphan_account_prefix")?;
        }
        if let Some(desc) = opt_str(cfg, "/gains/description")? {
            out.gains_description = desc.to_string();
        }
        Ok(out)
    }
}

fn opt_str<'a>(cfg: &'a Value, pointer: &str) -> Result<Option<&'a str>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(anyhow!("config {pointer} must be a string (got {other})")),
    }
}

fn non_empty(s: &str, key: &str) -> Result<String> {
    let t = s.trim();
    if t.is_empty() {
        return Err(anyhow!("{key} must not be empty"));
    }
    Ok(t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_yields_defaults() {
        let s = LotSettings::from_config_json(&json!({})).unwrap();
        assert_eq!(s, LotSettings::default());
        assert_eq!(s.title_prefix, "Lot");
        assert_eq!(s.orphan_account_prefix, "Orphaned Gains");
    }

    #[test]
    fn reads_every_consumed_pointer() {
        let cfg = json!({
            "lots": { "policy": "lifo", "title_prefix": "Batch" },
            "gains": { "orphan_account_prefix": "Gains", "description": "P&L" }
        });
        let s = LotSettings::from_config_json(&cfg).unwrap();
        assert_eq!(s.policy, PolicyKind::Lifo);
        assert_eq!(s.title_prefix, "Batch");
        assert_eq!(s.orphan_account_prefix, "Gains");
        assert_eq!(s.gains_description, "P&L");
        for p in SETTINGS_POINTERS {
            assert!(cfg.pointer(p).is_some(), "{p} not exercised");
        }
    }

    #[test]
    fn rejects_bad_values() {
        let err = LotSettings::from_config_json(&json!({ "lots": { "policy": "HIFO" } }))
            .unwrap_err();
        assert!(format!("{err:#}").contains("lots.policy"));

        assert!(LotSettings::from_config_json(&json!({ "lots": { "title_prefix": 3 } })).is_err());
        assert!(
            LotSettings::from_config_json(&json!({ "lots": { "title_prefix": "  " } })).is_err()
        );
    }
}
