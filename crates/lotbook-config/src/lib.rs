//! Layered YAML configuration.
//!
//! Layers are merged in order (later wins, objects merge key by key),
//! rendered to canonical JSON with recursively sorted keys and hashed with
//! SHA-256, so the same effective settings always yield the same hash.
//!
//! Leaves not covered by [`CONSUMED_POINTERS`] are reported by
//! [`report_unused_keys`]; callers decide whether that warns or fails.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Pointer of the log filter the CLI falls back to when `RUST_LOG` is unset.
pub const LOGGING_FILTER_POINTER: &str = "/logging/filter";

/// JSON-pointer prefixes that code actually reads. A leaf under any of
/// these is consumed.
///
/// Readers:
/// - lotbook-lots `LotSettings::from_config_json`
///     /lots/policy, /lots/title_prefix,
///     /gains/orphan_account_prefix, /gains/description
/// - lotbook-cli tracing setup
///     /logging/filter
pub const CONSUMED_POINTERS: &[&str] = &[
    "/lots/policy",
    "/lots/title_prefix",
    "/gains/orphan_account_prefix",
    "/gains/description",
    LOGGING_FILTER_POINTER,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Consumed prefixes used for this analysis (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted, unique).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Compare the config's leaves against [`CONSUMED_POINTERS`].
///
/// `Warn` logs each unused leaf and returns the report; `Fail` returns an
/// error when any leaf is unused.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    report_unused_keys_against(config_json, CONSUMED_POINTERS, policy)
}

/// [`report_unused_keys`] with an explicit registry.
pub fn report_unused_keys_against(
    config_json: &Value,
    consumed: &[&str],
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed_prefixes: Vec<String> = consumed
        .iter()
        .map(|p| normalize_pointer(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    match policy {
        UnusedKeyPolicy::Fail if !report.is_clean() => bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s). \
             Remove them or teach a reader about them. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        ),
        UnusedKeyPolicy::Warn => {
            for leaf in &report.unused_leaf_pointers {
                warn!(pointer = %leaf, "unused config key");
            }
        }
        UnusedKeyPolicy::Fail => {}
    }
    Ok(report)
}

/// Leading `/`, no trailing `/` (except the root pointer itself).
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// `/a/b` covers `/a/b` and `/a/b/c` but not `/a/bc`; `/` covers everything.
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                collect_leaf_pointers(vv, &format!("{prefix}/{}", escape_pointer_token(k)), out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ if prefix.is_empty() => {}
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Nothing configured: every reader falls back to its defaults.
    pub fn empty() -> Result<Self> {
        load_layered_yaml_from_strings(&[])
    }
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs = Vec::with_capacity(paths.len());
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p)
            .with_context(|| format!("failed to read yaml path: {}", p.display()))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        let v_json = match serde_json::to_value(v_yaml).context("yaml->json conversion failed")? {
            // An empty document is an empty layer.
            Value::Null => continue,
            v @ Value::Object(_) => v,
            other => bail!("config layer {i} must be a mapping, got {other}"),
        };
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys sorted at every depth.
fn canonicalize_json(v: &Value) -> Result<String> {
    fn sorted(v: &Value) -> Value {
        match v {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = Map::new();
                for k in keys {
                    out.insert(k.clone(), sorted(&map[k]));
                }
                Value::Object(out)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sorted(v)).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
