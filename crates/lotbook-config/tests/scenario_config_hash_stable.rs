//! Config hash stability
//!
//! GREEN when:
//! - the same layers hash identically on every load
//! - key order inside a layer does not change the hash
//! - a changed value changes the hash
//! - layer order matters (later wins)

use lotbook_config::{load_layered_yaml, load_layered_yaml_from_strings};
use std::fs;

const BASE_YAML: &str = r#"
lots:
  policy: FIFO
  title_prefix: "Lot"
gains:
  orphan_account_prefix: "Orphaned Gains"
  description: "Realized Gain/Loss"
logging:
  filter: "info"
"#;

const BASE_YAML_REORDERED: &str = r#"
logging:
  filter: "info"
gains:
  description: "Realized Gain/Loss"
  orphan_account_prefix: "Orphaned Gains"
lots:
  title_prefix: "Lot"
  policy: FIFO
"#;

const OVERLAY_YAML: &str = r#"
lots:
  policy: LIFO
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex digest");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(original.config_hash, reordered.config_hash);
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);
    assert_eq!(layered.config_json["lots"]["policy"], "LIFO");
    // Untouched siblings survive the overlay.
    assert_eq!(layered.config_json["lots"]["title_prefix"], "Lot");

    let reversed = load_layered_yaml_from_strings(&[OVERLAY_YAML, BASE_YAML]).unwrap();
    assert_eq!(reversed.config_json["lots"]["policy"], "FIFO");
    assert_eq!(reversed.config_hash, base.config_hash);
}

#[test]
fn files_hash_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    fs::write(&base, BASE_YAML).unwrap();
    fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[&base, &overlay]).unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);

    let missing = dir.path().join("nope.yaml");
    let err = load_layered_yaml(&[&missing]).unwrap_err();
    assert!(format!("{err:#}").contains("failed to read yaml path"));
}

#[test]
fn non_mapping_layer_is_rejected() {
    assert!(load_layered_yaml_from_strings(&["- a\n- b\n"]).is_err());
    assert!(load_layered_yaml_from_strings(&["lots: [unclosed"]).is_err());
    // Empty document is an empty layer.
    let empty = load_layered_yaml_from_strings(&["", BASE_YAML]).unwrap();
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(empty.config_hash, base.config_hash);
}
