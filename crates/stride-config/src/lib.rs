//! stride-config
//!
//! Layered YAML configuration: documents merge in order (later overrides
//! earlier), the merged tree is hashed over its canonical JSON form, and
//! the result deserializes into [`StrideConfig`].

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

mod consumption;
mod settings;

pub use consumption::{
    consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport,
};
pub use settings::{
    BackgroundSettings, PermissionSettings, SnapshotSettings, StorageSettings, StrideConfig,
};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the merged tree. Absent keys take their defaults.
    pub fn settings(&self) -> Result<StrideConfig> {
        StrideConfig::from_json(&self.config_json)
    }
}

/// Read each path in order and merge them as [`load_layered_yaml_from_strings`].
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null and contributes nothing.
        if v_json.is_null() {
            continue;
        }
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

/// The built-in defaults, as if loaded from no documents.
pub fn defaults() -> Result<LoadedConfig> {
    load_layered_yaml_from_strings(&[])
}

/// Objects merge key by key; any other value in `b` replaces `a` wholesale,
/// so arrays are never concatenated.
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

/// Compact JSON with object keys sorted.
///
/// Sorting comes from serde_json's default `BTreeMap`-backed `Map`. If any
/// crate in the build enables serde_json's `preserve_order` feature, `Map`
/// keeps insertion order instead and the hash starts depending on how the
/// YAML documents were written.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
