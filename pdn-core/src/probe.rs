//! Key-path probe for discovering schema variants in a source file.

use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;
use crate::orchestrator::load_records;

/// Elements of a sequence inspected per occurrence.
pub const SEQUENCE_SAMPLE: usize = 5;

/// Collect the dotted key paths present in `records`.
///
/// Sequences contribute the paths of their first [`SEQUENCE_SAMPLE`] elements
/// under the sequence's own path.
pub fn key_paths<'a, I>(records: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut paths = BTreeSet::new();
    for record in records {
        walk(record, "", &mut paths);
    }
    paths
}

fn walk(node: &Value, prefix: &str, paths: &mut BTreeSet<String>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(child, &path, paths);
                paths.insert(path);
            }
        }
        Value::Array(items) => {
            for item in items.iter().take(SEQUENCE_SAMPLE) {
                walk(item, prefix, paths);
            }
        }
        _ => {}
    }
}

/// Probe the first `sample` records of `path` and return the sorted key
/// paths starting with `prefix` (all paths when `prefix` is empty).
pub fn probe_file(path: &Path, sample: usize, prefix: &str) -> Result<Vec<String>> {
    let records = load_records(path)?;
    let paths = key_paths(records.iter().take(sample));
    Ok(paths.into_iter().filter(|p| p.starts_with(prefix)).collect())
}
