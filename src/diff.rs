//! Structural diff of configuration trees.
//!
//! `diff_configs` is a pure function: identical inputs always produce an
//! identical, order-stable change list. Lists are compared element by index;
//! semantic reordering is reported as modifications, not moves.

use crate::paths;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of divergence at a single field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single field-level divergence between baseline and actual configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted path to the diverged node (`encryption.enabled`, `ingress.0.cidr`).
    pub field_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    pub change_type: ChangeType,
}

impl FieldChange {
    pub fn added(field_path: impl Into<String>, new_value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            old_value: None,
            new_value: Some(new_value),
            change_type: ChangeType::Added,
        }
    }

    pub fn removed(field_path: impl Into<String>, old_value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            old_value: Some(old_value),
            new_value: None,
            change_type: ChangeType::Removed,
        }
    }

    pub fn modified(field_path: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            old_value: Some(old_value),
            new_value: Some(new_value),
            change_type: ChangeType::Modified,
        }
    }
}

/// Result of diffing one resource's configuration against its baseline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffReport {
    pub changes: Vec<FieldChange>,
    pub has_drift: bool,
}

/// Compute the structural difference between a baseline configuration tree
/// and the actual (current) configuration tree.
///
/// Keys present only in the baseline are `removed`, keys present only in the
/// actual tree are `added`, and differing leaves are `modified`. Maps recurse
/// with the key appended to the path; lists recurse element by index. An
/// absent key and a present `null` are distinct states and never coalesced.
/// Numeric equality is exact. The change list is sorted by field path.
pub fn diff_configs(baseline: &Value, actual: &Value) -> DiffReport {
    let mut changes = Vec::new();
    walk("", baseline, actual, &mut changes);
    changes.sort_by(|a, b| a.field_path.cmp(&b.field_path));
    DiffReport {
        has_drift: !changes.is_empty(),
        changes,
    }
}

fn walk(path: &str, baseline: &Value, actual: &Value, out: &mut Vec<FieldChange>) {
    match (baseline, actual) {
        (Value::Object(base), Value::Object(act)) => {
            for (key, base_value) in base {
                let child = paths::join(path, key);
                match act.get(key) {
                    Some(act_value) => walk(&child, base_value, act_value, out),
                    None => out.push(FieldChange::removed(child, base_value.clone())),
                }
            }
            for (key, act_value) in act {
                if !base.contains_key(key) {
                    out.push(FieldChange::added(paths::join(path, key), act_value.clone()));
                }
            }
        }
        (Value::Array(base), Value::Array(act)) => {
            let shared = base.len().min(act.len());
            for i in 0..shared {
                walk(&paths::index(path, i), &base[i], &act[i], out);
            }
            for (i, base_value) in base.iter().enumerate().skip(shared) {
                out.push(FieldChange::removed(paths::index(path, i), base_value.clone()));
            }
            for (i, act_value) in act.iter().enumerate().skip(shared) {
                out.push(FieldChange::added(paths::index(path, i), act_value.clone()));
            }
        }
        (base, act) => {
            if base != act {
                out.push(FieldChange::modified(path, base.clone(), act.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_trees_produce_no_changes() {
        let config = json!({"encryption": {"enabled": true}, "tags": ["a", "b"]});
        let report = diff_configs(&config, &config);
        assert!(!report.has_drift);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_modified_leaf() {
        let baseline = json!({"encryption": {"enabled": true}});
        let actual = json!({"encryption": {"enabled": false}});
        let report = diff_configs(&baseline, &actual);

        assert!(report.has_drift);
        assert_eq!(report.changes.len(), 1);
        let change = &report.changes[0];
        assert_eq!(change.field_path, "encryption.enabled");
        assert_eq!(change.change_type, ChangeType::Modified);
        assert_eq!(change.old_value, Some(json!(true)));
        assert_eq!(change.new_value, Some(json!(false)));
    }

    #[test]
    fn test_added_and_removed_keys() {
        let baseline = json!({"logging": {"enabled": true}, "legacy": 1});
        let actual = json!({"logging": {"enabled": true}, "public_access": true});
        let report = diff_configs(&baseline, &actual);

        assert_eq!(report.changes.len(), 2);
        assert_eq!(report.changes[0].field_path, "legacy");
        assert_eq!(report.changes[0].change_type, ChangeType::Removed);
        assert_eq!(report.changes[1].field_path, "public_access");
        assert_eq!(report.changes[1].change_type, ChangeType::Added);
    }

    #[test]
    fn test_list_compared_by_index() {
        let baseline = json!({"ingress": [{"port": 22, "cidr": "10.0.0.0/8"}]});
        let actual = json!({"ingress": [{"port": 22, "cidr": "0.0.0.0/0"}]});
        let report = diff_configs(&baseline, &actual);

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].field_path, "ingress.0.cidr");
        assert_eq!(report.changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn test_list_length_change() {
        let baseline = json!({"ingress": [{"port": 22}]});
        let actual = json!({"ingress": [{"port": 22}, {"port": 443}]});
        let report = diff_configs(&baseline, &actual);

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].field_path, "ingress.1");
        assert_eq!(report.changes[0].change_type, ChangeType::Added);
    }

    #[test]
    fn test_absent_vs_present_null_are_distinct() {
        let baseline = json!({"kms_key_id": null});
        let actual = json!({});
        let report = diff_configs(&baseline, &actual);

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].change_type, ChangeType::Removed);
        assert_eq!(report.changes[0].old_value, Some(Value::Null));

        // And in the other direction, null appearing is an addition.
        let report = diff_configs(&actual, &baseline);
        assert_eq!(report.changes[0].change_type, ChangeType::Added);
        assert_eq!(report.changes[0].new_value, Some(Value::Null));
    }

    #[test]
    fn test_null_to_value_is_modified() {
        let baseline = json!({"kms_key_id": null});
        let actual = json!({"kms_key_id": "key-1"});
        let report = diff_configs(&baseline, &actual);

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn test_type_change_is_modified() {
        let baseline = json!({"retention": 30});
        let actual = json!({"retention": {"days": 30}});
        let report = diff_configs(&baseline, &actual);

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].field_path, "retention");
        assert_eq!(report.changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn test_numeric_equality_is_exact() {
        let baseline = json!({"timeout": 30});
        let actual = json!({"timeout": 30.0});
        let report = diff_configs(&baseline, &actual);
        // Integer 30 and float 30.0 are distinct configuration values.
        assert!(report.has_drift);
    }

    #[test]
    fn test_output_sorted_by_field_path() {
        let baseline = json!({"z": 1, "a": {"y": 1, "b": 2}});
        let actual = json!({"z": 2, "a": {"y": 9, "b": 3}});
        let report = diff_configs(&baseline, &actual);

        let paths: Vec<&str> = report
            .changes
            .iter()
            .map(|c| c.field_path.as_str())
            .collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_symmetry() {
        let a = json!({"encryption": {"enabled": true}, "only_a": 1, "both": "x"});
        let b = json!({"encryption": {"enabled": false}, "only_b": 2, "both": "y"});

        let forward = diff_configs(&a, &b);
        let backward = diff_configs(&b, &a);
        assert_eq!(forward.changes.len(), backward.changes.len());

        for change in &forward.changes {
            let mirror = backward
                .changes
                .iter()
                .find(|c| c.field_path == change.field_path)
                .expect("mirrored change");
            match change.change_type {
                ChangeType::Removed => {
                    assert_eq!(mirror.change_type, ChangeType::Added);
                    assert_eq!(mirror.new_value, change.old_value);
                }
                ChangeType::Added => {
                    assert_eq!(mirror.change_type, ChangeType::Removed);
                    assert_eq!(mirror.old_value, change.new_value);
                }
                ChangeType::Modified => {
                    assert_eq!(mirror.change_type, ChangeType::Modified);
                    assert_eq!(mirror.old_value, change.new_value);
                    assert_eq!(mirror.new_value, change.old_value);
                }
            }
        }
    }

    #[test]
    fn test_determinism() {
        let baseline = json!({"a": {"b": [1, 2, 3]}, "c": true, "d": "x"});
        let actual = json!({"a": {"b": [1, 9, 3]}, "c": false, "e": "y"});

        let first = serde_json::to_string(&diff_configs(&baseline, &actual)).unwrap();
        for _ in 0..10 {
            let next = serde_json::to_string(&diff_configs(&baseline, &actual)).unwrap();
            assert_eq!(first, next);
        }
    }
}
