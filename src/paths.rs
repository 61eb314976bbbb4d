//! Dotted field-path helpers for configuration trees.
//!
//! Paths address nodes inside a JSON-like configuration tree with
//! dot-separated segments; list elements use their index as a segment
//! (`ingress.0.cidr`). Rule conditions may use `*` as a single-segment
//! wildcard (`ingress.*.cidr`).

use serde_json::Value;

/// Single-segment wildcard used in rule field paths.
pub const WILDCARD: &str = "*";

/// Append a map key to a path.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Append a list index to a path.
pub fn index(parent: &str, idx: usize) -> String {
    join(parent, &idx.to_string())
}

/// Validate a rule field path: non-empty, no empty segments.
pub fn validate(path: &str) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err("field path is empty".to_string());
    }
    if path.split('.').any(str::is_empty) {
        return Err(format!("field path '{path}' contains an empty segment"));
    }
    Ok(())
}

/// Look up a concrete (wildcard-free) path inside a configuration tree.
///
/// Returns `None` when any segment is missing. A present `null` resolves to
/// `Some(&Value::Null)`; absence and null are distinct states.
pub fn lookup<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = config;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a path that may contain `*` segments, returning every concrete
/// (path, value) pair it addresses. A `*` expands over all elements of a
/// list and all keys of a map at that level.
pub fn lookup_all<'a>(config: &'a Value, pattern: &str) -> Vec<(String, &'a Value)> {
    let segments: Vec<&str> = pattern.split('.').collect();
    let mut out = Vec::new();
    descend(config, &segments, String::new(), &mut out);
    out
}

fn descend<'a>(
    current: &'a Value,
    segments: &[&str],
    path: String,
    out: &mut Vec<(String, &'a Value)>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push((path, current));
        return;
    };

    if *segment == WILDCARD {
        match current {
            Value::Object(map) => {
                for (key, value) in map {
                    descend(value, rest, join(&path, key), out);
                }
            }
            Value::Array(items) => {
                for (i, value) in items.iter().enumerate() {
                    descend(value, rest, index(&path, i), out);
                }
            }
            _ => {}
        }
        return;
    }

    let next = match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    };
    if let Some(value) = next {
        descend(value, rest, join(&path, segment), out);
    }
}

/// Segment-wise match of a concrete change path against a rule path that may
/// contain `*` segments. Both paths must have the same number of segments.
pub fn matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('.');
    let mut path_segments = path.split('.');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                if p != WILDCARD && p != s {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_and_index() {
        assert_eq!(join("", "encryption"), "encryption");
        assert_eq!(join("encryption", "enabled"), "encryption.enabled");
        assert_eq!(index("ingress", 0), "ingress.0");
    }

    #[test]
    fn test_validate() {
        assert!(validate("a.b.c").is_ok());
        assert!(validate("a.0.b").is_ok());
        assert!(validate("").is_err());
        assert!(validate("a..b").is_err());
        assert!(validate(".a").is_err());
    }

    #[test]
    fn test_lookup_nested() {
        let config = json!({"encryption": {"enabled": true}});
        assert_eq!(
            lookup(&config, "encryption.enabled"),
            Some(&Value::Bool(true))
        );
        assert_eq!(lookup(&config, "encryption.missing"), None);
        assert_eq!(lookup(&config, "missing.enabled"), None);
    }

    #[test]
    fn test_lookup_list_index() {
        let config = json!({"ingress": [{"port": 22}, {"port": 443}]});
        assert_eq!(lookup(&config, "ingress.1.port"), Some(&json!(443)));
        assert_eq!(lookup(&config, "ingress.2.port"), None);
    }

    #[test]
    fn test_lookup_null_is_present() {
        let config = json!({"kms_key_id": null});
        assert_eq!(lookup(&config, "kms_key_id"), Some(&Value::Null));
        assert_eq!(lookup(&config, "other"), None);
    }

    #[test]
    fn test_lookup_all_wildcard_over_list() {
        let config = json!({"ingress": [{"cidr": "10.0.0.0/8"}, {"cidr": "0.0.0.0/0"}]});
        let found = lookup_all(&config, "ingress.*.cidr");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "ingress.0.cidr");
        assert_eq!(found[1].0, "ingress.1.cidr");
        assert_eq!(found[1].1, &json!("0.0.0.0/0"));
    }

    #[test]
    fn test_lookup_all_wildcard_over_map() {
        let config = json!({"tags": {"env": "prod", "team": "core"}});
        let found = lookup_all(&config, "tags.*");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_lookup_all_concrete_path() {
        let config = json!({"a": {"b": 1}});
        let found = lookup_all(&config, "a.b");
        assert_eq!(found, vec![("a.b".to_string(), &json!(1))]);
    }

    #[test]
    fn test_lookup_all_no_match() {
        let config = json!({"a": 1});
        assert!(lookup_all(&config, "b.*").is_empty());
    }

    #[test]
    fn test_matches_exact_and_wildcard() {
        assert!(matches("encryption.enabled", "encryption.enabled"));
        assert!(matches("ingress.*.cidr", "ingress.0.cidr"));
        assert!(matches("ingress.*.cidr", "ingress.17.cidr"));
        assert!(!matches("ingress.*.cidr", "ingress.0.port"));
        assert!(!matches("ingress.*.cidr", "ingress.0.cidr.extra"));
        assert!(!matches("ingress.*", "ingress"));
    }
}
