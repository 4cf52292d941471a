//! Opaque, caller-defined metadata records.
//!
//! `UserMetadata` and `PlatformMetadata` are both opaque, caller-defined
//! records with structural equality. Modeling both as a
//! `serde_json::Value`-backed newtype turns the operations callers actually
//! need — deep-partial-match, shallow merge, and canonical-JSON key
//! sorting — into structural operations instead of hand-rolled reflection
//! over a generic type.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque metadata record: either a descriptor, a full identity, or a
/// platform side-channel record.
///
/// Equality is structural (`PartialEq` on the underlying JSON value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Value);

impl Metadata {
    /// The empty object `{}`.
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Wrap an arbitrary JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Build from key/value pairs.
    #[must_use]
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert(k.into(), v);
        }
        Self(Value::Object(map))
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `groups` field, treated as an ordered set of group names.
    ///
    /// Absent or non-array `groups` is treated as the empty set.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        self.0
            .get("groups")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Deep-partial-match (§4.2): every key present in `self` (treated as
    /// the descriptor) must exist on `target` and recursively
    /// deep-partial-match; extra keys on `target` are ignored. Arrays are
    /// compared positionally (indices as keys). Reference/primitive
    /// equality short-circuits true.
    #[must_use]
    pub fn deep_partial_match(&self, target: &Metadata) -> bool {
        deep_partial_match_value(&self.0, &target.0)
    }

    /// Shallow merge: overwrite top-level keys in `self` with those present
    /// in `updates`, leaving keys absent from `updates` untouched.
    #[must_use]
    pub fn merge(&self, updates: &Metadata) -> Self {
        let mut base = self.0.as_object().cloned().unwrap_or_default();
        if let Some(patch) = updates.0.as_object() {
            for (k, v) in patch {
                base.insert(k.clone(), v.clone());
            }
        }
        Self(Value::Object(base))
    }

    /// Canonical JSON with top-level keys sorted lexicographically (§9).
    /// Deeper nesting is serialized as-is (not recursively canonicalized);
    /// descriptors in practice are shallow.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        match self.0.as_object() {
            Some(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut sorted = Map::new();
                for (k, v) in entries {
                    sorted.insert(k.clone(), v.clone());
                }
                Value::Object(sorted).to_string()
            }
            None => self.0.to_string(),
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn deep_partial_match_value(descriptor: &Value, target: &Value) -> bool {
    if descriptor == target {
        return true;
    }
    match (descriptor, target) {
        (Value::Object(d), Value::Object(t)) => d
            .iter()
            .all(|(k, dv)| t.get(k).is_some_and(|tv| deep_partial_match_value(dv, tv))),
        (Value::Array(d), Value::Array(t)) => {
            d.len() <= t.len()
                && d.iter()
                    .zip(t.iter())
                    .all(|(dv, tv)| deep_partial_match_value(dv, tv))
        }
        _ => false,
    }
}

/// A caller-supplied predicate over [`Metadata`], used to locate an
/// existing connection (§3, "Matcher").
pub type Matcher = std::sync::Arc<dyn Fn(&Metadata) -> bool + Send + Sync>;

/// Compare two canonical-JSON descriptor keys; used only to give
/// `pending_creations` a deterministic iteration order in diagnostics.
#[must_use]
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_partial_match_ignores_extra_target_keys() {
        let descriptor = Metadata::new(json!({"context": "host", "id": 1}));
        let target = Metadata::new(json!({"context": "host", "id": 1, "extra": true}));
        assert!(descriptor.deep_partial_match(&target));
    }

    #[test]
    fn deep_partial_match_fails_on_missing_key() {
        let descriptor = Metadata::new(json!({"context": "host", "id": 1}));
        let target = Metadata::new(json!({"context": "host"}));
        assert!(!descriptor.deep_partial_match(&target));
    }

    #[test]
    fn deep_partial_match_recurses_into_nested_objects() {
        let descriptor = Metadata::new(json!({"nested": {"a": 1}}));
        let target = Metadata::new(json!({"nested": {"a": 1, "b": 2}}));
        assert!(descriptor.deep_partial_match(&target));

        let mismatched = Metadata::new(json!({"nested": {"a": 2}}));
        assert!(!descriptor.deep_partial_match(&mismatched));
    }

    #[test]
    fn merge_overwrites_only_present_top_level_keys() {
        let base = Metadata::new(json!({"context": "worker", "id": 1, "groups": ["a"]}));
        let updates = Metadata::new(json!({"groups": ["b", "c"]}));
        let merged = base.merge(&updates);
        assert_eq!(merged.get("context").unwrap(), "worker");
        assert_eq!(merged.groups(), vec!["b", "c"]);
    }

    #[test]
    fn canonical_json_sorts_top_level_keys() {
        let a = Metadata::new(json!({"id": 1, "context": "host"}));
        let b = Metadata::new(json!({"context": "host", "id": 1}));
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn groups_defaults_to_empty() {
        let m = Metadata::new(json!({"context": "host"}));
        assert!(m.groups().is_empty());
    }
}
