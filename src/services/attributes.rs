//! Normalised variant attributes (e.g. `size=M`, `color=Red`).
//!
//! Stored as an ordered list of `(key, value)` pairs. Keys compare
//! case-insensitively; blank values and the `null`/`undefined` sentinels
//! are treated as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantAttributes {
    pairs: Vec<(String, String)>,
}

fn normalize_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match fold_case(trimmed).as_str() {
        "null" | "undefined" => None,
        _ => Some(trimmed.to_string()),
    }
}

/// Case folding shared by key lookup, value matching and the canonical key.
fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

fn normalize_key(raw: &str) -> Option<String> {
    normalize_value(raw).map(|k| fold_case(&k))
}

impl VariantAttributes {
    /// Build from raw pairs. Later duplicates of a key replace earlier ones
    /// in place, keeping first-seen order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut normalized: Vec<(String, String)> = Vec::new();

        for (key, value) in pairs {
            let (Some(key), Some(value)) = (normalize_key(key.as_ref()), normalize_value(value.as_ref()))
            else {
                continue;
            };

            match normalized.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => normalized.push((key, value)),
            }
        }

        Self { pairs: normalized }
    }

    /// Parse the JSON column shape: an object of scalars or a list of
    /// `{ "key": .., "value": .. }` entries. Anything else is empty.
    pub fn from_json(value: &Value) -> Self {
        fn scalar(v: &Value) -> Option<String> {
            match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }
        }

        match value {
            Value::Object(map) => Self::from_pairs(
                map.iter()
                    .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v))),
            ),
            Value::Array(items) => Self::from_pairs(items.iter().filter_map(|item| {
                let key = item.get("key").and_then(scalar)?;
                let value = item.get("value").and_then(scalar)?;
                Some((key, value))
            })),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key)?;
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True when every attribute in `selection` is present with an equal
    /// value (values compare case-insensitively).
    pub fn matches(&self, selection: &VariantAttributes) -> bool {
        selection.pairs.iter().all(|(key, value)| {
            self.get(key)
                .map(|own| fold_case(own) == fold_case(value))
                .unwrap_or(false)
        })
    }

    /// Order-independent identity used for de-duplication.
    pub fn canonical_key(&self) -> String {
        let mut entries: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, fold_case(v)))
            .collect();
        entries.sort();
        entries.join("|")
    }
}

impl PartialEq for VariantAttributes {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for VariantAttributes {}
