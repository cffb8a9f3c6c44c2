use super::KeyedStore;
use crate::{Error, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// An in-memory [`KeyedStore`].
///
/// Documents are partitioned by key shape (the set of key field names), so a wildcard query for
/// one intent type never returns documents of a child type that shares its prefix fields.
#[derive(Debug, Default)]
pub struct MemStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

#[derive(Debug)]
struct Document {
    key: Map<String, Value>,
    secondary: Option<Value>,
    tags: BTreeMap<String, Value>,
}

// === impl MemStore ===

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait::async_trait]
impl KeyedStore for MemStore {
    async fn insert(
        &self,
        collection: &str,
        key: &Value,
        secondary: Option<&Value>,
        tag: &str,
        value: &Value,
    ) -> Result<()> {
        let key = as_object(key)?;
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|doc| doc.key == *key) {
            Some(doc) => {
                doc.tags.insert(tag.to_string(), value.clone());
                if let Some(secondary) = secondary {
                    doc.secondary = Some(secondary.clone());
                }
            }
            None => docs.push(Document {
                key: key.clone(),
                secondary: secondary.cloned(),
                tags: Some((tag.to_string(), value.clone())).into_iter().collect(),
            }),
        }
        Ok(())
    }

    async fn find(&self, collection: &str, key: &Value, tag: &str) -> Result<Vec<Vec<u8>>> {
        let query = as_object(key)?;
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(vec![]);
        };
        docs.iter()
            .filter(|doc| doc.matches(query))
            .filter_map(|doc| doc.tags.get(tag))
            .map(|value| {
                serde_json::to_vec(value)
                    .map_err(|error| Error::downstream("db Find failed", error))
            })
            .collect()
    }

    async fn remove(&self, collection: &str, key: &Value) -> Result<()> {
        let key = as_object(key)?;
        let mut collections = self.collections.write();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| Error::not_found("db Remove resource not found"))?;

        let Some(idx) = docs.iter().position(|doc| doc.key == *key) else {
            return Err(Error::not_found("db Remove resource not found"));
        };
        if docs.iter().any(|doc| is_child(key, &doc.key)) {
            return Err(Error::conflict(
                "Cannot delete parent without deleting child references first",
            ));
        }
        docs.remove(idx);
        Ok(())
    }
}

// === impl Document ===

impl Document {
    /// Existence queries also see the secondary key's fields.
    fn matches(&self, query: &Map<String, Value>) -> bool {
        match &self.secondary {
            Some(Value::Object(secondary)) if is_subset_query(query) => {
                let mut indexed = self.key.clone();
                indexed.extend(secondary.iter().map(|(k, v)| (k.clone(), v.clone())));
                matches(query, &indexed)
            }
            _ => matches(query, &self.key),
        }
    }
}

fn as_object(key: &Value) -> Result<&Map<String, Value>> {
    key.as_object()
        .ok_or_else(|| Error::validation(format!("db key must be an object, got {key}")))
}

fn is_exists(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|o| o.get("$exists"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn is_wildcard(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

/// Existence queries match any document carrying the queried fields; every other query only
/// matches documents of the same shape.
fn matches(query: &Map<String, Value>, key: &Map<String, Value>) -> bool {
    let subset = is_subset_query(query);
    if !subset && (query.len() != key.len() || !query.keys().all(|k| key.contains_key(k))) {
        return false;
    }

    query.iter().all(|(field, value)| match key.get(field) {
        None => false,
        Some(_) if is_exists(value) || is_wildcard(value) => true,
        Some(stored) => stored == value,
    })
}

fn is_subset_query(query: &Map<String, Value>) -> bool {
    query.values().any(is_exists)
}

/// A child key extends the parent with more fields and agrees on every parent field.
fn is_child(parent: &Map<String, Value>, key: &Map<String, Value>) -> bool {
    key.len() > parent.len() && parent.iter().all(|(field, value)| key.get(field) == Some(value))
}
