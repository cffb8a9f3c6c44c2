use crate::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// The key/value store backing every [`AppContext`](super::AppContext).
///
/// Keys are `/`-terminated paths; a prefix query returns every key below a path, including the
/// path itself.
#[async_trait::async_trait]
pub trait ContextDb: Send + Sync {
    async fn put(&self, key: &str, value: &Value) -> Result<()>;

    /// Returns the value stored at `key`, or `None` if nothing is stored there.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn get_all_keys(&self, prefix: &str) -> Result<Vec<String>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn delete_all(&self, prefix: &str) -> Result<()>;
}

/// An in-memory [`ContextDb`] with sorted keys.
#[derive(Debug, Default)]
pub struct MemContextDb(RwLock<BTreeMap<String, Value>>);

// === impl MemContextDb ===

impl MemContextDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ContextDb for MemContextDb {
    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        if key.is_empty() {
            return Err(Error::validation("Key is null"));
        }
        self.0.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.0.read().get(key).cloned())
    }

    async fn get_all_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .0
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.0.write().remove(key);
        Ok(())
    }

    async fn delete_all(&self, prefix: &str) -> Result<()> {
        self.0.write().retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}
