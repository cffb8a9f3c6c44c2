//! Keyed document storage.
//!
//! Keys are structs whose JSON form is the lookup key. A key whose leaf fields are empty strings
//! matches every document of the same shape that agrees on the remaining fields, which is how the
//! clients list all intents under a parent. A field queried as `{"$exists": true}` turns the query
//! into a subset match, which also sees the fields of a document's secondary key.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

mod mem;
#[cfg(test)]
mod tests;

pub use self::mem::MemStore;

/// A document collection addressed by composite JSON keys.
#[async_trait::async_trait]
pub trait KeyedStore: Send + Sync {
    /// Inserts or replaces the `tag` value of the document at `key`.
    async fn insert(
        &self,
        collection: &str,
        key: &Value,
        secondary: Option<&Value>,
        tag: &str,
        value: &Value,
    ) -> Result<()>;

    /// Returns the raw `tag` values of every document matching `key`.
    async fn find(&self, collection: &str, key: &Value, tag: &str) -> Result<Vec<Vec<u8>>>;

    /// Removes the document stored at exactly `key`.
    async fn remove(&self, collection: &str, key: &Value) -> Result<()>;
}

/// Decodes a raw document returned by [`KeyedStore::find`].
pub fn unmarshal<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    serde_json::from_slice(raw).map_err(|error| Error::downstream("db Unmarshal failed", error))
}

fn to_key<K: Serialize>(key: &K) -> Result<Value> {
    match serde_json::to_value(key) {
        Ok(key @ Value::Object(_)) => Ok(key),
        Ok(other) => Err(Error::validation(format!(
            "db key must be an object, got {other}"
        ))),
        Err(error) => Err(Error::downstream("Error Marshalling key", error)),
    }
}

/// Typed helpers over a [`KeyedStore`].
#[async_trait::async_trait]
pub trait StoreExt: KeyedStore {
    async fn insert_typed<K, V>(&self, collection: &str, key: &K, tag: &str, value: &V) -> Result<()>
    where
        K: Serialize + Sync,
        V: Serialize + Sync,
    {
        let key = to_key(key)?;
        let value = serde_json::to_value(value)
            .map_err(|error| Error::downstream("Error Marshalling value", error))?;
        self.insert(collection, &key, None, tag, &value).await
    }

    async fn insert_with_secondary<K, S, V>(
        &self,
        collection: &str,
        key: &K,
        secondary: &S,
        tag: &str,
        value: &V,
    ) -> Result<()>
    where
        K: Serialize + Sync,
        S: Serialize + Sync,
        V: Serialize + Sync,
    {
        let key = to_key(key)?;
        let secondary = to_key(secondary)?;
        let value = serde_json::to_value(value)
            .map_err(|error| Error::downstream("Error Marshalling value", error))?;
        self.insert(collection, &key, Some(&secondary), tag, &value)
            .await
    }

    async fn find_typed<K, V>(&self, collection: &str, key: &K, tag: &str) -> Result<Vec<V>>
    where
        K: Serialize + Sync,
        V: DeserializeOwned,
    {
        let key = to_key(key)?;
        self.find(collection, &key, tag)
            .await?
            .iter()
            .map(|raw| unmarshal(raw))
            .collect()
    }

    async fn remove_typed<K>(&self, collection: &str, key: &K) -> Result<()>
    where
        K: Serialize + Sync,
    {
        let key = to_key(key)?;
        self.remove(collection, &key).await
    }
}

impl<S: KeyedStore + ?Sized> StoreExt for S {}
