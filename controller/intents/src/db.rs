use orchestrator_core::{Error, KeyedStore, Result, StoreExt};
use serde::{de::DeserializeOwned, Serialize};
use std::{marker::PhantomData, sync::Arc};

const DEFAULT_COLLECTION: &str = "resources";
const DEFAULT_TAG: &str = "data";

/// Where a client keeps its documents.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn KeyedStore>,
    collection: Arc<str>,
    tag: Arc<str>,
}

// === impl Db ===

impl Db {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self {
            store,
            collection: DEFAULT_COLLECTION.into(),
            tag: DEFAULT_TAG.into(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<Arc<str>>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Sets the tag intent metadata is stored under.
    pub fn with_tag(mut self, tag: impl Into<Arc<str>>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyedStore> {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("collection", &self.collection)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Create/get/list/delete of one document type, with that type's error messages.
pub(crate) struct Crud<V> {
    db: Db,
    already_exists: &'static str,
    not_found: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V> Crud<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    pub(crate) fn new(db: Db, already_exists: &'static str, not_found: &'static str) -> Self {
        Self {
            db,
            already_exists,
            not_found,
            _value: PhantomData,
        }
    }

    /// Stores `value`, returning whether a document already existed at `key`.
    pub(crate) async fn create<K>(&self, key: &K, value: &V, fail_if_exists: bool) -> Result<bool>
    where
        K: Serialize + Sync,
    {
        let existed = self.check_exists(key, fail_if_exists).await?;
        self.db
            .store
            .insert_typed(&self.db.collection, key, &self.db.tag, value)
            .await
            .map_err(|e| e.context("Creating DB Entry"))?;
        Ok(existed)
    }

    /// Like [`Crud::create`], also indexing the document under `secondary`.
    pub(crate) async fn create_indexed<K, S>(
        &self,
        key: &K,
        secondary: &S,
        value: &V,
        fail_if_exists: bool,
    ) -> Result<bool>
    where
        K: Serialize + Sync,
        S: Serialize + Sync,
    {
        let existed = self.check_exists(key, fail_if_exists).await?;
        self.db
            .store
            .insert_with_secondary(&self.db.collection, key, secondary, &self.db.tag, value)
            .await
            .map_err(|e| e.context("Creating DB Entry"))?;
        Ok(existed)
    }

    async fn check_exists<K>(&self, key: &K, fail_if_exists: bool) -> Result<bool>
    where
        K: Serialize + Sync,
    {
        match self.get(key).await {
            Ok(_) if fail_if_exists => Err(Error::conflict(self.already_exists)),
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub(crate) async fn get<K>(&self, key: &K) -> Result<V>
    where
        K: Serialize + Sync,
    {
        self.db
            .store
            .find_typed(&self.db.collection, key, &self.db.tag)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(self.not_found))
    }

    /// Lists every document matching a wildcard key.
    pub(crate) async fn get_all<K>(&self, key: &K) -> Result<Vec<V>>
    where
        K: Serialize + Sync,
    {
        self.db
            .store
            .find_typed(&self.db.collection, key, &self.db.tag)
            .await
    }

    pub(crate) async fn delete<K>(&self, key: &K) -> Result<()>
    where
        K: Serialize + Sync,
    {
        self.db.store.remove_typed(&self.db.collection, key).await
    }

    /// Stores an auxiliary document (such as file content) under `tag`.
    pub(crate) async fn put_content<K, C>(&self, key: &K, tag: &str, content: &C) -> Result<()>
    where
        K: Serialize + Sync,
        C: Serialize + Sync,
    {
        self.db
            .store
            .insert_typed(&self.db.collection, key, tag, content)
            .await
            .map_err(|e| e.context("Creating DB Entry"))
    }

    pub(crate) async fn get_content<K, C>(&self, key: &K, tag: &str) -> Result<Option<C>>
    where
        K: Serialize + Sync,
        C: DeserializeOwned,
    {
        Ok(self
            .db
            .store
            .find_typed(&self.db.collection, key, tag)
            .await?
            .into_iter()
            .next())
    }
}
