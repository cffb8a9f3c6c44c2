//! The resolved deployment state of one composite app.
//!
//! An [`AppContext`] is a tree stored in a [`ContextDb`]:
//!
//! ```text
//! /context/{id}/                                  composite app (value: id)
//! /context/{id}/meta/                             CompositeAppMeta
//! /context/{id}/app/instruction/order/            AppOrder
//! /context/{id}/app/{app}/                        app (value: app name)
//! .../app/{app}/cluster/{cluster}/                cluster (value: cluster name)
//! .../cluster/{cluster}/resource/{name+kind}/     resource (value: manifest)
//! .../cluster/{cluster}/resource/instruction/order/   ResourceOrder
//! ```
//!
//! Nothing here serializes concurrent writers: callers apply to a given context one at a time.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc};

mod contextdb;
mod handle;
mod order;
#[cfg(test)]
mod tests;

pub use self::{
    contextdb::{ContextDb, MemContextDb},
    handle::{AppHandle, ClusterHandle, CompositeAppHandle, Handle, InstructionHandle, ResourceHandle},
    order::{AppOrder, Instruction, ResourceOrder},
};

const ORDER: &str = "order";

/// Identifies the composite app deployment a context was created for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CompositeAppMeta {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub release: String,
    pub deployment_intent_group: String,
    pub namespace: String,
    pub level: String,
}

#[derive(Clone)]
pub struct AppContext {
    db: Arc<dyn ContextDb>,
    id: String,
    root: CompositeAppHandle,
}

// === impl AppContext ===

impl AppContext {
    /// Initializes a context with a fresh random id. The composite app node is written by
    /// [`AppContext::create_composite_app`].
    pub fn create(db: Arc<dyn ContextDb>) -> Self {
        Self::with_id(db, rand::random::<u64>().to_string())
    }

    fn with_id(db: Arc<dyn ContextDb>, id: String) -> Self {
        let root = CompositeAppHandle(format!("/context/{id}/"));
        Self { db, id, root }
    }

    /// Opens an existing context.
    pub async fn load(db: Arc<dyn ContextDb>, id: impl ToString) -> Result<Self> {
        let id = id.to_string();
        if id.is_empty() {
            return Err(Error::validation("Not a valid context id"));
        }
        let ctx = Self::with_id(db, id);
        if ctx.db.get(ctx.root.path()).await?.is_none() {
            return Err(Error::not_found(format!(
                "Error finding the context id: {}",
                ctx.id
            )));
        }
        Ok(ctx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn create_composite_app(&self) -> Result<CompositeAppHandle> {
        self.db
            .put(self.root.path(), &Value::String(self.id.clone()))
            .await?;
        Ok(self.root.clone())
    }

    pub async fn add_composite_app_meta(&self, meta: &CompositeAppMeta) -> Result<()> {
        let value = serde_json::to_value(meta)?;
        self.db.put(&self.meta_path(), &value).await
    }

    pub async fn get_composite_app_meta(&self) -> Result<CompositeAppMeta> {
        let value = self
            .db
            .get(&self.meta_path())
            .await?
            .ok_or_else(|| Error::not_found("Failed to get compositeApp meta"))?;
        serde_json::from_value(value).map_err(|error| {
            Error::downstream("Failed to cast meta interface to compositeApp meta", error)
        })
    }

    pub fn composite_app_handle(&self) -> CompositeAppHandle {
        self.root.clone()
    }

    /// Deletes the whole context.
    pub async fn delete_composite_app(&self) -> Result<()> {
        self.db.delete_all(self.root.path()).await
    }

    fn meta_path(&self) -> String {
        format!("{}meta/", self.root)
    }

    fn app_path(&self, app: &str) -> String {
        format!("{}app/{app}/", self.root)
    }

    fn cluster_path(&self, app: &str, cluster: &str) -> String {
        format!("{}cluster/{cluster}/", self.app_path(app))
    }

    // === apps ===

    pub async fn add_app(&self, handle: &CompositeAppHandle, app: &str) -> Result<AppHandle> {
        let path = format!("{handle}app/{app}/");
        self.db.put(&path, &Value::String(app.to_string())).await?;
        Ok(AppHandle(path))
    }

    pub async fn get_app_handle(&self, app: &str) -> Result<AppHandle> {
        if app.is_empty() {
            return Err(Error::validation("Not a valid run time context app name"));
        }
        let path = self.app_path(app);
        self.lookup(&path, "No handle was found for the given app")
            .await?;
        Ok(AppHandle(path))
    }

    pub async fn delete_app(&self, handle: &AppHandle) -> Result<()> {
        self.db.delete_all(handle.path()).await
    }

    // === clusters ===

    pub async fn add_cluster(&self, handle: &AppHandle, cluster: &str) -> Result<ClusterHandle> {
        let path = format!("{handle}cluster/{cluster}/");
        self.db
            .put(&path, &Value::String(cluster.to_string()))
            .await?;
        Ok(ClusterHandle(path))
    }

    pub async fn get_cluster_handle(&self, app: &str, cluster: &str) -> Result<ClusterHandle> {
        validate_names(app, cluster)?;
        let path = self.cluster_path(app, cluster);
        self.lookup(&path, "No handle was found for the given cluster")
            .await?;
        Ok(ClusterHandle(path))
    }

    /// Lists the clusters an app is deployed to. An app without clusters is an error.
    pub async fn get_cluster_names(&self, app: &str) -> Result<Vec<String>> {
        if app.is_empty() {
            return Err(Error::validation("Not a valid run time context app name"));
        }
        let prefix = format!("{}cluster/", self.app_path(app));
        let clusters = self.children(&prefix).await?;
        if clusters.is_empty() {
            tracing::debug!(%app, "Cluster list is empty");
            return Err(Error::not_found("Cluster list is empty"));
        }
        Ok(clusters)
    }

    pub async fn delete_cluster(&self, handle: &ClusterHandle) -> Result<()> {
        self.db.delete_all(handle.path()).await
    }

    // === resources ===

    pub async fn add_resource(
        &self,
        handle: &ClusterHandle,
        name: &str,
        value: &str,
    ) -> Result<ResourceHandle> {
        let path = format!("{handle}resource/{name}/");
        self.db.put(&path, &Value::String(value.to_string())).await?;
        tracing::debug!(handle = %path, "Added resource");
        Ok(ResourceHandle(path))
    }

    pub async fn get_resource_handle(
        &self,
        app: &str,
        cluster: &str,
        name: &str,
    ) -> Result<ResourceHandle> {
        validate_names(app, cluster)?;
        let path = format!("{}resource/{name}/", self.cluster_path(app, cluster));
        self.lookup(&path, "No handle was found for the given resource")
            .await?;
        Ok(ResourceHandle(path))
    }

    pub async fn get_resource_names(&self, app: &str, cluster: &str) -> Result<Vec<String>> {
        validate_names(app, cluster)?;
        let prefix = format!("{}resource/", self.cluster_path(app, cluster));
        self.children(&prefix).await
    }

    pub async fn update_resource_value(&self, handle: &ResourceHandle, value: &str) -> Result<()> {
        self.db
            .put(handle.path(), &Value::String(value.to_string()))
            .await
    }

    /// Returns a resource's manifest.
    pub async fn get_resource_value(&self, handle: &ResourceHandle) -> Result<String> {
        match self.get_value(handle).await? {
            Value::String(value) => Ok(value),
            other => Err(Error::validation(format!(
                "resource {handle} holds a non-string value: {other}"
            ))),
        }
    }

    // === instructions ===

    /// Writes `instruction` beneath `handle`, replacing any previous instruction of that type.
    pub async fn add_instruction<I: Instruction + Sync>(
        &self,
        handle: &I::Parent,
        instruction: &I,
    ) -> Result<InstructionHandle>
    where
        I::Parent: Sync,
    {
        let path = format!("{}{}/instruction/{ORDER}/", handle.path(), I::LEVEL);
        let encoded = serde_json::to_string(instruction)
            .map_err(|error| Error::downstream("Error Marshalling instruction", error))?;
        self.db.put(&path, &Value::String(encoded)).await?;
        tracing::debug!(handle = %path, "Added instruction");
        Ok(InstructionHandle(path))
    }

    pub async fn get_app_instruction(&self) -> Result<AppOrder> {
        let path = format!("{}app/instruction/{ORDER}/", self.root);
        self.get_instruction(&path).await
    }

    pub async fn get_resource_instruction(&self, app: &str, cluster: &str) -> Result<ResourceOrder> {
        validate_names(app, cluster)?;
        let path = format!(
            "{}resource/instruction/{ORDER}/",
            self.cluster_path(app, cluster)
        );
        self.get_instruction(&path).await
    }

    async fn get_instruction<I: Instruction>(&self, path: &str) -> Result<I> {
        let value = self
            .db
            .get(path)
            .await?
            .ok_or_else(|| Error::not_found(format!("No instruction was found at {path}")))?;
        let Value::String(encoded) = value else {
            return Err(Error::validation(format!(
                "instruction at {path} is not a JSON string"
            )));
        };
        serde_json::from_str(&encoded)
            .map_err(|error| Error::downstream("Error Unmarshalling instruction", error))
    }

    // === values ===

    pub async fn get_value<H: Handle + Sync>(&self, handle: &H) -> Result<Value> {
        self.db
            .get(handle.path())
            .await?
            .ok_or_else(|| Error::not_found(format!("No value was found for {}", handle.path())))
    }

    async fn lookup(&self, path: &str, missing: &str) -> Result<()> {
        match self.db.get(path).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(missing)),
        }
    }

    /// Lists the names of the direct children of `prefix`, skipping instruction documents.
    async fn children(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self.db.get_all_keys(prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(prefix))
            .filter_map(|rest| match rest.split('/').collect::<Vec<_>>()[..] {
                [name, ""] if !name.is_empty() => Some(name.to_string()),
                _ => None,
            })
            .collect())
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext").field("id", &self.id).finish()
    }
}

fn validate_names(app: &str, cluster: &str) -> Result<()> {
    if app.is_empty() {
        return Err(Error::validation("Not a valid run time context app name"));
    }
    if cluster.is_empty() {
        return Err(Error::validation(
            "Not a valid run time context cluster name",
        ));
    }
    Ok(())
}
