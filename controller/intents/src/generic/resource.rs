use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};

const CONTENT_TAG: &str = "resourcecontent";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resource {
    pub metadata: Metadata,
    pub spec: ResourceSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(rename = "app")]
    pub app_name: String,
    /// `"true"` when the object is created rather than patched in place.
    pub new_object: String,
    #[serde(rename = "resourceGVK", default)]
    pub resource_gvk: ResourceGvk,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGvk {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// The base64-encoded template of a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceContent {
    #[serde(rename = "filecontent")]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResourceKey<'a> {
    #[serde(rename = "genericResource")]
    name: &'a str,
    #[serde(rename = "genericK8sIntent")]
    intent: &'a str,
    #[serde(flatten)]
    dig: &'a Dig,
}

// === impl ResourceSpec ===

impl ResourceSpec {
    pub fn is_new_object(&self) -> bool {
        self.new_object.eq_ignore_ascii_case("true")
    }
}

#[async_trait::async_trait]
pub trait ResourceManager: Send + Sync {
    async fn create(
        &self,
        resource: Resource,
        content: ResourceContent,
        dig: &Dig,
        intent: &str,
        fail_if_exists: bool,
    ) -> Result<(Resource, bool)>;

    async fn get(&self, name: &str, dig: &Dig, intent: &str) -> Result<Resource>;

    async fn get_all(&self, dig: &Dig, intent: &str) -> Result<Vec<Resource>>;

    /// Returns the resource's template, which is empty if none was uploaded.
    async fn get_content(&self, name: &str, dig: &Dig, intent: &str) -> Result<ResourceContent>;

    async fn delete(&self, name: &str, dig: &Dig, intent: &str) -> Result<()>;
}

pub struct ResourceClient(Crud<Resource>);

// === impl ResourceClient ===

impl ResourceClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(db, "Resource already exists", "Resource not found"))
    }
}

#[async_trait::async_trait]
impl ResourceManager for ResourceClient {
    async fn create(
        &self,
        resource: Resource,
        content: ResourceContent,
        dig: &Dig,
        intent: &str,
        fail_if_exists: bool,
    ) -> Result<(Resource, bool)> {
        let key = ResourceKey {
            name: &resource.metadata.name,
            intent,
            dig,
        };
        let existed = self.0.create(&key, &resource, fail_if_exists).await?;
        if !content.content.is_empty() {
            self.0.put_content(&key, CONTENT_TAG, &content).await?;
        }
        Ok((resource, existed))
    }

    async fn get(&self, name: &str, dig: &Dig, intent: &str) -> Result<Resource> {
        self.0.get(&ResourceKey { name, intent, dig }).await
    }

    async fn get_all(&self, dig: &Dig, intent: &str) -> Result<Vec<Resource>> {
        let key = ResourceKey {
            name: "",
            intent,
            dig,
        };
        self.0.get_all(&key).await
    }

    async fn get_content(&self, name: &str, dig: &Dig, intent: &str) -> Result<ResourceContent> {
        let key = ResourceKey { name, intent, dig };
        Ok(self
            .0
            .get_content(&key, CONTENT_TAG)
            .await?
            .unwrap_or_default())
    }

    async fn delete(&self, name: &str, dig: &Dig, intent: &str) -> Result<()> {
        self.0.delete(&ResourceKey { name, intent, dig }).await
    }
}
