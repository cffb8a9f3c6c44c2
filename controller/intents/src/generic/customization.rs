use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CONTENT_TAG: &str = "customizationcontent";

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Customization {
    pub metadata: Metadata,
    pub spec: CustomizationSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationSpec {
    /// `"true"` when `cluster_info` restricts the clusters the resource applies to.
    #[serde(default)]
    pub cluster_specific: String,
    #[serde(default)]
    pub cluster_info: ClusterInfo,
    /// `json` or `merge`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub patch_type: String,
    /// RFC 6902 operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patch_json: Vec<Map<String, Value>>,
    #[serde(default)]
    pub config_map_options: KindOptions,
    #[serde(default)]
    pub secret_options: KindOptions,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterInfo {
    /// `label` or `name`.
    pub scope: String,
    pub cluster_provider: String,
    #[serde(rename = "cluster")]
    pub cluster_name: String,
    pub cluster_label: String,
    /// `allow` or `deny`.
    pub mode: String,
}

/// ConfigMap or Secret data options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_key_options: Vec<KeyOptions>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_name: String,
    /// `"true"` when the file holds a merge patch rather than data.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub merge_patch: String,
}

/// Customization files, base64-encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomizationContent {
    #[serde(rename = "Content", default)]
    pub content: Vec<Content>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Content {
    pub file_name: String,
    pub content: String,
    pub key_name: String,
}

#[derive(Debug, Serialize)]
struct CustomizationKey<'a> {
    customization: &'a str,
    #[serde(rename = "genericK8sIntent")]
    intent: &'a str,
    #[serde(rename = "genericResource")]
    resource: &'a str,
    #[serde(flatten)]
    dig: &'a Dig,
}

// === impl CustomizationSpec ===

impl CustomizationSpec {
    pub fn is_cluster_specific(&self) -> bool {
        self.cluster_specific.eq_ignore_ascii_case("true")
    }
}

// === impl KeyOptions ===

impl KeyOptions {
    pub fn is_merge_patch(&self) -> bool {
        self.merge_patch.eq_ignore_ascii_case("true")
    }
}

// === impl KindOptions ===

impl KindOptions {
    /// Returns true if the file named `file_name` holds a merge patch.
    pub fn is_merge_patch(&self, file_name: &str) -> bool {
        self.data_key_options
            .iter()
            .any(|k| k.file_name == file_name && k.is_merge_patch())
    }

    /// Returns the data key for the file named `file_name`.
    pub fn key_name<'a>(&'a self, content: &'a Content) -> &'a str {
        if !content.key_name.is_empty() {
            return &content.key_name;
        }
        self.data_key_options
            .iter()
            .find(|k| k.file_name == content.file_name && !k.key_name.is_empty())
            .map_or(&content.file_name, |k| &k.key_name)
    }
}

#[async_trait::async_trait]
pub trait CustomizationManager: Send + Sync {
    async fn create(
        &self,
        customization: Customization,
        content: CustomizationContent,
        dig: &Dig,
        intent: &str,
        resource: &str,
        fail_if_exists: bool,
    ) -> Result<(Customization, bool)>;

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        intent: &str,
        resource: &str,
    ) -> Result<Customization>;

    async fn get_all(&self, dig: &Dig, intent: &str, resource: &str)
        -> Result<Vec<Customization>>;

    /// Returns the customization's files, which are empty if none were uploaded.
    async fn get_content(
        &self,
        name: &str,
        dig: &Dig,
        intent: &str,
        resource: &str,
    ) -> Result<CustomizationContent>;

    async fn delete(&self, name: &str, dig: &Dig, intent: &str, resource: &str) -> Result<()>;
}

pub struct CustomizationClient(Crud<Customization>);

// === impl CustomizationClient ===

impl CustomizationClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(
            db,
            "Customization already exists",
            "Customization not found",
        ))
    }
}

#[async_trait::async_trait]
impl CustomizationManager for CustomizationClient {
    async fn create(
        &self,
        customization: Customization,
        content: CustomizationContent,
        dig: &Dig,
        intent: &str,
        resource: &str,
        fail_if_exists: bool,
    ) -> Result<(Customization, bool)> {
        let key = CustomizationKey {
            customization: &customization.metadata.name,
            intent,
            resource,
            dig,
        };
        let existed = self.0.create(&key, &customization, fail_if_exists).await?;
        if !content.content.is_empty() {
            self.0.put_content(&key, CONTENT_TAG, &content).await?;
        }
        Ok((customization, existed))
    }

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        intent: &str,
        resource: &str,
    ) -> Result<Customization> {
        let key = CustomizationKey {
            customization: name,
            intent,
            resource,
            dig,
        };
        self.0.get(&key).await
    }

    async fn get_all(
        &self,
        dig: &Dig,
        intent: &str,
        resource: &str,
    ) -> Result<Vec<Customization>> {
        let key = CustomizationKey {
            customization: "",
            intent,
            resource,
            dig,
        };
        self.0.get_all(&key).await
    }

    async fn get_content(
        &self,
        name: &str,
        dig: &Dig,
        intent: &str,
        resource: &str,
    ) -> Result<CustomizationContent> {
        let key = CustomizationKey {
            customization: name,
            intent,
            resource,
            dig,
        };
        Ok(self
            .0
            .get_content(&key, CONTENT_TAG)
            .await?
            .unwrap_or_default())
    }

    async fn delete(&self, name: &str, dig: &Dig, intent: &str, resource: &str) -> Result<()> {
        let key = CustomizationKey {
            customization: name,
            intent,
            resource,
            dig,
        };
        self.0.delete(&key).await
    }
}
