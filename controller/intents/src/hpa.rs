//! HPA placement intents.
//!
//! An [`HpaIntent`] targets an app. Its [`HpaConsumer`]s name the workloads that scale, and each
//! consumer's [`HpaResource`]s state what a cluster's nodes must offer for the workload to be placed
//! there.

mod cluster_info;

pub use self::cluster_info::{ClusterInfoClient, ClusterNodes, NodeAllocatable, NodeLabels};

use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HpaIntent {
    pub metadata: Metadata,
    pub spec: HpaIntentSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HpaIntentSpec {
    #[serde(rename = "app")]
    pub app_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HpaConsumer {
    pub metadata: Metadata,
    pub spec: HpaConsumerSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HpaConsumerSpec {
    #[serde(default = "HpaConsumerSpec::default_replicas")]
    pub replicas: i64,
    /// The deployment that scales.
    pub name: String,
    #[serde(default, rename = "container")]
    pub container_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HpaResource {
    pub metadata: Metadata,
    pub spec: HpaResourceSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HpaResourceSpec {
    #[serde(default)]
    pub allocatable: bool,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub weight: i32,
    pub resource: ResourceRequirement,
}

/// A node resource with requests and limits, such as `cpu`, or a node label.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResourceRequirement {
    Allocatable {
        name: String,
        requests: i64,
        #[serde(default)]
        limits: i64,
    },
    NonAllocatable {
        key: String,
        value: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HpaKey<'a> {
    #[serde(flatten)]
    dig: &'a Dig,
    hpa_intent: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hpa_consumer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hpa_resource: Option<&'a str>,
}

/// Addresses a level of the hierarchy by its parents' names followed by its own.
fn key<'a>(dig: &'a Dig, path: &[&'a str]) -> HpaKey<'a> {
    HpaKey {
        dig,
        hpa_intent: path.first().copied().unwrap_or_default(),
        hpa_consumer: path.get(1).copied(),
        hpa_resource: path.get(2).copied(),
    }
}

#[async_trait::async_trait]
pub trait HpaIntentManager: Send + Sync {
    async fn create(&self, intent: HpaIntent, dig: &Dig, fail_if_exists: bool)
        -> Result<HpaIntent>;

    async fn get(&self, name: &str, dig: &Dig) -> Result<HpaIntent>;

    async fn get_all(&self, dig: &Dig) -> Result<Vec<HpaIntent>>;

    /// Lists the intents targeting `app`.
    async fn get_all_by_app(&self, app: &str, dig: &Dig) -> Result<Vec<HpaIntent>>;

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()>;
}

#[async_trait::async_trait]
pub trait HpaConsumerManager: Send + Sync {
    async fn create(
        &self,
        consumer: HpaConsumer,
        dig: &Dig,
        intent: &str,
        fail_if_exists: bool,
    ) -> Result<HpaConsumer>;

    async fn get(&self, name: &str, dig: &Dig, intent: &str) -> Result<HpaConsumer>;

    async fn get_all(&self, dig: &Dig, intent: &str) -> Result<Vec<HpaConsumer>>;

    async fn delete(&self, name: &str, dig: &Dig, intent: &str) -> Result<()>;
}

#[async_trait::async_trait]
pub trait HpaResourceManager: Send + Sync {
    async fn create(
        &self,
        resource: HpaResource,
        dig: &Dig,
        intent: &str,
        consumer: &str,
        fail_if_exists: bool,
    ) -> Result<HpaResource>;

    async fn get(&self, name: &str, dig: &Dig, intent: &str, consumer: &str)
        -> Result<HpaResource>;

    async fn get_all(&self, dig: &Dig, intent: &str, consumer: &str) -> Result<Vec<HpaResource>>;

    async fn delete(&self, name: &str, dig: &Dig, intent: &str, consumer: &str) -> Result<()>;
}

pub struct HpaIntentClient(Crud<HpaIntent>);

pub struct HpaConsumerClient(Crud<HpaConsumer>);

pub struct HpaResourceClient(Crud<HpaResource>);

// === impl HpaConsumerSpec ===

impl HpaConsumerSpec {
    fn default_replicas() -> i64 {
        1
    }
}

impl Default for HpaConsumerSpec {
    fn default() -> Self {
        Self {
            replicas: Self::default_replicas(),
            name: String::new(),
            container_name: String::new(),
        }
    }
}

// === impl HpaIntentClient ===

impl HpaIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(db, "Intent already exists", "Intent not found"))
    }
}

#[async_trait::async_trait]
impl HpaIntentManager for HpaIntentClient {
    async fn create(
        &self,
        intent: HpaIntent,
        dig: &Dig,
        fail_if_exists: bool,
    ) -> Result<HpaIntent> {
        let key = key(dig, &[&intent.metadata.name]);
        self.0.create(&key, &intent, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig) -> Result<HpaIntent> {
        self.0.get(&key(dig, &[name])).await
    }

    async fn get_all(&self, dig: &Dig) -> Result<Vec<HpaIntent>> {
        self.0.get_all(&key(dig, &[""])).await
    }

    async fn get_all_by_app(&self, app: &str, dig: &Dig) -> Result<Vec<HpaIntent>> {
        let mut intents = self.get_all(dig).await?;
        intents.retain(|i| i.spec.app_name == app);
        Ok(intents)
    }

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()> {
        self.0.delete(&key(dig, &[name])).await
    }
}

// === impl HpaConsumerClient ===

impl HpaConsumerClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(db, "Consumer already exists", "Consumer not found"))
    }
}

#[async_trait::async_trait]
impl HpaConsumerManager for HpaConsumerClient {
    async fn create(
        &self,
        consumer: HpaConsumer,
        dig: &Dig,
        intent: &str,
        fail_if_exists: bool,
    ) -> Result<HpaConsumer> {
        let key = key(dig, &[intent, &consumer.metadata.name]);
        self.0.create(&key, &consumer, fail_if_exists).await?;
        Ok(consumer)
    }

    async fn get(&self, name: &str, dig: &Dig, intent: &str) -> Result<HpaConsumer> {
        let key = key(dig, &[intent, name]);
        self.0.get(&key).await
    }

    async fn get_all(&self, dig: &Dig, intent: &str) -> Result<Vec<HpaConsumer>> {
        let key = key(dig, &[intent, ""]);
        self.0.get_all(&key).await
    }

    async fn delete(&self, name: &str, dig: &Dig, intent: &str) -> Result<()> {
        let key = key(dig, &[intent, name]);
        self.0.delete(&key).await
    }
}

// === impl HpaResourceClient ===

impl HpaResourceClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(db, "Resource already exists", "Resource not found"))
    }
}

#[async_trait::async_trait]
impl HpaResourceManager for HpaResourceClient {
    async fn create(
        &self,
        resource: HpaResource,
        dig: &Dig,
        intent: &str,
        consumer: &str,
        fail_if_exists: bool,
    ) -> Result<HpaResource> {
        let key = key(dig, &[intent, consumer, &resource.metadata.name]);
        self.0.create(&key, &resource, fail_if_exists).await?;
        Ok(resource)
    }

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        intent: &str,
        consumer: &str,
    ) -> Result<HpaResource> {
        let key = key(dig, &[intent, consumer, name]);
        self.0.get(&key).await
    }

    async fn get_all(&self, dig: &Dig, intent: &str, consumer: &str) -> Result<Vec<HpaResource>> {
        let key = key(dig, &[intent, consumer, ""]);
        self.0.get_all(&key).await
    }

    async fn delete(&self, name: &str, dig: &Dig, intent: &str, consumer: &str) -> Result<()> {
        let key = key(dig, &[intent, consumer, name]);
        self.0.delete(&key).await
    }
}
