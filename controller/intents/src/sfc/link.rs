use super::{intent::SfcIntentKey, ChildKey, SfcIntent};
use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};

const FIELD: &str = "sfcLinkIntent";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SfcLinkIntent {
    pub metadata: Metadata,
    pub spec: SfcLinkIntentSpec,
}

/// Connects `left_net` to `right_net` through the pods of `app_name` labelled `link_label`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcLinkIntentSpec {
    pub left_net: String,
    pub right_net: String,
    /// A `key=value` pod label.
    pub link_label: String,
    #[serde(rename = "app")]
    pub app_name: String,
    pub workload_resource: String,
    pub resource_type: String,
}

#[async_trait::async_trait]
pub trait SfcLinkIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: SfcLinkIntent,
        dig: &Dig,
        sfc: &str,
        fail_if_exists: bool,
    ) -> Result<SfcLinkIntent>;

    async fn get(&self, name: &str, dig: &Dig, sfc: &str) -> Result<SfcLinkIntent>;

    /// Lists the chain's links. Fails if the SFC intent does not exist.
    async fn get_all(&self, dig: &Dig, sfc: &str) -> Result<Vec<SfcLinkIntent>>;

    async fn delete(&self, name: &str, dig: &Dig, sfc: &str) -> Result<()>;
}

pub struct SfcLinkIntentClient {
    links: Crud<SfcLinkIntent>,
    intents: Crud<SfcIntent>,
}

// === impl SfcLinkIntentClient ===

impl SfcLinkIntentClient {
    pub fn new(db: Db) -> Self {
        Self {
            links: Crud::new(
                db.clone(),
                "SFC Link Intent already exists",
                "SFC Link Intent not found",
            ),
            intents: Crud::new(db, "SFC Intent already exists", "SFC Intent not found"),
        }
    }
}

#[async_trait::async_trait]
impl SfcLinkIntentManager for SfcLinkIntentClient {
    async fn create(
        &self,
        intent: SfcLinkIntent,
        dig: &Dig,
        sfc: &str,
        fail_if_exists: bool,
    ) -> Result<SfcLinkIntent> {
        let key = ChildKey::new(dig, sfc, FIELD, &intent.metadata.name);
        self.links.create(&key, &intent, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig, sfc: &str) -> Result<SfcLinkIntent> {
        self.links.get(&ChildKey::new(dig, sfc, FIELD, name)).await
    }

    async fn get_all(&self, dig: &Dig, sfc: &str) -> Result<Vec<SfcLinkIntent>> {
        self.intents.get(&SfcIntentKey { dig, name: sfc }).await?;
        self.links.get_all(&ChildKey::new(dig, sfc, FIELD, "")).await
    }

    async fn delete(&self, name: &str, dig: &Dig, sfc: &str) -> Result<()> {
        self.links.delete(&ChildKey::new(dig, sfc, FIELD, name)).await
    }
}
