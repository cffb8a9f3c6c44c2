use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SfcIntent {
    pub metadata: Metadata,
    pub spec: SfcIntentSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcIntentSpec {
    /// Only `Routing` chains are supported by the chaining CNI.
    pub chain_type: String,
    pub namespace: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SfcIntentKey<'a> {
    #[serde(flatten)]
    pub(super) dig: &'a Dig,
    #[serde(rename = "sfcIntent")]
    pub(super) name: &'a str,
}

#[async_trait::async_trait]
pub trait SfcIntentManager: Send + Sync {
    async fn create(&self, intent: SfcIntent, dig: &Dig, fail_if_exists: bool)
        -> Result<SfcIntent>;

    async fn get(&self, name: &str, dig: &Dig) -> Result<SfcIntent>;

    async fn get_all(&self, dig: &Dig) -> Result<Vec<SfcIntent>>;

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()>;
}

pub struct SfcIntentClient(Crud<SfcIntent>);

// === impl SfcIntentClient ===

impl SfcIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(db, "SFC Intent already exists", "SFC Intent not found"))
    }
}

#[async_trait::async_trait]
impl SfcIntentManager for SfcIntentClient {
    async fn create(
        &self,
        intent: SfcIntent,
        dig: &Dig,
        fail_if_exists: bool,
    ) -> Result<SfcIntent> {
        let key = SfcIntentKey {
            dig,
            name: &intent.metadata.name,
        };
        self.0.create(&key, &intent, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig) -> Result<SfcIntent> {
        self.0.get(&SfcIntentKey { dig, name }).await
    }

    async fn get_all(&self, dig: &Dig) -> Result<Vec<SfcIntent>> {
        self.0.get_all(&SfcIntentKey { dig, name: "" }).await
    }

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()> {
        self.0.delete(&SfcIntentKey { dig, name }).await
    }
}
