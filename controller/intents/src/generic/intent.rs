use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenericK8sIntent {
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub(super) struct GenericK8sIntentKey<'a> {
    #[serde(rename = "genericK8sIntent")]
    pub(super) name: &'a str,
    #[serde(flatten)]
    pub(super) dig: &'a Dig,
}

#[async_trait::async_trait]
pub trait GenericK8sIntentManager: Send + Sync {
    /// Stores `intent`, returning it and whether it replaced an existing intent.
    async fn create(
        &self,
        intent: GenericK8sIntent,
        dig: &Dig,
        fail_if_exists: bool,
    ) -> Result<(GenericK8sIntent, bool)>;

    async fn get(&self, name: &str, dig: &Dig) -> Result<GenericK8sIntent>;

    async fn get_all(&self, dig: &Dig) -> Result<Vec<GenericK8sIntent>>;

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()>;
}

pub struct GenericK8sIntentClient(Crud<GenericK8sIntent>);

// === impl GenericK8sIntentClient ===

impl GenericK8sIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Crud::new(
            db,
            "GenericK8sIntent already exists",
            "GenericK8sIntent not found",
        ))
    }
}

#[async_trait::async_trait]
impl GenericK8sIntentManager for GenericK8sIntentClient {
    async fn create(
        &self,
        intent: GenericK8sIntent,
        dig: &Dig,
        fail_if_exists: bool,
    ) -> Result<(GenericK8sIntent, bool)> {
        let key = GenericK8sIntentKey {
            name: &intent.metadata.name,
            dig,
        };
        let existed = self.0.create(&key, &intent, fail_if_exists).await?;
        Ok((intent, existed))
    }

    async fn get(&self, name: &str, dig: &Dig) -> Result<GenericK8sIntent> {
        self.0.get(&GenericK8sIntentKey { name, dig }).await
    }

    async fn get_all(&self, dig: &Dig) -> Result<Vec<GenericK8sIntent>> {
        self.0.get_all(&GenericK8sIntentKey { name: "", dig }).await
    }

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()> {
        self.0.delete(&GenericK8sIntentKey { name, dig }).await
    }
}
