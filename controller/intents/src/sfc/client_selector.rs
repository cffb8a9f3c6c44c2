use super::{intent::SfcIntentKey, ByEndKey, ChainEnd, ChildKey, EndKey, SfcIntent};
use crate::{db::Crud, Db, Dig, Metadata, Result};
use orchestrator_k8s_api::LabelSelector;
use serde::{Deserialize, Serialize};

const FIELD: &str = "sfcClientSelectorIntent";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SfcClientSelectorIntent {
    pub metadata: Metadata,
    pub spec: SfcClientSelectorIntentSpec,
}

/// Selects the client pods attached at one end of the chain.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcClientSelectorIntentSpec {
    pub chain_end: ChainEnd,
    #[serde(default)]
    pub pod_selector: LabelSelector,
    #[serde(default)]
    pub namespace_selector: LabelSelector,
}

#[async_trait::async_trait]
pub trait SfcClientSelectorIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: SfcClientSelectorIntent,
        dig: &Dig,
        sfc: &str,
        fail_if_exists: bool,
    ) -> Result<SfcClientSelectorIntent>;

    async fn get(&self, name: &str, dig: &Dig, sfc: &str) -> Result<SfcClientSelectorIntent>;

    /// Lists the chain's client selectors. Fails if the SFC intent does not exist.
    async fn get_all(&self, dig: &Dig, sfc: &str) -> Result<Vec<SfcClientSelectorIntent>>;

    /// Lists the chain's client selectors at `end`. Fails if the SFC intent does not exist.
    async fn get_by_end(
        &self,
        dig: &Dig,
        sfc: &str,
        end: ChainEnd,
    ) -> Result<Vec<SfcClientSelectorIntent>>;

    async fn delete(&self, name: &str, dig: &Dig, sfc: &str) -> Result<()>;
}

pub struct SfcClientSelectorIntentClient {
    selectors: Crud<SfcClientSelectorIntent>,
    intents: Crud<SfcIntent>,
}

// === impl SfcClientSelectorIntentClient ===

impl SfcClientSelectorIntentClient {
    pub fn new(db: Db) -> Self {
        Self {
            selectors: Crud::new(
                db.clone(),
                "SFC Client Selector Intent already exists",
                "SFC Client Selector Intent not found",
            ),
            intents: Crud::new(db, "SFC Intent already exists", "SFC Intent not found"),
        }
    }
}

#[async_trait::async_trait]
impl SfcClientSelectorIntentManager for SfcClientSelectorIntentClient {
    async fn create(
        &self,
        intent: SfcClientSelectorIntent,
        dig: &Dig,
        sfc: &str,
        fail_if_exists: bool,
    ) -> Result<SfcClientSelectorIntent> {
        let key = ChildKey::new(dig, sfc, FIELD, &intent.metadata.name);
        let end = EndKey {
            end: intent.spec.chain_end,
        };
        self.selectors
            .create_indexed(&key, &end, &intent, fail_if_exists)
            .await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig, sfc: &str) -> Result<SfcClientSelectorIntent> {
        self.selectors.get(&ChildKey::new(dig, sfc, FIELD, name)).await
    }

    async fn get_all(&self, dig: &Dig, sfc: &str) -> Result<Vec<SfcClientSelectorIntent>> {
        self.intents.get(&SfcIntentKey { dig, name: sfc }).await?;
        self.selectors
            .get_all(&ChildKey::new(dig, sfc, FIELD, ""))
            .await
    }

    async fn get_by_end(
        &self,
        dig: &Dig,
        sfc: &str,
        end: ChainEnd,
    ) -> Result<Vec<SfcClientSelectorIntent>> {
        self.intents.get(&SfcIntentKey { dig, name: sfc }).await?;
        self.selectors
            .get_all(&ByEndKey::new(dig, sfc, FIELD, end))
            .await
    }

    async fn delete(&self, name: &str, dig: &Dig, sfc: &str) -> Result<()> {
        self.selectors
            .delete(&ChildKey::new(dig, sfc, FIELD, name))
            .await
    }
}
