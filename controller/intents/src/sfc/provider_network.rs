use super::{intent::SfcIntentKey, ByEndKey, ChainEnd, ChildKey, EndKey, SfcIntent};
use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{Deserialize, Serialize};

const FIELD: &str = "sfcProviderNetworkIntent";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SfcProviderNetworkIntent {
    pub metadata: Metadata,
    pub spec: SfcProviderNetworkIntentSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcProviderNetworkIntentSpec {
    pub chain_end: ChainEnd,
    pub network_name: String,
    #[serde(default)]
    pub gateway_ip: String,
    #[serde(default)]
    pub subnet: String,
}

#[async_trait::async_trait]
pub trait SfcProviderNetworkIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: SfcProviderNetworkIntent,
        dig: &Dig,
        sfc: &str,
        fail_if_exists: bool,
    ) -> Result<SfcProviderNetworkIntent>;

    async fn get(&self, name: &str, dig: &Dig, sfc: &str) -> Result<SfcProviderNetworkIntent>;

    /// Lists the chain's provider networks. Fails if the SFC intent does not exist.
    async fn get_all(&self, dig: &Dig, sfc: &str) -> Result<Vec<SfcProviderNetworkIntent>>;

    /// Lists the chain's provider networks at `end`. Fails if the SFC intent does not exist.
    async fn get_by_end(
        &self,
        dig: &Dig,
        sfc: &str,
        end: ChainEnd,
    ) -> Result<Vec<SfcProviderNetworkIntent>>;

    async fn delete(&self, name: &str, dig: &Dig, sfc: &str) -> Result<()>;
}

pub struct SfcProviderNetworkIntentClient {
    networks: Crud<SfcProviderNetworkIntent>,
    intents: Crud<SfcIntent>,
}

// === impl SfcProviderNetworkIntentClient ===

impl SfcProviderNetworkIntentClient {
    pub fn new(db: Db) -> Self {
        Self {
            networks: Crud::new(
                db.clone(),
                "SFC Provider Network Intent already exists",
                "SFC Provider Network Intent not found",
            ),
            intents: Crud::new(db, "SFC Intent already exists", "SFC Intent not found"),
        }
    }
}

#[async_trait::async_trait]
impl SfcProviderNetworkIntentManager for SfcProviderNetworkIntentClient {
    async fn create(
        &self,
        intent: SfcProviderNetworkIntent,
        dig: &Dig,
        sfc: &str,
        fail_if_exists: bool,
    ) -> Result<SfcProviderNetworkIntent> {
        let key = ChildKey::new(dig, sfc, FIELD, &intent.metadata.name);
        let end = EndKey {
            end: intent.spec.chain_end,
        };
        self.networks
            .create_indexed(&key, &end, &intent, fail_if_exists)
            .await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig, sfc: &str) -> Result<SfcProviderNetworkIntent> {
        self.networks.get(&ChildKey::new(dig, sfc, FIELD, name)).await
    }

    async fn get_all(&self, dig: &Dig, sfc: &str) -> Result<Vec<SfcProviderNetworkIntent>> {
        self.intents.get(&SfcIntentKey { dig, name: sfc }).await?;
        self.networks
            .get_all(&ChildKey::new(dig, sfc, FIELD, ""))
            .await
    }

    async fn get_by_end(
        &self,
        dig: &Dig,
        sfc: &str,
        end: ChainEnd,
    ) -> Result<Vec<SfcProviderNetworkIntent>> {
        self.intents.get(&SfcIntentKey { dig, name: sfc }).await?;
        self.networks
            .get_all(&ByEndKey::new(dig, sfc, FIELD, end))
            .await
    }

    async fn delete(&self, name: &str, dig: &Dig, sfc: &str) -> Result<()> {
        self.networks
            .delete(&ChildKey::new(dig, sfc, FIELD, name))
            .await
    }
}
