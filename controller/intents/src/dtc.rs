//! Distributed traffic controller intents.
//!
//! Intents nest four levels deep under a deployment intent group:
//!
//! ```text
//! traffic group -> inbound server -> inbound clients -> inbound clients access
//! ```

use crate::{db::Crud, Db, Dig, Metadata, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrafficGroupIntent {
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InboundServerIntent {
    pub metadata: Metadata,
    pub spec: InboundServerIntentSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundServerIntentSpec {
    #[serde(rename = "app")]
    pub app_name: String,
    pub app_label: String,
    pub service_name: String,
    pub external_name: String,
    pub port: u16,
    pub protocol: String,
    pub external_support: bool,
    pub service_mesh: String,
    pub management: ServiceMeshManagement,
    pub external: ExternalInfo,
    #[serde(rename = "edgeCNF")]
    pub edge_cnf: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceMeshManagement {
    pub sidecar_proxy: String,
    pub tls_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalInfo {
    pub external_certs: ExternalCertInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalCertInfo {
    pub service_certificate: String,
    pub service_private_key: String,
    pub ca_certificate: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InboundClientsIntent {
    pub metadata: Metadata,
    pub spec: InboundClientsIntentSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundClientsIntentSpec {
    #[serde(rename = "app")]
    pub app_name: String,
    pub app_label: String,
    pub service_name: String,
    pub namespaces: Vec<String>,
    #[serde(rename = "cidrs")]
    pub ip_range: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InboundClientsAccessIntent {
    pub metadata: Metadata,
    pub spec: InboundClientsAccessIntentSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InboundClientsAccessIntentSpec {
    pub action: String,
    pub url: Vec<String>,
    pub access: Vec<String>,
}

/// Keys every level of the hierarchy. Levels below the addressed one are omitted, so each level
/// has its own key shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DtcKey<'a> {
    #[serde(flatten)]
    dig: &'a Dig,
    traffic_group_intent: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    inbound_server_intent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inbound_clients_intent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inbound_clients_access_intent: Option<&'a str>,
}

/// One level of the hierarchy: its parents' names are followed by the intent's own name.
struct Level<V>(Crud<V>);

impl<V> Level<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn key<'a>(dig: &'a Dig, path: &[&'a str]) -> DtcKey<'a> {
        DtcKey {
            dig,
            traffic_group_intent: path.first().copied().unwrap_or_default(),
            inbound_server_intent: path.get(1).copied(),
            inbound_clients_intent: path.get(2).copied(),
            inbound_clients_access_intent: path.get(3).copied(),
        }
    }

    async fn create(&self, value: &V, dig: &Dig, path: &[&str], fail: bool) -> Result<()> {
        self.0
            .create(&Self::key(dig, path), value, fail)
            .await
            .map(drop)
    }

    async fn get(&self, dig: &Dig, path: &[&str]) -> Result<V> {
        self.0.get(&Self::key(dig, path)).await
    }

    /// Lists the level's intents; the last element of `path` must be empty.
    async fn get_all(&self, dig: &Dig, path: &[&str]) -> Result<Vec<V>> {
        self.0.get_all(&Self::key(dig, path)).await
    }

    async fn delete(&self, dig: &Dig, path: &[&str]) -> Result<()> {
        self.0.delete(&Self::key(dig, path)).await
    }
}

#[async_trait::async_trait]
pub trait TrafficGroupIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: TrafficGroupIntent,
        dig: &Dig,
        fail_if_exists: bool,
    ) -> Result<TrafficGroupIntent>;

    async fn get(&self, name: &str, dig: &Dig) -> Result<TrafficGroupIntent>;

    async fn get_all(&self, dig: &Dig) -> Result<Vec<TrafficGroupIntent>>;

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()>;
}

#[async_trait::async_trait]
pub trait InboundServerIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: InboundServerIntent,
        dig: &Dig,
        traffic_group: &str,
        fail_if_exists: bool,
    ) -> Result<InboundServerIntent>;

    async fn get(&self, name: &str, dig: &Dig, traffic_group: &str) -> Result<InboundServerIntent>;

    async fn get_all(&self, dig: &Dig, traffic_group: &str) -> Result<Vec<InboundServerIntent>>;

    async fn delete(&self, name: &str, dig: &Dig, traffic_group: &str) -> Result<()>;
}

#[async_trait::async_trait]
pub trait InboundClientsIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: InboundClientsIntent,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        fail_if_exists: bool,
    ) -> Result<InboundClientsIntent>;

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
    ) -> Result<InboundClientsIntent>;

    async fn get_all(
        &self,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
    ) -> Result<Vec<InboundClientsIntent>>;

    async fn delete(&self, name: &str, dig: &Dig, traffic_group: &str, server: &str)
        -> Result<()>;
}

#[async_trait::async_trait]
pub trait InboundClientsAccessIntentManager: Send + Sync {
    async fn create(
        &self,
        intent: InboundClientsAccessIntent,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
        fail_if_exists: bool,
    ) -> Result<InboundClientsAccessIntent>;

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
    ) -> Result<InboundClientsAccessIntent>;

    async fn get_all(
        &self,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
    ) -> Result<Vec<InboundClientsAccessIntent>>;

    async fn delete(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
    ) -> Result<()>;
}

pub struct TrafficGroupIntentClient(Level<TrafficGroupIntent>);

pub struct InboundServerIntentClient(Level<InboundServerIntent>);

pub struct InboundClientsIntentClient(Level<InboundClientsIntent>);

pub struct InboundClientsAccessIntentClient(Level<InboundClientsAccessIntent>);

// === impl TrafficGroupIntentClient ===

impl TrafficGroupIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Level(Crud::new(
            db,
            "TrafficGroupIntent already exists",
            "Traffic group intent not found",
        )))
    }
}

#[async_trait::async_trait]
impl TrafficGroupIntentManager for TrafficGroupIntentClient {
    async fn create(
        &self,
        intent: TrafficGroupIntent,
        dig: &Dig,
        fail_if_exists: bool,
    ) -> Result<TrafficGroupIntent> {
        let path = [intent.metadata.name.as_str()];
        self.0.create(&intent, dig, &path, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig) -> Result<TrafficGroupIntent> {
        self.0.get(dig, &[name]).await
    }

    async fn get_all(&self, dig: &Dig) -> Result<Vec<TrafficGroupIntent>> {
        self.0.get_all(dig, &[""]).await
    }

    async fn delete(&self, name: &str, dig: &Dig) -> Result<()> {
        self.0.delete(dig, &[name]).await
    }
}

// === impl InboundServerIntentClient ===

impl InboundServerIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Level(Crud::new(
            db,
            "ServerInboundIntent already exists",
            "Inbound server intent not found",
        )))
    }
}

#[async_trait::async_trait]
impl InboundServerIntentManager for InboundServerIntentClient {
    async fn create(
        &self,
        intent: InboundServerIntent,
        dig: &Dig,
        traffic_group: &str,
        fail_if_exists: bool,
    ) -> Result<InboundServerIntent> {
        let path = [traffic_group, intent.metadata.name.as_str()];
        self.0.create(&intent, dig, &path, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(&self, name: &str, dig: &Dig, traffic_group: &str) -> Result<InboundServerIntent> {
        self.0.get(dig, &[traffic_group, name]).await
    }

    async fn get_all(&self, dig: &Dig, traffic_group: &str) -> Result<Vec<InboundServerIntent>> {
        self.0.get_all(dig, &[traffic_group, ""]).await
    }

    async fn delete(&self, name: &str, dig: &Dig, traffic_group: &str) -> Result<()> {
        self.0.delete(dig, &[traffic_group, name]).await
    }
}

// === impl InboundClientsIntentClient ===

impl InboundClientsIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Level(Crud::new(
            db,
            "InboundClientsIntent already exists",
            "Inbound clients intent not found",
        )))
    }
}

#[async_trait::async_trait]
impl InboundClientsIntentManager for InboundClientsIntentClient {
    async fn create(
        &self,
        intent: InboundClientsIntent,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        fail_if_exists: bool,
    ) -> Result<InboundClientsIntent> {
        let path = [traffic_group, server, intent.metadata.name.as_str()];
        self.0.create(&intent, dig, &path, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
    ) -> Result<InboundClientsIntent> {
        self.0.get(dig, &[traffic_group, server, name]).await
    }

    async fn get_all(
        &self,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
    ) -> Result<Vec<InboundClientsIntent>> {
        self.0.get_all(dig, &[traffic_group, server, ""]).await
    }

    async fn delete(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
    ) -> Result<()> {
        self.0.delete(dig, &[traffic_group, server, name]).await
    }
}

// === impl InboundClientsAccessIntentClient ===

impl InboundClientsAccessIntentClient {
    pub fn new(db: Db) -> Self {
        Self(Level(Crud::new(
            db,
            "InboundClientsAccessIntent already exists",
            "Inbound clients access intent not found",
        )))
    }
}

#[async_trait::async_trait]
impl InboundClientsAccessIntentManager for InboundClientsAccessIntentClient {
    async fn create(
        &self,
        intent: InboundClientsAccessIntent,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
        fail_if_exists: bool,
    ) -> Result<InboundClientsAccessIntent> {
        let path = [traffic_group, server, clients, intent.metadata.name.as_str()];
        self.0.create(&intent, dig, &path, fail_if_exists).await?;
        Ok(intent)
    }

    async fn get(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
    ) -> Result<InboundClientsAccessIntent> {
        self.0.get(dig, &[traffic_group, server, clients, name]).await
    }

    async fn get_all(
        &self,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
    ) -> Result<Vec<InboundClientsAccessIntent>> {
        self.0
            .get_all(dig, &[traffic_group, server, clients, ""])
            .await
    }

    async fn delete(
        &self,
        name: &str,
        dig: &Dig,
        traffic_group: &str,
        server: &str,
        clients: &str,
    ) -> Result<()> {
        self.0
            .delete(dig, &[traffic_group, server, clients, name])
            .await
    }
}

// === impl InboundServerIntentSpec ===

impl Default for InboundServerIntentSpec {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            app_label: String::new(),
            service_name: String::new(),
            external_name: String::new(),
            port: 0,
            protocol: String::new(),
            external_support: false,
            service_mesh: "none".to_string(),
            management: ServiceMeshManagement::default(),
            external: ExternalInfo::default(),
            edge_cnf: "none".to_string(),
        }
    }
}
