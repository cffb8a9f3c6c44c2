use crate::Operation;
use orchestrator_core::{Error, Result, StoreExt};
use orchestrator_intents::Db;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

const MODULE: &str = "Agent";

/// A registered event agent and the gRPC address its events are streamed from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "addr", default)]
    pub endpoint: String,
}

/// A change to the registered agents, replayed into the agent map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentUpdate {
    pub op: Operation,
    pub spec: AgentSpec,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentKey<'a> {
    policy_module: &'static str,
    agent: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleKey {
    policy_module: &'static str,
}

#[derive(Clone, Debug)]
pub struct AgentClient {
    db: Db,
    updates: mpsc::UnboundedSender<AgentUpdate>,
}

// === impl AgentClient ===

impl AgentClient {
    pub fn new(db: Db, updates: mpsc::UnboundedSender<AgentUpdate>) -> Self {
        Self { db, updates }
    }

    /// Stores the module document that agent documents are listed under.
    pub(crate) async fn init(&self) -> Result<()> {
        let key = ModuleKey {
            policy_module: MODULE,
        };
        self.db
            .store()
            .insert_typed(self.db.collection(), &key, self.db.tag(), &key)
            .await
            .map_err(|e| e.context("Error while Initializing DB"))
    }

    /// Registers (or re-registers) the agent `id`.
    pub async fn register(&self, id: &str, mut spec: AgentSpec) -> Result<AgentSpec> {
        spec.id = id.to_string();
        self.db
            .store()
            .insert_typed(self.db.collection(), &key(id), self.db.tag(), &spec)
            .await
            .map_err(|e| e.context("Agent Registration failed"))?;
        self.publish(Operation::Append, spec.clone());
        Ok(spec)
    }

    pub async fn get(&self, id: &str) -> Result<AgentSpec> {
        let found: Vec<AgentSpec> = self
            .db
            .store()
            .find_typed(self.db.collection(), &key(id), self.db.tag())
            .await
            .map_err(|e| e.context("GetAgents failed"))?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Agent with id: {id} not found")))
    }

    pub async fn get_all(&self) -> Result<Vec<AgentSpec>> {
        self.db
            .store()
            .find_typed(
                self.db.collection(),
                &json!({ "policyModule": MODULE, "agent": { "$exists": true } }),
                self.db.tag(),
            )
            .await
            .map_err(|e| e.context("GetAgents failed"))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.db
            .store()
            .remove_typed(self.db.collection(), &key(id))
            .await
            .map_err(|e| e.context("DeleteAgent failed"))?;
        self.publish(
            Operation::Delete,
            AgentSpec {
                id: id.to_string(),
                endpoint: String::new(),
            },
        );
        Ok(())
    }

    fn publish(&self, op: Operation, spec: AgentSpec) {
        if self.updates.send(AgentUpdate { op, spec }).is_err() {
            tracing::debug!("Agent update stream closed");
        }
    }
}

fn key(id: &str) -> AgentKey<'_> {
    AgentKey {
        policy_module: MODULE,
        agent: id,
    }
}
