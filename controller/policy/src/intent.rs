use crate::Operation;
use orchestrator_core::{Error, Metadata, Result, StoreExt};
use orchestrator_intents::{Db, Dig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// An event raised by an agent. An empty `agent_id` matches the event from any agent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "agent", default, skip_serializing_if = "String::is_empty")]
    pub agent_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicySpec {
    pub engine_url: String,
    pub policy_name: String,
}

/// The body of a policy intent.
///
/// The intent's key fields are copied into the spec on create so that documents read back by an
/// existence query are self-describing.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntentSpec {
    #[serde(rename = "policyIntentID")]
    pub policy_intent_id: String,
    pub project: String,
    pub composite_app: String,
    pub composite_app_version: String,
    pub deployment_intent_group: String,
    pub policy: PolicySpec,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_arg: Option<Value>,
    pub event: Event,
    #[serde(rename = "supportingEvent", skip_serializing_if = "Vec::is_empty")]
    pub supporting_events: Vec<Event>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PolicyIntent {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: IntentSpec,
}

/// A change to the stored policy intents, replayed into the reverse map.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentUpdate {
    pub op: Operation,
    pub intent: PolicyIntent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentKey<'a> {
    policy_intent: &'a str,
    project: &'a str,
    composite_app: &'a str,
    composite_app_version: &'a str,
    deployment_intent_group: &'a str,
}

/// Stores policy intents and publishes every change onto the update stream.
#[derive(Clone, Debug)]
pub struct PolicyIntentClient {
    db: Db,
    updates: mpsc::UnboundedSender<IntentUpdate>,
}

// === impl IntentSpec ===

impl IntentSpec {
    /// Whether both specs identify the same stored intent.
    pub fn same_intent(&self, other: &Self) -> bool {
        self.project == other.project
            && self.composite_app == other.composite_app
            && self.composite_app_version == other.composite_app_version
            && self.deployment_intent_group == other.deployment_intent_group
            && self.policy_intent_id == other.policy_intent_id
    }

    /// `project/compositeApp/version/dig/id`, as used in log and error messages.
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.project,
            self.composite_app,
            self.composite_app_version,
            self.deployment_intent_group,
            self.policy_intent_id
        )
    }
}

// === impl PolicyIntentClient ===

impl PolicyIntentClient {
    pub fn new(db: Db, updates: mpsc::UnboundedSender<IntentUpdate>) -> Self {
        Self { db, updates }
    }

    /// Stores `intent` under `id`, returning it with its key fields filled in and whether an intent
    /// already existed.
    ///
    /// Replacing an intent that watched a different event first retracts the old intent.
    pub async fn create(
        &self,
        dig: &Dig,
        id: &str,
        mut intent: PolicyIntent,
        fail_if_exists: bool,
    ) -> Result<(PolicyIntent, bool)> {
        intent.spec.policy_intent_id = id.to_string();
        intent.spec.project = dig.project.clone();
        intent.spec.composite_app = dig.composite_app.clone();
        intent.spec.composite_app_version = dig.composite_app_version.clone();
        intent.spec.deployment_intent_group = dig.deployment_intent_group.clone();

        let existing = self.find(dig, id).await?;
        if existing.is_some() && fail_if_exists {
            return Err(Error::conflict("Policy Intent already exists"));
        }
        let existed = existing.is_some();
        if let Some(old) = existing {
            if old.spec.event != intent.spec.event {
                self.publish(Operation::Delete, old);
            }
        }

        self.db
            .store()
            .insert_typed(self.db.collection(), &key(dig, id), self.db.tag(), &intent)
            .await
            .map_err(|e| e.context("Creating DB Entry"))?;
        self.publish(Operation::Append, intent.clone());
        Ok((intent, existed))
    }

    pub async fn get(&self, dig: &Dig, id: &str) -> Result<PolicyIntent> {
        self.find(dig, id)
            .await?
            .ok_or_else(|| Error::not_found("Policy Intent not found"))
    }

    /// Returns every stored policy intent, across all deployment intent groups.
    pub async fn get_all(&self) -> Result<Vec<PolicyIntent>> {
        self.db
            .store()
            .find_typed(
                self.db.collection(),
                &json!({ "policyIntent": { "$exists": true } }),
                self.db.tag(),
            )
            .await
    }

    pub async fn delete(&self, dig: &Dig, id: &str) -> Result<()> {
        let intent = self.get(dig, id).await?;
        self.db
            .store()
            .remove_typed(self.db.collection(), &key(dig, id))
            .await?;
        self.publish(Operation::Delete, intent);
        Ok(())
    }

    async fn find(&self, dig: &Dig, id: &str) -> Result<Option<PolicyIntent>> {
        let found: Vec<PolicyIntent> = self
            .db
            .store()
            .find_typed(self.db.collection(), &key(dig, id), self.db.tag())
            .await?;
        Ok(found.into_iter().next())
    }

    fn publish(&self, op: Operation, intent: PolicyIntent) {
        if self.updates.send(IntentUpdate { op, intent }).is_err() {
            tracing::debug!("Intent update stream closed");
        }
    }
}

fn key<'a>(dig: &'a Dig, id: &'a str) -> IntentKey<'a> {
    IntentKey {
        policy_intent: id,
        project: &dig.project,
        composite_app: &dig.composite_app,
        composite_app_version: &dig.composite_app_version,
        deployment_intent_group: &dig.deployment_intent_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::MemStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn client() -> (PolicyIntentClient, mpsc::UnboundedReceiver<IntentUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let db = Db::new(Arc::new(MemStore::new()));
        (PolicyIntentClient::new(db, tx), rx)
    }

    fn dig() -> Dig {
        Dig::new("p", "ca", "v1", "dig")
    }

    fn intent(event: &str) -> PolicyIntent {
        serde_json::from_value(json!({
            "metadata": { "name": "scale-up" },
            "spec": {
                "policy": { "engineUrl": "opa:8181", "policyName": "v1/data/cpu" },
                "actor": "temporal",
                "actorArg": { "workFlowMgr": "wfm:9097", "workFlowName": "scale" },
                "event": { "id": event, "agent": "agent1" }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_fills_keys_and_publishes() {
        let (client, mut rx) = client();
        let (created, existed) = client
            .create(&dig(), "intent1", intent("cpu-high"), false)
            .await
            .unwrap();
        assert!(!existed);
        assert_eq!(created.spec.path(), "p/ca/v1/dig/intent1");

        let mut recv = tokio_test::task::spawn(rx.recv());
        let update = tokio_test::assert_ready!(recv.poll()).unwrap();
        assert_eq!(update.op, Operation::Append);
        assert_eq!(update.intent, created);
        assert_eq!(client.get(&dig(), "intent1").await.unwrap(), created);
    }

    #[tokio::test]
    async fn replacing_the_event_retracts_the_old_intent() {
        let (client, mut rx) = client();
        let (old, _) = client
            .create(&dig(), "intent1", intent("cpu-high"), false)
            .await
            .unwrap();
        let (new, existed) = client
            .create(&dig(), "intent1", intent("mem-high"), false)
            .await
            .unwrap();
        assert!(existed);

        let ops = std::iter::from_fn(|| rx.try_recv().ok()).collect::<Vec<_>>();
        assert_eq!(
            ops,
            vec![
                IntentUpdate { op: Operation::Append, intent: old.clone() },
                IntentUpdate { op: Operation::Delete, intent: old },
                IntentUpdate { op: Operation::Append, intent: new.clone() },
            ]
        );

        // Same event: no retraction.
        client
            .create(&dig(), "intent1", intent("mem-high"), false)
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().op, Operation::Append);
        assert!(rx.try_recv().is_err());

        let err = client
            .create(&dig(), "intent1", intent("mem-high"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "{err}");
    }

    #[tokio::test]
    async fn delete_publishes_the_stored_intent() {
        let (client, mut rx) = client();
        let err = client.delete(&dig(), "intent1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Policy Intent not found");

        let (created, _) = client
            .create(&dig(), "intent1", intent("cpu-high"), false)
            .await
            .unwrap();
        client.delete(&dig(), "intent1").await.unwrap();
        let _ = rx.try_recv();
        assert_eq!(
            rx.try_recv().unwrap(),
            IntentUpdate { op: Operation::Delete, intent: created }
        );
        assert!(client.get(&dig(), "intent1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn get_all_spans_deployment_groups() {
        let (client, _rx) = client();
        assert!(client.get_all().await.unwrap().is_empty());

        client
            .create(&dig(), "intent1", intent("cpu-high"), false)
            .await
            .unwrap();
        client
            .create(&Dig::new("p", "ca", "v1", "other"), "intent2", intent("cpu-high"), false)
            .await
            .unwrap();

        let mut ids = client
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.spec.path())
            .collect::<Vec<_>>();
        ids.sort();
        assert_eq!(ids, vec!["p/ca/v1/dig/intent1", "p/ca/v1/other/intent2"]);
    }

    #[test]
    fn agentless_events_omit_the_agent() {
        let event = Event {
            id: "cpu-high".to_string(),
            agent_id: String::new(),
        };
        assert_eq!(serde_json::to_value(&event).unwrap(), json!({ "id": "cpu-high" }));
    }
}
