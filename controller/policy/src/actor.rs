use crate::IntentSpec;
use orchestrator_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

/// Acts on a policy evaluation.
#[async_trait::async_trait]
pub trait Actor: Send + Sync {
    async fn execute(&self, evaluation: &Value, intent: &IntentSpec, agent_spec: &Value)
        -> Result<()>;
}

/// Actors by the name policy intents refer to them with.
#[derive(Clone, Default)]
pub struct Actors {
    actors: HashMap<String, Arc<dyn Actor>>,
}

/// Starts a Temporal workflow through the workflow manager when the evaluation requires action.
#[derive(Clone, Debug, Default)]
pub struct TemporalActor {
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TemporalArgs {
    work_flow_mgr: String,
    work_flow_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Evaluation {
    result: EvaluationResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EvaluationResult {
    emco: Decision,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Decision {
    action_required: bool,
    workflow_name: String,
}

// === impl Actors ===

impl Actors {
    pub fn with(mut self, name: impl ToString, actor: impl Actor + 'static) -> Self {
        self.actors.insert(name.to_string(), Arc::new(actor));
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Actor>> {
        self.actors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::validation(format!("Actor {name} is not registered")))
    }
}

impl std::fmt::Debug for Actors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.actors.keys()).finish()
    }
}

// === impl TemporalActor ===

impl TemporalActor {
    pub const NAME: &'static str = "temporal";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns the workflow start URL, or `None` when the evaluation requires no action.
    fn start_url(evaluation: &Value, intent: &IntentSpec) -> Result<Option<String>> {
        let Evaluation {
            result: EvaluationResult { emco: decision },
        } = serde_json::from_value(evaluation.clone())
            .map_err(|e| Error::downstream("Temporal Workflow Execution failed", e))?;
        if !decision.action_required {
            return Ok(None);
        }

        let args = intent.actor_arg.clone().ok_or_else(|| {
            Error::validation("Temporal Workflow Execution failed: actorArg is missing")
        })?;
        let TemporalArgs {
            work_flow_mgr,
            work_flow_name,
        } = serde_json::from_value(args)
            .map_err(|e| Error::downstream("Temporal Workflow Execution failed", e))?;
        if work_flow_name.is_empty() {
            return Err(Error::validation(
                "Workflow execution failed: Temporal workflow name is missing(Provide in policy Intent)",
            ));
        }
        let workflow = if decision.workflow_name.is_empty() {
            work_flow_name
        } else {
            decision.workflow_name
        };

        Ok(Some(format!(
            "http://{work_flow_mgr}/v2/projects/{}/composite-apps/{}/{}/deployment-intent-groups/{}/temporal-workflow-intents/{workflow}/start",
            intent.project,
            intent.composite_app,
            intent.composite_app_version,
            intent.deployment_intent_group,
        )))
    }
}

#[async_trait::async_trait]
impl Actor for TemporalActor {
    async fn execute(&self, evaluation: &Value, intent: &IntentSpec, _: &Value) -> Result<()> {
        info!(intent = %intent.path(), %evaluation, "Policy evaluated");
        let Some(url) = Self::start_url(evaluation, intent)? else {
            debug!("No action required");
            return Ok(());
        };

        info!(%url, "Sending request to workflow manager");
        let rsp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| Error::downstream("Temporal Workflow Execution failed", e))?;
        let status = rsp.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(Error::downstream(
                "Temporal Workflow Execution failed. Couldn't start workflow",
                status.to_string(),
            ));
        }
        Ok(())
    }
}
