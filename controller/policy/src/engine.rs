use crate::PolicySpec;
use orchestrator_core::{Error, Result};
use serde_json::Value;
use tracing::error;

/// Evaluates a policy against an event.
#[async_trait::async_trait]
pub trait PolicyEngine: Send + Sync {
    async fn evaluate(&self, policy: &PolicySpec, input: &Value) -> Result<Value>;
}

/// POSTs the input to `http://{engineUrl}/{policyName}`, as an OPA-style policy engine expects.
///
/// Requests carry no timeout.
#[derive(Clone, Debug, Default)]
pub struct HttpPolicyEngine {
    client: reqwest::Client,
}

// === impl HttpPolicyEngine ===

impl HttpPolicyEngine {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PolicyEngine for HttpPolicyEngine {
    async fn evaluate(&self, policy: &PolicySpec, input: &Value) -> Result<Value> {
        let url = format!("http://{}/{}", policy.engine_url, policy.policy_name);
        let rsp = self
            .client
            .post(&url)
            .json(input)
            .send()
            .await
            .map_err(|e| Error::downstream(format!("EvaluatePolicy failed for {url}"), e))?;

        let status = rsp.status();
        if status != reqwest::StatusCode::OK {
            error!(%url, %status, "EvaluatePolicy failed due to http error");
            return Err(Error::downstream(
                "EvaluatePolicy failed due to http error",
                format!("http Status code: {}", status.as_u16()),
            ));
        }
        rsp.json()
            .await
            .map_err(|e| Error::downstream(format!("failed to decode evaluation from {url}"), e))
    }
}
