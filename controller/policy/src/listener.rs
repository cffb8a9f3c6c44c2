use crate::proto::{Event, EventsClient, ServerSpec};
use orchestrator_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// The id the controller announces itself with when subscribing to an agent.
const SERVER_ID: i32 = 1003;

/// A stream of events from one agent.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Forwards the agent's events to `events` until its stream ends or fails.
    ///
    /// Sending blocks while `events` is full.
    async fn listen(&self, endpoint: &str, events: mpsc::Sender<Event>) -> Result<()>;
}

/// Subscribes to the agent's `Events/EventUpdate` gRPC stream.
#[derive(Clone, Debug, Default)]
pub struct GrpcEventSource;

// === impl GrpcEventSource ===

#[async_trait::async_trait]
impl EventSource for GrpcEventSource {
    async fn listen(&self, endpoint: &str, events: mpsc::Sender<Event>) -> Result<()> {
        let mut client = EventsClient::connect(endpoint).await.map_err(|error| {
            Error::downstream(format!("failed to connect to agent {endpoint}"), error)
        })?;
        let mut stream = client
            .event_update(ServerSpec {
                server_id: SERVER_ID,
            })
            .await
            .map_err(|status| Error::downstream("Couldn't subscribe to agent events", status))?;

        while let Some(event) = stream
            .message()
            .await
            .map_err(|status| Error::downstream("Agent receiver error", status))?
        {
            debug!(id = %event.event_id, agent = %event.agent_id, "New event received");
            if events.send(event).await.is_err() {
                debug!("Events queue closed");
                break;
            }
        }
        Ok(())
    }
}
