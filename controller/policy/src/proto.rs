//! The agent event protocol (`events.Events`).
//!
//! Agents stream [`Event`]s whose spec and message are `Any` payloads. The payload types known to
//! the controller are declared here and decoded to JSON by type URL.

use orchestrator_core::{Error, Result};
use prost::Message;
use serde::Serialize;
use serde_json::Value;
use tonic::{
    codegen::http::uri::PathAndQuery,
    transport::{Channel, Endpoint},
};

const TYPE_URL_PREFIX: &str = "type.googleapis.com/";
const EVENT_UPDATE_PATH: &str = "/events.Events/EventUpdate";

/// Identifies the controller to an agent.
#[derive(Clone, PartialEq, Message)]
pub struct ServerSpec {
    #[prost(int32, tag = "1")]
    pub server_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Event {
    #[prost(string, tag = "1")]
    pub event_id: String,
    #[prost(string, tag = "2")]
    pub agent_id: String,
    #[prost(message, optional, tag = "3")]
    pub spec: Option<prost_types::Any>,
    #[prost(message, optional, tag = "4")]
    pub message: Option<prost_types::Any>,
}

#[derive(Clone, PartialEq, Message, Serialize)]
pub struct AgentSpec {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub agent_id: String,
}

/// An API call observed by an agent.
#[derive(Clone, PartialEq, Message, Serialize)]
pub struct AgentMessage {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner: String,
    #[prost(string, repeated, tag = "3")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[prost(string, tag = "4")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
}

/// Client of the agent's `Events` service.
#[derive(Clone, Debug)]
pub struct EventsClient {
    inner: tonic::client::Grpc<Channel>,
}

// === impl EventsClient ===

impl EventsClient {
    /// Connects to `endpoint`, a `host:port` or a URI.
    pub async fn connect(endpoint: &str) -> Result<Self, tonic::transport::Error> {
        let uri = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };
        let channel = Endpoint::from_shared(uri)?.connect().await?;
        Ok(Self {
            inner: tonic::client::Grpc::new(channel),
        })
    }

    pub async fn event_update(
        &mut self,
        spec: ServerSpec,
    ) -> Result<tonic::Streaming<Event>, tonic::Status> {
        self.inner.ready().await.map_err(|error| {
            tonic::Status::unavailable(format!("Service was not ready: {error}"))
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let rsp = self
            .inner
            .server_streaming(
                tonic::Request::new(spec),
                PathAndQuery::from_static(EVENT_UPDATE_PATH),
                codec,
            )
            .await?;
        Ok(rsp.into_inner())
    }
}

/// Wraps a known payload as an `Any`.
pub fn to_any<M: Message>(name: &str, msg: &M) -> prost_types::Any {
    prost_types::Any {
        type_url: format!("{TYPE_URL_PREFIX}{name}"),
        value: msg.encode_to_vec(),
    }
}

/// Decodes a known `Any` payload to its JSON form.
pub fn decode_any(any: Option<&prost_types::Any>) -> Result<Value> {
    let any = any.ok_or_else(|| Error::validation("event payload is missing"))?;
    let name = any
        .type_url
        .rsplit_once('/')
        .map_or(any.type_url.as_str(), |(_, name)| name);
    match name {
        "events.AgentSpec" => to_json::<AgentSpec>(&any.value),
        "events.AgentMessage" => to_json::<AgentMessage>(&any.value),
        _ => Err(Error::validation(format!(
            "unknown event payload type {}",
            any.type_url
        ))),
    }
}

fn to_json<M: Message + Default + Serialize>(buf: &[u8]) -> Result<Value> {
    let msg =
        M::decode(buf).map_err(|error| Error::downstream("failed to decode event payload", error))?;
    Ok(serde_json::to_value(msg)?)
}
