//! Event-driven policy controller.
//!
//! Policy intents bind an agent event to a policy evaluation and an actor. The controller keeps two
//! in-memory maps: a [`ReverseMap`] from events to the intents that watch them, and an [`AgentMap`]
//! tracking one event listener per registered agent. Both are kept current through update streams
//! fed by the [`PolicyIntentClient`] and [`AgentClient`], so REST writes never wait on the maps.
//!
//! Each event received from an agent is evaluated against every matching intent by POSTing an
//! `{"input": {...}}` envelope to the intent's policy engine. The engine's response is handed to
//! the intent's [`Actor`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod actor;
mod agent;
mod agent_map;
mod controller;
mod engine;
mod intent;
mod listener;
pub mod proto;
mod reverse_map;

pub use self::{
    actor::{Actor, Actors, TemporalActor},
    agent::{AgentClient, AgentSpec, AgentUpdate},
    agent_map::AgentMap,
    controller::{Config, Controller},
    engine::{HttpPolicyEngine, PolicyEngine},
    intent::{Event, IntentSpec, IntentUpdate, PolicyIntent, PolicyIntentClient, PolicySpec},
    listener::{EventSource, GrpcEventSource},
    reverse_map::ReverseMap,
};

/// Whether an update adds to or removes from the in-memory maps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Append,
    Delete,
}
