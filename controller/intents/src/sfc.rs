//! Service function chain intents.
//!
//! An [`SfcIntent`] names a chain. Its [`SfcLinkIntent`]s connect networks through the apps that
//! route between them, and its client selector and provider network intents describe what
//! attaches at either [`ChainEnd`].

mod client_selector;
mod intent;
mod link;
mod provider_network;

pub use self::{
    client_selector::{
        SfcClientSelectorIntent, SfcClientSelectorIntentClient, SfcClientSelectorIntentManager,
        SfcClientSelectorIntentSpec,
    },
    intent::{SfcIntent, SfcIntentClient, SfcIntentManager, SfcIntentSpec},
    link::{SfcLinkIntent, SfcLinkIntentClient, SfcLinkIntentManager, SfcLinkIntentSpec},
    provider_network::{
        SfcProviderNetworkIntent, SfcProviderNetworkIntentClient, SfcProviderNetworkIntentManager,
        SfcProviderNetworkIntentSpec,
    },
};

use crate::Dig;
use serde::{Deserialize, Serialize};

/// The end of a chain a client selector or provider network attaches to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainEnd {
    Left,
    Right,
}

/// Keys an SFC intent's child, `field` holding the child's name.
#[derive(Debug, Serialize)]
struct ChildKey<'a> {
    #[serde(flatten)]
    dig: &'a Dig,
    #[serde(rename = "sfcIntent")]
    sfc: &'a str,
    #[serde(flatten)]
    child: serde_json::Map<String, serde_json::Value>,
}

/// Selects an SFC intent's children of one type at one end of the chain.
#[derive(Debug, Serialize)]
struct ByEndKey<'a> {
    #[serde(flatten)]
    dig: &'a Dig,
    #[serde(rename = "sfcIntent")]
    sfc: &'a str,
    #[serde(flatten)]
    child: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "chainEnd")]
    end: ChainEnd,
}

#[derive(Debug, Serialize)]
struct EndKey {
    #[serde(rename = "chainEnd")]
    end: ChainEnd,
}

// === impl ChainEnd ===

impl ChainEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for ChainEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl ChildKey ===

impl<'a> ChildKey<'a> {
    fn new(dig: &'a Dig, sfc: &'a str, field: &str, name: &str) -> Self {
        let mut child = serde_json::Map::new();
        child.insert(field.to_string(), name.into());
        Self { dig, sfc, child }
    }
}

// === impl ByEndKey ===

impl<'a> ByEndKey<'a> {
    /// Any child of the type named by `field` that was indexed under `end`.
    fn new(dig: &'a Dig, sfc: &'a str, field: &str, end: ChainEnd) -> Self {
        let mut child = serde_json::Map::new();
        child.insert(field.to_string(), serde_json::json!({ "$exists": true }));
        Self {
            dig,
            sfc,
            child,
            end,
        }
    }
}
