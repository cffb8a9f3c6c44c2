//! Intent storage.
//!
//! Every intent type has a narrow `*Manager` trait, sized to what the apply engines and the REST
//! handlers need, and a `*Client` implementing it over a [`KeyedStore`]. Intents are scoped to a
//! deployment intent group ([`Dig`]) and keyed by their name plus the names of their parents.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cluster;
mod db;
pub mod dtc;
pub mod generic;
pub mod hpa;
pub mod sfc;

pub use self::{
    cluster::{ClusterLabelKey, ClusterRegistry, StoreClusterRegistry},
    db::Db,
};
pub use orchestrator_core::{Error, KeyedStore, Metadata, Result};

use orchestrator_core::CompositeAppMeta;
use serde::Serialize;

/// Identifies the deployment intent group an intent belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dig {
    pub project: String,
    pub composite_app: String,
    pub composite_app_version: String,
    pub deployment_intent_group: String,
}

// === impl Dig ===

impl Dig {
    pub fn new(
        project: impl ToString,
        composite_app: impl ToString,
        composite_app_version: impl ToString,
        deployment_intent_group: impl ToString,
    ) -> Self {
        Self {
            project: project.to_string(),
            composite_app: composite_app.to_string(),
            composite_app_version: composite_app_version.to_string(),
            deployment_intent_group: deployment_intent_group.to_string(),
        }
    }
}

impl From<&CompositeAppMeta> for Dig {
    fn from(meta: &CompositeAppMeta) -> Self {
        Self::new(
            &meta.project,
            &meta.composite_app,
            &meta.version,
            &meta.deployment_intent_group,
        )
    }
}
