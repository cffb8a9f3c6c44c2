//! Typed Kubernetes objects manipulated by the apply engines.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod chaining;
pub mod configmap;
pub mod merge;
mod quantity;
pub mod secret;
pub mod workload;
mod yaml;

pub use self::{
    chaining::{NetworkChaining, NetworkChainingSpec, RouteSpec, RoutingNetwork},
    quantity::parse_milli,
    workload::Workload,
    yaml::{json_to_yaml, to_yaml, yaml_to_json},
};
pub use k8s_openapi::{
    api::core::v1::{ConfigMap, Secret},
    apimachinery::pkg::apis::meta::v1::LabelSelector,
    ByteString,
};
pub use kube::api::ObjectMeta;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object is structurally valid but breaks a Kubernetes rule.
    #[error("{0}")]
    Invalid(String),

    #[error("no typed resource is known for apiVersion {api_version:?}, kind {kind:?}")]
    UnknownGvk { api_version: String, kind: String },

    #[error("failed to convert YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to convert JSON: {0}")]
    Json(#[from] serde_json::Error),
}
