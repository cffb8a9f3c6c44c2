//! Apply engines.
//!
//! Each engine resolves the intents stored for one deployment intent group into mutations of that
//! deployment's [`AppContext`](orchestrator_core::AppContext):
//!
//! - [`GenericAction`] adds new Kubernetes objects or patches existing ones, per cluster;
//! - [`SfcChaining`] writes a `NetworkChaining` resource and labels the chained workloads;
//! - [`HpaPlacement`] removes clusters that cannot host an app's scaled workloads.
//!
//! The engines write step by step. An error aborts the call, leaving earlier writes in place, and
//! callers are expected to reapply.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod generic;
pub mod hpa;
pub mod sfc;

pub use self::{
    generic::{GenericAction, HttpValueResolver, ValueResolver},
    hpa::HpaPlacement,
    sfc::SfcChaining,
};

use orchestrator_core::Error;

/// Classifies a Kubernetes object error.
fn k8s_error(error: orchestrator_k8s_api::Error) -> Error {
    use orchestrator_k8s_api::Error as K8s;
    match error {
        K8s::Invalid(msg) => Error::validation(msg),
        error @ K8s::UnknownGvk { .. } => Error::validation(error),
        error @ (K8s::Yaml(_) | K8s::Json(_)) => Error::downstream("invalid manifest", error),
    }
}

/// Splits an AppContext cluster name, `provider+cluster`, into its provider and cluster.
fn split_cluster(cluster: &str) -> (&str, &str) {
    cluster
        .split_once(orchestrator_core::SEPARATOR)
        .unwrap_or(("", cluster))
}
