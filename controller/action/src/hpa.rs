//! HPA placement.
//!
//! Removes the clusters of an app that cannot host its scaled workloads: every consumer's
//! resources must be offered by some node of the cluster, either as allocatable capacity for all of
//! the consumer's replicas or as a node label.

use crate::{k8s_error, split_cluster};
use orchestrator_core::{AppContext, ContextDb, Error, Result};
use orchestrator_intents::{
    hpa::{
        ClusterInfoClient, HpaConsumer, HpaConsumerManager, HpaIntentManager, HpaResource,
        HpaResourceManager, ResourceRequirement,
    },
    Dig,
};
use orchestrator_k8s_api::parse_milli;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct HpaPlacement {
    contexts: Arc<dyn ContextDb>,
    intents: Arc<dyn HpaIntentManager>,
    consumers: Arc<dyn HpaConsumerManager>,
    resources: Arc<dyn HpaResourceManager>,
    cluster_info: ClusterInfoClient,
}

/// A consumer's resources, with the replica count they must be provided for.
struct Demand {
    replicas: i64,
    resources: Vec<HpaResource>,
}

// === impl HpaPlacement ===

impl HpaPlacement {
    pub fn new(
        contexts: Arc<dyn ContextDb>,
        intents: Arc<dyn HpaIntentManager>,
        consumers: Arc<dyn HpaConsumerManager>,
        resources: Arc<dyn HpaResourceManager>,
        cluster_info: ClusterInfoClient,
    ) -> Self {
        Self {
            contexts,
            intents,
            consumers,
            resources,
            cluster_info,
        }
    }

    /// Deletes the clusters that fail an HPA intent of the deployment from the AppContext.
    #[instrument(skip(self), fields(context = %app_context_id))]
    pub async fn filter_clusters(&self, app_context_id: &str) -> Result<()> {
        let ctx = AppContext::load(self.contexts.clone(), app_context_id)
            .await
            .map_err(|error| error.context("Invalid appContext ID"))?;
        let meta = ctx
            .get_composite_app_meta()
            .await
            .map_err(|error| error.context("Error getting metadata from AppContext"))?;
        let dig = Dig::from(&meta);

        let intents = self.intents.get_all(&dig).await?;
        if intents.is_empty() {
            debug!("No HPA intents");
            return Ok(());
        }

        for intent in &intents {
            let app = &intent.spec.app_name;
            let clusters = match ctx.get_cluster_names(app).await {
                Ok(clusters) => clusters,
                Err(error) if error.is_not_found() => {
                    debug!(%app, "App has no clusters");
                    continue;
                }
                Err(error) => return Err(error),
            };

            let demands = self.demands(&dig, &intent.metadata.name).await?;
            if demands.iter().all(|d| d.resources.is_empty()) {
                continue;
            }

            let mut remaining = clusters.len();
            for cluster in &clusters {
                if self.satisfies(cluster, &demands).await? {
                    continue;
                }
                let handle = ctx.get_cluster_handle(app, cluster).await?;
                ctx.delete_cluster(&handle).await?;
                remaining -= 1;
                info!(%app, %cluster, intent = %intent.metadata.name, "Cluster removed by HPA placement");
            }

            if remaining == 0 {
                return Err(Error::invariant(format!(
                    "no clusters satisfy the hpa intent {} for app {app}",
                    intent.metadata.name
                )));
            }
        }
        Ok(())
    }

    async fn demands(&self, dig: &Dig, intent: &str) -> Result<Vec<Demand>> {
        let consumers: Vec<HpaConsumer> = self.consumers.get_all(dig, intent).await?;
        let mut demands = Vec::with_capacity(consumers.len());
        for consumer in consumers {
            let resources = self
                .resources
                .get_all(dig, intent, &consumer.metadata.name)
                .await?;
            demands.push(Demand {
                replicas: consumer.spec.replicas,
                resources,
            });
        }
        Ok(demands)
    }

    /// Returns true if the nodes of `cluster` meet every demand.
    async fn satisfies(&self, cluster: &str, demands: &[Demand]) -> Result<bool> {
        let (provider, name) = split_cluster(cluster);
        let nodes = self.cluster_info.nodes(provider, name).await?;
        let labels = self.cluster_info.labels(provider, name).await?;

        for demand in demands {
            for resource in &demand.resources {
                let met = match &resource.spec.resource {
                    ResourceRequirement::Allocatable { name: res, requests, .. } => {
                        let needed = i128::from(*requests) * i128::from(demand.replicas) * 1000;
                        let mut offered = nodes
                            .allocatable
                            .values()
                            .filter_map(|alloc| alloc.get(res))
                            .peekable();
                        if offered.peek().is_none() {
                            return Err(Error::validation(format!(
                                "resource {res} is not reported by any node of cluster {cluster}"
                            )));
                        }
                        let mut met = false;
                        for quantity in offered {
                            if parse_milli(quantity).map_err(k8s_error)? >= needed {
                                met = true;
                                break;
                            }
                        }
                        met
                    }
                    ResourceRequirement::NonAllocatable { key, value } => labels
                        .values()
                        .any(|node| node.get(key).is_some_and(|v| v == value)),
                };
                if !met {
                    debug!(%cluster, resource = %resource.metadata.name, "Requirement not met");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
