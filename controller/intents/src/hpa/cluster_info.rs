use crate::{Error, KeyedStore, Result};
use orchestrator_core::StoreExt;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

const COLLECTION: &str = "resources";
const CONTROLLER_DATA: &str = "clusterHpaInfo";
const LABELS_TAG: &str = "clusterLabels";
const NODES_TAG: &str = "clusterNodes";

/// Node name to the node's labels.
pub type NodeLabels = BTreeMap<String, BTreeMap<String, String>>;

/// Resource name to allocatable quantity, e.g. `cpu: "4"`, `memory: 16Gi`.
pub type NodeAllocatable = BTreeMap<String, String>;

/// The nodes of a cluster, as last observed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterNodes {
    #[serde(rename = "cluster-nodes", default)]
    pub node_names: Vec<String>,
    /// Node name to allocatable resources.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: BTreeMap<String, NodeAllocatable>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacementClusterKey<'a> {
    hpa_plc_cluster_provider: &'a str,
    hpa_plc_cluster: &'a str,
    hpa_plc_cluster_controller_data: &'a str,
}

/// Reads and writes the node information HPA placement decisions are made against.
#[derive(Clone)]
pub struct ClusterInfoClient {
    store: Arc<dyn KeyedStore>,
}

// === impl ClusterInfoClient ===

impl ClusterInfoClient {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    fn key<'a>(provider: &'a str, cluster: &'a str) -> PlacementClusterKey<'a> {
        PlacementClusterKey {
            hpa_plc_cluster_provider: provider,
            hpa_plc_cluster: cluster,
            hpa_plc_cluster_controller_data: CONTROLLER_DATA,
        }
    }

    pub async fn save(
        &self,
        provider: &str,
        cluster: &str,
        nodes: &ClusterNodes,
        labels: &NodeLabels,
    ) -> Result<()> {
        let key = Self::key(provider, cluster);
        self.store
            .insert_typed(COLLECTION, &key, NODES_TAG, nodes)
            .await
            .map_err(|e| e.context(format!("storing nodes of cluster {provider}+{cluster}")))?;
        self.store
            .insert_typed(COLLECTION, &key, LABELS_TAG, labels)
            .await
            .map_err(|e| e.context(format!("storing labels of cluster {provider}+{cluster}")))?;
        tracing::debug!(%provider, %cluster, nodes = nodes.node_names.len(), "Saved cluster info");
        Ok(())
    }

    /// Returns the cluster's node labels, which are empty if none were saved.
    pub async fn labels(&self, provider: &str, cluster: &str) -> Result<NodeLabels> {
        Ok(self
            .store
            .find_typed(COLLECTION, &Self::key(provider, cluster), LABELS_TAG)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Returns the cluster's nodes, which are empty if none were saved.
    pub async fn nodes(&self, provider: &str, cluster: &str) -> Result<ClusterNodes> {
        Ok(self
            .store
            .find_typed(COLLECTION, &Self::key(provider, cluster), NODES_TAG)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    pub async fn delete(&self, provider: &str, cluster: &str) -> Result<()> {
        self.store
            .remove_typed(COLLECTION, &Self::key(provider, cluster))
            .await
            .map_err(|e: Error| e.context(format!("deleting cluster info of {provider}+{cluster}")))
    }
}

impl std::fmt::Debug for ClusterInfoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterInfoClient").finish_non_exhaustive()
    }
}
