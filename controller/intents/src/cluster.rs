use crate::{db::Crud, Db, Metadata, Result};
use serde::{Deserialize, Serialize};

/// Resolves the clusters registered under a cluster provider.
///
/// Names are bare cluster names, without the `provider+` prefix used in an
/// [`AppContext`](orchestrator_core::AppContext).
#[async_trait::async_trait]
pub trait ClusterRegistry: Send + Sync {
    async fn clusters(&self, provider: &str) -> Result<Vec<String>>;

    async fn clusters_with_label(&self, provider: &str, label: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Serialize)]
struct ClusterKey<'a> {
    #[serde(rename = "clusterProvider")]
    provider: &'a str,
    cluster: &'a str,
}

/// Keys a cluster label document. The document's value is the key itself.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterLabelKey {
    #[serde(rename = "clusterProvider")]
    pub provider: String,
    pub cluster: String,
    #[serde(rename = "clusterLabel")]
    pub label: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct Cluster {
    metadata: Metadata,
}

/// A [`ClusterRegistry`] over cluster and cluster label documents.
pub struct StoreClusterRegistry {
    clusters: Crud<Cluster>,
    labels: Crud<ClusterLabelKey>,
}

// === impl StoreClusterRegistry ===

impl StoreClusterRegistry {
    pub fn new(db: Db) -> Self {
        Self {
            clusters: Crud::new(db.clone(), "Cluster already exists", "Cluster not found"),
            labels: Crud::new(db, "Cluster label already exists", "Cluster label not found"),
        }
    }

    pub async fn add_cluster(&self, provider: &str, cluster: &str) -> Result<()> {
        let key = ClusterKey { provider, cluster };
        let value = Cluster {
            metadata: Metadata::named(cluster),
        };
        self.clusters.create(&key, &value, false).await.map(drop)
    }

    pub async fn add_label(&self, provider: &str, cluster: &str, label: &str) -> Result<()> {
        let key = ClusterLabelKey {
            provider: provider.to_string(),
            cluster: cluster.to_string(),
            label: label.to_string(),
        };
        self.labels.create(&key, &key, false).await.map(drop)
    }
}

#[async_trait::async_trait]
impl ClusterRegistry for StoreClusterRegistry {
    async fn clusters(&self, provider: &str) -> Result<Vec<String>> {
        let key = ClusterKey {
            provider,
            cluster: "",
        };
        let clusters = self.clusters.get_all(&key).await?;
        Ok(clusters.into_iter().map(|c| c.metadata.name).collect())
    }

    async fn clusters_with_label(&self, provider: &str, label: &str) -> Result<Vec<String>> {
        let key = ClusterLabelKey {
            provider: provider.to_string(),
            cluster: String::new(),
            label: label.to_string(),
        };
        let labels = self.labels.get_all(&key).await?;
        Ok(labels.into_iter().map(|l| l.cluster).collect())
    }
}
