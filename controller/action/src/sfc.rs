//! Network service chaining.
//!
//! Every SFC intent of a deployment becomes a `NetworkChaining` resource, deployed under a
//! dedicated chaining app to each cluster that runs all of the chain's apps. The chained workloads
//! on those clusters are labelled so that their pods join the chain.

#[cfg(test)]
mod tests;

use crate::k8s_error;
use orchestrator_core::{
    appcontext::{AppHandle, ResourceOrder},
    resource_name, AppContext, ContextDb, Error, Result,
};
use orchestrator_intents::{
    sfc::{
        ChainEnd, SfcClientSelectorIntent, SfcClientSelectorIntentManager, SfcIntent,
        SfcIntentManager, SfcLinkIntent, SfcLinkIntentManager, SfcProviderNetworkIntent,
        SfcProviderNetworkIntentManager,
    },
    Dig,
};
use orchestrator_k8s_api::{
    to_yaml, NetworkChaining, NetworkChainingSpec, RouteSpec, RoutingNetwork, Workload,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};
use tracing::{error, info, instrument};

/// The app the chaining resources are deployed under.
pub const CHAINING_APP: &str = "sfc-network-chaining";

const CHAINING_KIND: &str = "NetworkChaining";

pub struct SfcChaining {
    contexts: Arc<dyn ContextDb>,
    intents: Arc<dyn SfcIntentManager>,
    links: Arc<dyn SfcLinkIntentManager>,
    selectors: Arc<dyn SfcClientSelectorIntentManager>,
    networks: Arc<dyn SfcProviderNetworkIntentManager>,
}

// === impl SfcChaining ===

impl SfcChaining {
    pub fn new(
        contexts: Arc<dyn ContextDb>,
        intents: Arc<dyn SfcIntentManager>,
        links: Arc<dyn SfcLinkIntentManager>,
        selectors: Arc<dyn SfcClientSelectorIntentManager>,
        networks: Arc<dyn SfcProviderNetworkIntentManager>,
    ) -> Self {
        Self {
            contexts,
            intents,
            links,
            selectors,
            networks,
        }
    }

    /// Adds the chains of the deployment behind `app_context_id` to its AppContext.
    #[instrument(skip(self), fields(context = %app_context_id))]
    pub async fn update_app_context(&self, intent: &str, app_context_id: &str) -> Result<()> {
        info!(%intent, "Begin SFC app context update");
        let ctx = AppContext::load(self.contexts.clone(), app_context_id)
            .await
            .map_err(|error| {
                error.context(format!("Error loading AppContext with Id: {app_context_id}"))
            })?;
        let meta = ctx.get_composite_app_meta().await.map_err(|error| {
            error.context(format!("Error reading AppContext with Id: {app_context_id}"))
        })?;
        let dig = Dig::from(&meta);

        let intents = self.intents.get_all(&dig).await.map_err(|error| {
            error.context(format!(
                "Error getting SFC Intents for Deployment Intent Group: {}",
                dig.deployment_intent_group
            ))
        })?;
        if intents.is_empty() {
            return Err(Error::validation(format!(
                "No SFC Intents are defined for the Deployment Intent Group: {}",
                dig.deployment_intent_group
            )));
        }

        // The chaining app is added once the first chain has been resolved.
        let mut app = None;
        for sfc in &intents {
            self.apply_chain(&ctx, &dig, sfc, &mut app).await?;
        }
        Ok(())
    }

    /// Adds the chaining app to the context and appends it to the app order.
    async fn add_chaining_app(ctx: &AppContext, sfc: &SfcIntent) -> Result<AppHandle> {
        let name = &sfc.metadata.name;
        let root = ctx.composite_app_handle();
        let app = ctx.add_app(&root, CHAINING_APP).await.map_err(|error| {
            error.context(format!("Error adding ChainingApp to AppContext: {name}"))
        })?;

        let mut order = ctx.get_app_instruction().await.map_err(|error| {
            error.context(format!(
                "Error getting order instruction while adding ChainingApp to AppContext: {name}"
            ))
        })?;
        order.push(CHAINING_APP);
        ctx.add_instruction(&root, &order).await.map_err(|error| {
            error.context(format!("Error adding ChainingApp to order instruction: {name}"))
        })?;
        Ok(app)
    }

    async fn apply_chain(
        &self,
        ctx: &AppContext,
        dig: &Dig,
        sfc: &SfcIntent,
        app: &mut Option<AppHandle>,
    ) -> Result<()> {
        let name = &sfc.metadata.name;
        let selectors = self.selectors.get_all(dig, name).await.map_err(|error| {
            error.context(format!(
                "Error getting SFC Client Selector intents for SFC Intent: {name}"
            ))
        })?;
        let networks = self.networks.get_all(dig, name).await.map_err(|error| {
            error.context(format!(
                "Error getting SFC Provider Network intents for SFC Intent: {name}"
            ))
        })?;
        let (left, right) = chain_ends(name, &selectors, &networks)?;

        let links = self.links.get_all(dig, name).await.map_err(|error| {
            error.context(format!("Error getting SFC Link intents for SFC Intent: {name}"))
        })?;
        let network_chain = handle_sfc_link_intents(name, &links)?;
        info!(sfc = %name, %network_chain, "NetworkChain");

        let chaining = NetworkChaining::new(
            name,
            NetworkChainingSpec {
                chain_type: sfc.spec.chain_type.clone(),
                routing_spec: RouteSpec {
                    namespace: sfc.spec.namespace.clone(),
                    network_chain: network_chain.clone(),
                    left_network: left,
                    right_network: right,
                },
            },
        );
        let manifest = to_yaml(&chaining).map_err(|error| {
            k8s_error(error).context(format!("Failed to marshal NetworkChaining CR: {name}"))
        })?;

        let apps = links.iter().map(|l| l.spec.app_name.clone()).collect();
        let clusters = chain_clusters(ctx, &apps).await?;
        if clusters.is_empty() {
            return Err(Error::invariant(format!(
                "There are no clusters with all the apps for the Network Chain: {network_chain}"
            )));
        }

        let app = match app {
            Some(app) => app.clone(),
            None => app.insert(Self::add_chaining_app(ctx, sfc).await?).clone(),
        };

        let resource = resource_name(name, CHAINING_KIND);
        for cluster in &clusters {
            let handle = ctx.add_cluster(&app, cluster).await.map_err(|error| {
                error.context(format!("Error adding cluster to ChainingApp: {cluster}"))
            })?;
            ctx.add_resource(&handle, &resource, &manifest)
                .await
                .map_err(|error| {
                    error.context(format!("Error adding Network Chain resource: {name}"))
                })?;

            let mut order = match ctx.get_resource_instruction(CHAINING_APP, cluster).await {
                Ok(order) => order,
                Err(error) if error.is_not_found() => ResourceOrder::default(),
                Err(error) => return Err(error),
            };
            order.push(&resource);
            ctx.add_instruction(&handle, &order).await.map_err(|error| {
                error.context(format!(
                    "Error adding Network Chain to resource order instruction: {name}"
                ))
            })?;
        }

        for cluster in &clusters {
            for link in &links {
                label_workload(ctx, cluster, link).await?;
            }
        }
        Ok(())
    }
}

/// Adds the link's label to the pods of its workload on `cluster`.
async fn label_workload(ctx: &AppContext, cluster: &str, link: &SfcLinkIntent) -> Result<()> {
    let spec = &link.spec;
    let resource = resource_name(&spec.workload_resource, &spec.resource_type);
    let client = &link.metadata.name;

    let handle = ctx
        .get_resource_handle(&spec.app_name, cluster, &resource)
        .await
        .map_err(|error| {
            error!(%cluster, app = %spec.app_name, %resource, %client, "App Context resource handle not found");
            error.context(format!(
                "Error getting resource handle [{resource}] for SFC client [{client}] from cluster [{cluster}]"
            ))
        })?;
    let value = ctx.get_resource_value(&handle).await.map_err(|error| {
        error.context(format!(
            "Error getting resource value [{resource}] for SFC client [{client}] from cluster [{cluster}]"
        ))
    })?;

    let mut workload = Workload::from_yaml(&value).map_err(|error| {
        k8s_error(error).context(format!(
            "Error decoding resource: {}",
            spec.workload_resource
        ))
    })?;
    workload.add_pod_label(&spec.link_label);
    let labelled = workload.to_yaml().map_err(|error| {
        k8s_error(error).context(format!(
            "Error marshalling to YAML resource value [{resource}] for SFC client [{client}] from cluster [{cluster}]"
        ))
    })?;

    if let Err(error) = ctx.update_resource_value(&handle, &labelled).await {
        error!(%handle, %error, "Failed to update the labelled workload");
    }
    Ok(())
}

/// Builds the networks at each end of the chain.
///
/// Client selectors contribute pod and namespace selectors. Provider networks fill in the network
/// of the selector at the same position on their end, and are appended once every selector has a
/// network.
fn chain_ends(
    sfc: &str,
    selectors: &[SfcClientSelectorIntent],
    networks: &[SfcProviderNetworkIntent],
) -> Result<(Vec<RoutingNetwork>, Vec<RoutingNetwork>)> {
    let routes_at = |end: ChainEnd| {
        let mut routes = selectors
            .iter()
            .filter(|s| s.spec.chain_end == end)
            .map(|s| RoutingNetwork {
                pod_selector: s.spec.pod_selector.clone(),
                namespace_selector: s.spec.namespace_selector.clone(),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        for (i, net) in networks
            .iter()
            .filter(|n| n.spec.chain_end == end)
            .enumerate()
        {
            if i == routes.len() {
                routes.push(RoutingNetwork::default());
            }
            let route = &mut routes[i];
            route.network_name = net.spec.network_name.clone();
            route.gateway_ip = net.spec.gateway_ip.clone();
            route.subnet = net.spec.subnet.clone();
        }
        routes
    };

    let (left, right) = (routes_at(ChainEnd::Left), routes_at(ChainEnd::Right));
    let missing = match (left.is_empty(), right.is_empty()) {
        (false, false) => return Ok((left, right)),
        (true, true) => "SFC",
        (true, false) => "left end of SFC",
        (false, true) => "right end of SFC",
    };
    Err(Error::validation(format!(
        "provider network or client selector intents were not provided for {missing}: {sfc}"
    )))
}

/// Orders a chain's links from its leftmost network and returns the chain, e.g.
/// `net=left,app=a1,net=middle,app=a2,net=right`.
///
/// Every network may be the left of one link and the right of one link, and each link label may
/// appear once. The links must form a single path.
pub fn handle_sfc_link_intents(sfc: &str, links: &[SfcLinkIntent]) -> Result<String> {
    let mut labels = BTreeMap::new();
    let mut rights = HashSet::new();
    let mut next = BTreeMap::new();
    for link in links {
        let spec = &link.spec;
        if labels
            .insert(spec.left_net.as_str(), spec.link_label.as_str())
            .is_some()
        {
            error!(%sfc, link = %link.metadata.name, "Duplicate left networks in SFC Link Intents");
            return Err(Error::invariant(format!(
                "Duplicate Left Network in SFC Link Intent: {}",
                link.metadata.name
            )));
        }
        if !rights.insert(spec.right_net.as_str()) {
            error!(%sfc, link = %link.metadata.name, "Duplicate right networks in SFC Link Intents");
            return Err(Error::invariant(format!(
                "Duplicate Right Network in SFC Link Intent: {}",
                link.metadata.name
            )));
        }
        if next
            .insert(spec.link_label.as_str(), spec.right_net.as_str())
            .is_some()
        {
            error!(%sfc, link = %link.metadata.name, "Duplicate link label in SFC Link Intents");
            return Err(Error::invariant(format!(
                "Duplicate Link Labelin SFC Link Intent: {}",
                link.metadata.name
            )));
        }
    }

    let mut leftmost = labels.keys().filter(|net| !rights.contains(*net));
    let Some(mut net) = leftmost.next().copied() else {
        error!(%sfc, "No SFC Link Intents");
        return Err(Error::invariant("No SFC Link Intents"));
    };
    if leftmost.next().is_some() {
        error!(%sfc, "Multiple leftmost networks in SFC Link Intents");
        return Err(Error::invariant("Multiple leftmost Networks in SFC Link Intents"));
    }

    let mut chain = format!("net={net}");
    let mut steps = 1;
    while let Some(label) = labels.get(net) {
        let right = next.get(label).copied().unwrap_or_default();
        chain.push_str(&format!(",{label},net={right}"));
        net = right;
        steps += 2;
        if steps > 2 * links.len() + 1 {
            break;
        }
    }

    if steps != 2 * links.len() + 1 {
        error!(%sfc, "Invalid set of SFC link intents");
        return Err(Error::invariant("Invalid set of SFC link intents"));
    }
    Ok(chain)
}

/// Returns the clusters every one of `apps` is deployed to.
///
/// The result is empty if any app is missing from the context.
pub async fn chain_clusters(ctx: &AppContext, apps: &BTreeSet<String>) -> Result<BTreeSet<String>> {
    let mut clusters: Option<BTreeSet<String>> = None;
    for app in apps {
        match ctx.get_app_handle(app).await {
            Ok(_) => {}
            Err(error) if error.is_not_found() => return Ok(BTreeSet::new()),
            Err(error) => return Err(error),
        }
        let names = match ctx.get_cluster_names(app).await {
            Ok(names) => names.into_iter().collect::<BTreeSet<_>>(),
            Err(error) if error.is_not_found() => BTreeSet::new(),
            Err(error) => return Err(error),
        };
        clusters = Some(match clusters {
            None => names,
            Some(clusters) => clusters.intersection(&names).cloned().collect(),
        });
    }
    Ok(clusters.unwrap_or_default())
}
