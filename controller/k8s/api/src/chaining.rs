use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Describes a routed network service chain and the networks at each of its ends.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "k8s.plugin.opnfv.org",
    version = "v1alpha1",
    kind = "NetworkChaining",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkChainingSpec {
    pub chain_type: String,
    pub routing_spec: RouteSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub namespace: String,

    /// Alternating networks and link labels, e.g. `net=left,app=a1,net=dyn1,app=a2,net=right`.
    pub network_chain: String,

    #[serde(rename = "left")]
    pub left_network: Vec<RoutingNetwork>,

    #[serde(rename = "right")]
    pub right_network: Vec<RoutingNetwork>,
}

/// A network at one end of the chain and the clients attached to it.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingNetwork {
    pub network_name: String,
    #[serde(rename = "gatewayIp")]
    pub gateway_ip: String,
    pub subnet: String,
    #[serde(default)]
    pub pod_selector: LabelSelector,
    #[serde(default)]
    pub namespace_selector: LabelSelector,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{to_yaml, yaml_to_json};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn serializes_with_type_meta() {
        let chain = NetworkChaining::new(
            "chain1",
            NetworkChainingSpec {
                chain_type: "Routing".to_string(),
                routing_spec: RouteSpec {
                    namespace: "default".to_string(),
                    network_chain: "net=a,app=x,net=b".to_string(),
                    left_network: vec![RoutingNetwork {
                        network_name: "left-pnetwork".to_string(),
                        gateway_ip: "172.30.10.2".to_string(),
                        subnet: "172.30.10.0/24".to_string(),
                        pod_selector: LabelSelector {
                            match_labels: Some(btreemap! {
                                "app".to_string() => "client".to_string(),
                            }),
                            ..Default::default()
                        },
                        ..Default::default()
                    }],
                    right_network: vec![],
                },
            },
        );

        let value = yaml_to_json(to_yaml(&chain).unwrap().as_bytes()).unwrap();
        assert_eq!(value["apiVersion"], "k8s.plugin.opnfv.org/v1alpha1");
        assert_eq!(value["kind"], "NetworkChaining");
        assert_eq!(value["metadata"]["name"], "chain1");
        assert_eq!(
            value["spec"]["routingSpec"]["left"][0],
            json!({
                "networkName": "left-pnetwork",
                "gatewayIp": "172.30.10.2",
                "subnet": "172.30.10.0/24",
                "podSelector": {"matchLabels": {"app": "client"}},
                "namespaceSelector": {},
            })
        );
    }
}
