use super::*;
use maplit::btreemap;
use orchestrator_core::{Metadata, MemContextDb};
use orchestrator_intents::sfc::{
    SfcClientSelectorIntentSpec, SfcLinkIntentSpec, SfcProviderNetworkIntentSpec,
};
use orchestrator_k8s_api::LabelSelector;
use pretty_assertions::assert_eq;

fn link(name: &str, left: &str, right: &str, label: &str) -> SfcLinkIntent {
    SfcLinkIntent {
        metadata: Metadata::named(name),
        spec: SfcLinkIntentSpec {
            left_net: left.to_string(),
            right_net: right.to_string(),
            link_label: label.to_string(),
            app_name: "a1".to_string(),
            workload_resource: "fw".to_string(),
            resource_type: "Deployment".to_string(),
        },
    }
}

fn selector(name: &str, end: ChainEnd, app: &str) -> SfcClientSelectorIntent {
    SfcClientSelectorIntent {
        metadata: Metadata::named(name),
        spec: SfcClientSelectorIntentSpec {
            chain_end: end,
            pod_selector: LabelSelector {
                match_labels: Some(btreemap! { "app".to_string() => app.to_string() }),
                ..Default::default()
            },
            namespace_selector: LabelSelector::default(),
        },
    }
}

fn network(name: &str, end: ChainEnd, net: &str) -> SfcProviderNetworkIntent {
    SfcProviderNetworkIntent {
        metadata: Metadata::named(name),
        spec: SfcProviderNetworkIntentSpec {
            chain_end: end,
            network_name: net.to_string(),
            gateway_ip: "172.30.10.2".to_string(),
            subnet: "172.30.10.0/24".to_string(),
        },
    }
}

#[test]
fn walks_links_from_the_leftmost_network() {
    // Declared out of order.
    let links = [
        link("l2", "dyn1", "right-virtual", "app=a2"),
        link("l1", "left-virtual", "dyn1", "app=a1"),
    ];
    assert_eq!(
        handle_sfc_link_intents("chain1", &links).unwrap(),
        "net=left-virtual,app=a1,net=dyn1,app=a2,net=right-virtual"
    );

    let single = [link("l1", "left", "right", "app=fw")];
    assert_eq!(
        handle_sfc_link_intents("chain1", &single).unwrap(),
        "net=left,app=fw,net=right"
    );
}

#[test]
fn rejects_malformed_links() {
    let cases = [
        (
            vec![
                link("l1", "a", "b", "app=x"),
                link("l2", "a", "c", "app=y"),
            ],
            "Duplicate Left Network in SFC Link Intent: l2",
        ),
        (
            vec![
                link("l1", "a", "c", "app=x"),
                link("l2", "b", "c", "app=y"),
            ],
            "Duplicate Right Network in SFC Link Intent: l2",
        ),
        (
            vec![
                link("l1", "a", "b", "app=x"),
                link("l2", "b", "c", "app=x"),
            ],
            "Duplicate Link Labelin SFC Link Intent: l2",
        ),
        (
            vec![
                link("l1", "a", "b", "app=x"),
                link("l2", "c", "d", "app=y"),
            ],
            "Multiple leftmost Networks in SFC Link Intents",
        ),
        (vec![], "No SFC Link Intents"),
        (
            vec![
                link("l1", "a", "b", "app=x"),
                link("l2", "b", "a", "app=y"),
            ],
            "No SFC Link Intents",
        ),
    ];

    for (links, expected) in cases {
        let err = handle_sfc_link_intents("chain1", &links).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn rejects_disconnected_cycles() {
    // a -> b is a path, c <-> d is a cycle that never joins it.
    let links = [
        link("l1", "a", "b", "app=w"),
        link("l2", "c", "d", "app=x"),
        link("l3", "d", "c", "app=y"),
    ];
    let err = handle_sfc_link_intents("chain1", &links).unwrap_err();
    assert_eq!(err.to_string(), "Invalid set of SFC link intents");
}

#[test]
fn provider_networks_fill_selectors_in_order() {
    let selectors = [
        selector("s1", ChainEnd::Left, "client"),
        selector("s2", ChainEnd::Left, "other"),
        selector("s3", ChainEnd::Right, "server"),
    ];
    let networks = [
        network("n1", ChainEnd::Left, "left-pnetwork"),
        network("n2", ChainEnd::Right, "right-pnetwork"),
        network("n3", ChainEnd::Right, "extra-pnetwork"),
    ];

    let (left, right) = chain_ends("chain1", &selectors, &networks).unwrap();
    assert_eq!(left.len(), 2);
    assert_eq!(left[0].network_name, "left-pnetwork");
    assert_eq!(left[0].pod_selector, selectors[0].spec.pod_selector);
    assert_eq!(left[1].network_name, "");
    assert_eq!(left[1].pod_selector, selectors[1].spec.pod_selector);

    assert_eq!(right.len(), 2);
    assert_eq!(right[0].network_name, "right-pnetwork");
    assert_eq!(right[0].pod_selector, selectors[2].spec.pod_selector);
    assert_eq!(right[1].network_name, "extra-pnetwork");
    assert_eq!(right[1].gateway_ip, "172.30.10.2");
    assert_eq!(right[1].pod_selector, LabelSelector::default());
}

#[test]
fn both_ends_are_required() {
    let left = [selector("s1", ChainEnd::Left, "client")];
    let right = [network("n1", ChainEnd::Right, "right-pnetwork")];

    let err = chain_ends("chain1", &[], &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "provider network or client selector intents were not provided for SFC: chain1"
    );
    let err = chain_ends("chain1", &[], &right).unwrap_err();
    assert_eq!(
        err.to_string(),
        "provider network or client selector intents were not provided for left end of SFC: chain1"
    );
    let err = chain_ends("chain1", &left, &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "provider network or client selector intents were not provided for right end of SFC: chain1"
    );
    assert!(chain_ends("chain1", &left, &right).is_ok());
}

#[tokio::test]
async fn chain_clusters_intersects_app_clusters() {
    let ctx = AppContext::create(Arc::new(MemContextDb::new()));
    let root = ctx.create_composite_app().await.unwrap();
    for (app, clusters) in [("a1", ["p1+c1", "p1+c2"]), ("a2", ["p1+c2", "p1+c3"])] {
        let handle = ctx.add_app(&root, app).await.unwrap();
        for cluster in clusters {
            ctx.add_cluster(&handle, cluster).await.unwrap();
        }
    }

    let apps = ["a1", "a2"].iter().map(|a| a.to_string()).collect();
    let clusters = chain_clusters(&ctx, &apps).await.unwrap();
    assert_eq!(clusters.into_iter().collect::<Vec<_>>(), vec!["p1+c2"]);

    let apps = ["a1", "missing"].iter().map(|a| a.to_string()).collect();
    assert!(chain_clusters(&ctx, &apps).await.unwrap().is_empty());
}
