use base64::{engine::general_purpose::STANDARD, Engine as _};
use orchestrator_action::GenericAction;
use orchestrator_core::{
    appcontext::ResourceOrder, AppContext, CompositeAppMeta, ContextDb, MemContextDb, MemStore,
};
use orchestrator_intents::{
    generic::{
        ClusterInfo, Content, Customization, CustomizationClient, CustomizationContent,
        CustomizationManager, CustomizationSpec, Resource, ResourceClient, ResourceContent,
        ResourceGvk, ResourceManager, ResourceSpec,
    },
    Db, Dig, Metadata, StoreClusterRegistry,
};
use orchestrator_k8s_api::yaml_to_json;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const CLUSTERS: [&str; 3] = ["p1+c1", "p1+c2", "p1+c3"];

const DEPLOYMENT: &str = "apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
";

struct Fixture {
    contexts: Arc<dyn ContextDb>,
    resources: Arc<ResourceClient>,
    customizations: Arc<CustomizationClient>,
    engine: GenericAction,
}

impl Fixture {
    async fn new() -> Self {
        let db = Db::new(Arc::new(MemStore::new()));
        let contexts: Arc<dyn ContextDb> = Arc::new(MemContextDb::new());
        let registry = Arc::new(StoreClusterRegistry::new(db.clone()));
        for cluster in ["c1", "c2", "c3"] {
            registry.add_cluster("p1", cluster).await.unwrap();
        }
        registry.add_label("p1", "c2", "edge").await.unwrap();

        let resources = Arc::new(ResourceClient::new(db.clone()));
        let customizations = Arc::new(CustomizationClient::new(db));
        let engine = GenericAction::new(
            contexts.clone(),
            resources.clone(),
            customizations.clone(),
            registry.clone(),
        );
        Self {
            contexts,
            resources,
            customizations,
            engine,
        }
    }

    fn dig() -> Dig {
        Dig::new("p", "ca", "v1", "dig")
    }

    /// Creates a context where app `a1` is deployed to every cluster.
    async fn context(&self) -> AppContext {
        let ctx = AppContext::create(self.contexts.clone());
        let root = ctx.create_composite_app().await.unwrap();
        ctx.add_composite_app_meta(&CompositeAppMeta {
            project: "p".to_string(),
            composite_app: "ca".to_string(),
            version: "v1".to_string(),
            deployment_intent_group: "dig".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        let app = ctx.add_app(&root, "a1").await.unwrap();
        for cluster in CLUSTERS {
            let handle = ctx.add_cluster(&app, cluster).await.unwrap();
            ctx.add_instruction(&handle, &ResourceOrder::default())
                .await
                .unwrap();
        }
        ctx
    }

    async fn add_resource(&self, kind: &str, new_object: bool, template: &str) {
        let resource = Resource {
            metadata: Metadata::named("r1"),
            spec: ResourceSpec {
                app_name: "a1".to_string(),
                new_object: new_object.to_string(),
                resource_gvk: ResourceGvk {
                    api_version: if kind == "Deployment" { "apps/v1" } else { "v1" }.to_string(),
                    kind: kind.to_string(),
                    name: if kind == "Deployment" { "web" } else { "cm1" }.to_string(),
                },
            },
        };
        let content = ResourceContent {
            content: STANDARD.encode(template),
        };
        self.resources
            .create(resource, content, &Self::dig(), "gk1", true)
            .await
            .unwrap();
    }

    async fn add_customization(&self, spec: CustomizationSpec, files: Vec<Content>) {
        let customization = Customization {
            metadata: Metadata::named("c1"),
            spec,
        };
        self.customizations
            .create(
                customization,
                CustomizationContent { content: files },
                &Self::dig(),
                "gk1",
                "r1",
                false,
            )
            .await
            .unwrap();
    }
}

fn config_file() -> Vec<Content> {
    vec![Content {
        file_name: "app.conf".to_string(),
        content: STANDARD.encode("level=info"),
        key_name: String::new(),
    }]
}

fn label_scope(mode: &str) -> CustomizationSpec {
    CustomizationSpec {
        cluster_specific: "true".to_string(),
        cluster_info: ClusterInfo {
            scope: "label".to_string(),
            cluster_provider: "p1".to_string(),
            cluster_label: "edge".to_string(),
            mode: mode.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn clusters_with(ctx: &AppContext, resource: &str) -> Vec<&'static str> {
    let mut found = vec![];
    for cluster in CLUSTERS {
        if ctx.get_resource_handle("a1", cluster, resource).await.is_ok() {
            found.push(cluster);
        }
    }
    found
}

#[tokio::test]
async fn non_specific_customizations_target_every_cluster() {
    let fixture = Fixture::new().await;
    fixture.add_resource("ConfigMap", true, "").await;
    fixture
        .add_customization(CustomizationSpec::default(), config_file())
        .await;
    let ctx = fixture.context().await;

    fixture
        .engine
        .update_app_context("gk1", ctx.id())
        .await
        .unwrap();

    assert_eq!(clusters_with(&ctx, "cm1+ConfigMap").await, CLUSTERS.to_vec());
    for cluster in CLUSTERS {
        let handle = ctx
            .get_resource_handle("a1", cluster, "cm1+ConfigMap")
            .await
            .unwrap();
        let manifest = ctx.get_resource_value(&handle).await.unwrap();
        assert_eq!(
            yaml_to_json(manifest.as_bytes()).unwrap()["data"],
            json!({"app.conf": "level=info"})
        );
        assert_eq!(
            ctx.get_resource_instruction("a1", cluster)
                .await
                .unwrap()
                .resources,
            vec!["cm1+ConfigMap".to_string()]
        );
    }
}

#[tokio::test]
async fn label_scope_requires_allow_mode() {
    let fixture = Fixture::new().await;
    fixture.add_resource("ConfigMap", true, "").await;
    fixture
        .add_customization(label_scope("allow"), config_file())
        .await;
    let ctx = fixture.context().await;
    fixture
        .engine
        .update_app_context("gk1", ctx.id())
        .await
        .unwrap();
    assert_eq!(clusters_with(&ctx, "cm1+ConfigMap").await, vec!["p1+c2"]);

    fixture
        .add_customization(label_scope("deny"), config_file())
        .await;
    let ctx = fixture.context().await;
    fixture
        .engine
        .update_app_context("gk1", ctx.id())
        .await
        .unwrap();
    assert!(clusters_with(&ctx, "cm1+ConfigMap").await.is_empty());
}

#[tokio::test]
async fn name_scope_selects_one_cluster() {
    let fixture = Fixture::new().await;
    fixture.add_resource("ConfigMap", true, "").await;
    let spec = CustomizationSpec {
        cluster_specific: "True".to_string(),
        cluster_info: ClusterInfo {
            scope: "name".to_string(),
            cluster_provider: "p1".to_string(),
            cluster_name: "c3".to_string(),
            mode: "allow".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    fixture.add_customization(spec, config_file()).await;
    let ctx = fixture.context().await;

    fixture
        .engine
        .update_app_context("gk1", ctx.id())
        .await
        .unwrap();
    assert_eq!(clusters_with(&ctx, "cm1+ConfigMap").await, vec!["p1+c3"]);
}

#[tokio::test]
async fn create_is_deterministic() {
    let fixture = Fixture::new().await;
    fixture.add_resource("ConfigMap", true, "").await;
    let files = ["z.conf", "a.conf", "m.conf"]
        .into_iter()
        .map(|name| Content {
            file_name: name.to_string(),
            content: STANDARD.encode(name),
            key_name: String::new(),
        })
        .collect();
    fixture
        .add_customization(CustomizationSpec::default(), files)
        .await;

    let mut manifests = vec![];
    for _ in 0..2 {
        let ctx = fixture.context().await;
        fixture
            .engine
            .update_app_context("gk1", ctx.id())
            .await
            .unwrap();
        let handle = ctx
            .get_resource_handle("a1", "p1+c1", "cm1+ConfigMap")
            .await
            .unwrap();
        manifests.push(ctx.get_resource_value(&handle).await.unwrap());
    }
    assert_eq!(manifests[0], manifests[1]);
}

#[tokio::test]
async fn reapplying_repeats_order_entries() {
    let fixture = Fixture::new().await;
    fixture.add_resource("ConfigMap", true, "").await;
    fixture
        .add_customization(CustomizationSpec::default(), config_file())
        .await;
    let ctx = fixture.context().await;

    for _ in 0..2 {
        fixture
            .engine
            .update_app_context("gk1", ctx.id())
            .await
            .unwrap();
    }
    assert_eq!(
        ctx.get_resource_instruction("a1", "p1+c1")
            .await
            .unwrap()
            .resources,
        vec!["cm1+ConfigMap".to_string(), "cm1+ConfigMap".to_string()]
    );
}

#[tokio::test]
async fn update_patches_existing_resources() {
    let fixture = Fixture::new().await;
    fixture.add_resource("Deployment", false, DEPLOYMENT).await;
    let spec = CustomizationSpec {
        patch_type: "json".to_string(),
        patch_json: vec![json!({"op": "replace", "path": "/spec/replicas", "value": 5})
            .as_object()
            .cloned()
            .unwrap()],
        ..Default::default()
    };
    fixture.add_customization(spec, vec![]).await;

    // Only c1 carries the deployment; the other clusters are skipped.
    let ctx = fixture.context().await;
    let cluster = ctx.get_cluster_handle("a1", "p1+c1").await.unwrap();
    ctx.add_resource(&cluster, "web+Deployment", DEPLOYMENT)
        .await
        .unwrap();

    fixture
        .engine
        .update_app_context("gk1", ctx.id())
        .await
        .unwrap();

    let handle = ctx
        .get_resource_handle("a1", "p1+c1", "web+Deployment")
        .await
        .unwrap();
    let manifest = ctx.get_resource_value(&handle).await.unwrap();
    assert_eq!(yaml_to_json(manifest.as_bytes()).unwrap()["spec"]["replicas"], 5);
    assert_eq!(clusters_with(&ctx, "web+Deployment").await, vec!["p1+c1"]);
}

#[tokio::test]
async fn update_requires_patch_type() {
    let fixture = Fixture::new().await;
    fixture.add_resource("Deployment", false, DEPLOYMENT).await;
    fixture
        .add_customization(CustomizationSpec::default(), vec![])
        .await;
    let ctx = fixture.context().await;

    let err = fixture
        .engine
        .update_app_context("gk1", ctx.id())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "patch type not defined");
}

#[tokio::test]
async fn unknown_context_fails() {
    let fixture = Fixture::new().await;
    let err = fixture
        .engine
        .update_app_context("gk1", "1234")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(err.to_string().starts_with("failed to load appContext"));
}
