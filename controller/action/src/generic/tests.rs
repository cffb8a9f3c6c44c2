use super::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use orchestrator_core::MemContextDb;
use orchestrator_intents::{
    generic::{
        ClusterInfo, Content, CustomizationSpec, KeyOptions, KindOptions, ResourceGvk, ResourceSpec,
    },
    Metadata,
};
use orchestrator_k8s_api::yaml_to_json;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.19
"#;

struct StaticResolver(HashMap<String, Value>);

#[async_trait::async_trait]
impl ValueResolver for StaticResolver {
    async fn resolve(&self, url: &str) -> Result<Value> {
        self.0.get(url).cloned().ok_or_else(|| {
            Error::downstream(
                format!("unexpected status code when reading patch value from {url}"),
                "response: 404 Not Found, code: 404",
            )
        })
    }
}

fn resolver() -> StaticResolver {
    StaticResolver(
        Some((
            "http://values.local/p1/c1/replicas".to_string(),
            json!(3),
        ))
        .into_iter()
        .collect(),
    )
}

fn resource(kind: &str, name: &str) -> Resource {
    Resource {
        metadata: Metadata::named(format!("{name}-resource")),
        spec: ResourceSpec {
            app_name: "a1".to_string(),
            new_object: "true".to_string(),
            resource_gvk: ResourceGvk {
                api_version: if kind == "Deployment" { "apps/v1" } else { "v1" }.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
            },
        },
    }
}

fn file(name: &str, content: &str) -> Content {
    Content {
        file_name: name.to_string(),
        content: STANDARD.encode(content),
        key_name: String::new(),
    }
}

fn op(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(op) => op,
        _ => unreachable!("patch operations are objects"),
    }
}

fn merge_option(file: &str) -> KindOptions {
    KindOptions {
        data_key_options: vec![KeyOptions {
            file_name: file.to_string(),
            merge_patch: "true".to_string(),
            ..Default::default()
        }],
    }
}

fn apply<'a>(
    ctx: &'a AppContext,
    resource: &'a Resource,
    customization: &'a Customization,
    files: Vec<Content>,
) -> Apply<'a> {
    Apply {
        ctx,
        resource,
        kind: ObjectKind::of(&resource.spec.resource_gvk.kind),
        customization,
        files: CustomizationContent { content: files },
    }
}

fn context() -> AppContext {
    AppContext::create(Arc::new(MemContextDb::new()))
}

#[test]
fn object_kinds() {
    assert_eq!(ObjectKind::of("ConfigMap"), ObjectKind::ConfigMap);
    assert_eq!(ObjectKind::of("secret"), ObjectKind::Secret);
    assert_eq!(ObjectKind::of("Deployment"), ObjectKind::Other);
    assert!(!ObjectKind::Other.has_files());
}

#[test]
fn synthesises_configmap_from_files() {
    let ctx = context();
    let resource = resource("ConfigMap", "cm1");
    let customization = Customization {
        metadata: Metadata::named("c1"),
        spec: CustomizationSpec {
            config_map_options: KindOptions {
                data_key_options: vec![
                    KeyOptions {
                        file_name: "settings.conf".to_string(),
                        key_name: "app.conf".to_string(),
                        ..Default::default()
                    },
                    KeyOptions {
                        file_name: "patch.yaml".to_string(),
                        merge_patch: "true".to_string(),
                        ..Default::default()
                    },
                ],
            },
            ..Default::default()
        },
    };
    let apply = apply(
        &ctx,
        &resource,
        &customization,
        vec![
            file("settings.conf", "level=debug"),
            file("info.json", "{}"),
            file("patch.yaml", "data:\n  extra: \"1\"\n"),
        ],
    );

    let manifest = apply.new_manifest("").unwrap();
    assert_eq!(
        yaml_to_json(manifest.as_bytes()).unwrap(),
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "cm1"},
            "data": {"app.conf": "level=debug", "info.json": "{}"},
        })
    );
}

#[test]
fn secret_keeps_encoded_data() {
    let ctx = context();
    let resource = resource("Secret", "s1");
    let customization = Customization::default();
    let template = STANDARD.encode("apiVersion: v1\nkind: Secret\nmetadata:\n  name: creds\n");
    let apply = apply(&ctx, &resource, &customization, vec![file("user", "admin")]);

    let manifest = apply.new_manifest(&template).unwrap();
    let secret = yaml_to_json(manifest.as_bytes()).unwrap();
    assert_eq!(secret["metadata"]["name"], "creds");
    assert_eq!(secret["type"], "Opaque");
    assert_eq!(secret["data"]["user"], STANDARD.encode("admin"));
}

#[test]
fn configmap_template_errors() {
    let ctx = context();
    let resource = resource("ConfigMap", "cm1");
    let customization = Customization::default();
    let apply = apply(&ctx, &resource, &customization, vec![]);

    let template = STANDARD.encode("kind: ConfigMap\nmetadata:\n  name: cm1\n");
    let err = apply.new_manifest(&template).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.to_string(), "apiVersion not set for configmap");

    let err = apply.new_manifest("not base64!").unwrap_err();
    assert!(err.to_string().starts_with("failed to decode the base64 string"), "{err}");
}

#[test]
fn other_kinds_require_a_template() {
    let ctx = context();
    let resource = resource("Deployment", "web");
    let customization = Customization::default();
    let apply = apply(&ctx, &resource, &customization, vec![]);

    let err = apply.new_manifest("").unwrap_err();
    assert_eq!(err.to_string(), "resources content is empty");
    assert_eq!(
        apply.new_manifest(&STANDARD.encode(DEPLOYMENT)).unwrap(),
        DEPLOYMENT
    );
}

#[tokio::test]
async fn json_patch_resolves_values() {
    let ctx = context();
    let resource = resource("Deployment", "web");
    let customization = Customization {
        metadata: Metadata::named("c1"),
        spec: CustomizationSpec {
            cluster_info: ClusterInfo {
                cluster_provider: "p1".to_string(),
                cluster_name: "c1".to_string(),
                ..Default::default()
            },
            patch_type: "json".to_string(),
            patch_json: vec![
                op(json!({
                    "op": "replace",
                    "path": "/spec/replicas",
                    "value": "$(http://values.local/{clusterProvider}/{cluster}/replicas)$",
                })),
                op(json!({
                    "op": "add",
                    "path": "/metadata/labels",
                    "value": {"tier": "fe"},
                })),
            ],
            ..Default::default()
        },
    };
    let apply = apply(&ctx, &resource, &customization, vec![]);
    let resolver = resolver();

    let patched = apply.patcher(&resolver).apply(DEPLOYMENT).await.unwrap();
    let patched = yaml_to_json(patched.as_bytes()).unwrap();
    assert_eq!(patched["spec"]["replicas"], 3);
    assert_eq!(patched["metadata"]["labels"], json!({"tier": "fe"}));
}

#[tokio::test]
async fn json_patch_collects_resolution_errors() {
    let ctx = context();
    let resource = resource("Deployment", "web");
    let customization = Customization {
        metadata: Metadata::named("c1"),
        spec: CustomizationSpec {
            patch_type: "json".to_string(),
            patch_json: vec![
                op(json!({"op": "replace", "path": "/spec/replicas", "value": "$(http://values.local/a)$"})),
                op(json!({"op": "replace", "path": "/spec/replicas", "value": "$(http://values.local/b)$"})),
            ],
            ..Default::default()
        },
    };
    let apply = apply(&ctx, &resource, &customization, vec![]);

    let err = apply
        .patcher(&resolver())
        .apply(DEPLOYMENT)
        .await
        .unwrap_err();
    let lines = err.to_string();
    let lines = lines.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2, "{lines:?}");
    assert!(lines[0].contains("http://values.local/a"));
    assert!(lines[1].contains("http://values.local/b"));
}

#[tokio::test]
async fn patch_type_errors() {
    let ctx = context();
    let resource = resource("Deployment", "web");
    let resolver = resolver();

    for (patch_type, expected) in [
        ("json", "invalid json patch"),
        ("merge", "no patch file"),
        ("strategic", "patch type not supported"),
    ] {
        let customization = Customization {
            metadata: Metadata::named("c1"),
            spec: CustomizationSpec {
                patch_type: patch_type.to_string(),
                ..Default::default()
            },
        };
        let apply = apply(&ctx, &resource, &customization, vec![]);
        let err = apply.patcher(&resolver).apply(DEPLOYMENT).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
        assert_eq!(err.to_string(), expected);
    }
}

#[tokio::test]
async fn merge_patch_uses_every_file_for_workloads() {
    let ctx = context();
    let resource = resource("Deployment", "web");
    let customization = Customization {
        metadata: Metadata::named("c1"),
        spec: CustomizationSpec {
            patch_type: "merge".to_string(),
            ..Default::default()
        },
    };
    let apply = apply(
        &ctx,
        &resource,
        &customization,
        vec![
            file("image.yaml", "spec:\n  template:\n    spec:\n      containers:\n        - name: web\n          image: nginx:1.21\n"),
            file("replicas.yaml", "spec:\n  replicas: 4\n"),
        ],
    );

    let patched = apply.patcher(&resolver()).apply(DEPLOYMENT).await.unwrap();
    let patched = yaml_to_json(patched.as_bytes()).unwrap();
    assert_eq!(patched["spec"]["replicas"], 4);
    assert_eq!(
        patched["spec"]["template"]["spec"]["containers"],
        json!([{"name": "web", "image": "nginx:1.21"}])
    );
}

#[tokio::test]
async fn merge_patch_only_uses_flagged_configmap_files() {
    let ctx = context();
    let resource = resource("ConfigMap", "cm1");
    let customization = Customization {
        metadata: Metadata::named("c1"),
        spec: CustomizationSpec {
            patch_type: "merge".to_string(),
            config_map_options: merge_option("patch.yaml"),
            ..Default::default()
        },
    };
    let apply = apply(
        &ctx,
        &resource,
        &customization,
        vec![
            file("data.txt", "data:\n  ignored: \"1\"\n"),
            file("patch.yaml", "data:\n  b: \"3\"\n"),
        ],
    );
    let original = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm1\ndata:\n  a: \"1\"\n";

    let patched = apply.patcher(&resolver()).apply(original).await.unwrap();
    assert_eq!(
        yaml_to_json(patched.as_bytes()).unwrap()["data"],
        json!({"a": "1", "b": "3"})
    );
}
