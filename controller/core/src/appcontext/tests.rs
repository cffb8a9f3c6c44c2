use super::*;
use pretty_assertions::assert_eq;

async fn context() -> (AppContext, CompositeAppHandle) {
    let ctx = AppContext::create(Arc::new(MemContextDb::new()));
    let root = ctx.create_composite_app().await.unwrap();
    (ctx, root)
}

#[tokio::test]
async fn load_requires_existing_context() {
    let db: Arc<dyn ContextDb> = Arc::new(MemContextDb::new());
    let err = AppContext::load(db.clone(), "1234").await.unwrap_err();
    assert!(err.is_not_found(), "{err}");

    let ctx = AppContext::create(db.clone());
    ctx.create_composite_app().await.unwrap();
    ctx.add_composite_app_meta(&CompositeAppMeta {
        project: "p".to_string(),
        composite_app: "ca".to_string(),
        version: "v1".to_string(),
        deployment_intent_group: "dig".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    let loaded = AppContext::load(db, ctx.id()).await.unwrap();
    let meta = loaded.get_composite_app_meta().await.unwrap();
    assert_eq!(meta.project, "p");
    assert_eq!(meta.deployment_intent_group, "dig");
}

#[tokio::test]
async fn meta_uses_pascal_case() {
    let meta = CompositeAppMeta {
        project: "p".to_string(),
        ..Default::default()
    };
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["Project"], "p");
    assert_eq!(json["DeploymentIntentGroup"], "");
}

#[tokio::test]
async fn cluster_names_skip_nested_levels() {
    let (ctx, root) = context().await;
    let app = ctx.add_app(&root, "a1").await.unwrap();

    let err = ctx.get_cluster_names("a1").await.unwrap_err();
    assert_eq!(err.to_string(), "Cluster list is empty");

    for cluster in ["p+c2", "p+c1"] {
        let ch = ctx.add_cluster(&app, cluster).await.unwrap();
        ctx.add_resource(&ch, "r+Deployment", "kind: Deployment")
            .await
            .unwrap();
        ctx.add_instruction(&ch, &ResourceOrder::default())
            .await
            .unwrap();
    }

    assert_eq!(
        ctx.get_cluster_names("a1").await.unwrap(),
        vec!["p+c1".to_string(), "p+c2".to_string()]
    );
    assert_eq!(
        ctx.get_resource_names("a1", "p+c1").await.unwrap(),
        vec!["r+Deployment".to_string()]
    );
}

#[tokio::test]
async fn handle_lookups() {
    let (ctx, root) = context().await;
    let app = ctx.add_app(&root, "a1").await.unwrap();
    let cluster = ctx.add_cluster(&app, "p+c1").await.unwrap();

    assert_eq!(ctx.get_app_handle("a1").await.unwrap(), app);
    assert_eq!(
        ctx.get_app_handle("a2").await.unwrap_err().to_string(),
        "No handle was found for the given app"
    );
    assert_eq!(ctx.get_cluster_handle("a1", "p+c1").await.unwrap(), cluster);
    assert_eq!(
        ctx.get_cluster_handle("a1", "p+c9")
            .await
            .unwrap_err()
            .to_string(),
        "No handle was found for the given cluster"
    );
    assert_eq!(
        ctx.get_resource_handle("a1", "p+c1", "r+Pod")
            .await
            .unwrap_err()
            .to_string(),
        "No handle was found for the given resource"
    );
    assert!(matches!(
        ctx.get_cluster_handle("", "p+c1").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn resource_values_update_in_place() {
    let (ctx, root) = context().await;
    let app = ctx.add_app(&root, "a1").await.unwrap();
    let cluster = ctx.add_cluster(&app, "p+c1").await.unwrap();
    let res = ctx.add_resource(&cluster, "cm+ConfigMap", "v1").await.unwrap();

    ctx.update_resource_value(&res, "v2").await.unwrap();
    let handle = ctx
        .get_resource_handle("a1", "p+c1", "cm+ConfigMap")
        .await
        .unwrap();
    assert_eq!(ctx.get_resource_value(&handle).await.unwrap(), "v2");
}

#[tokio::test]
async fn instructions_are_json_strings() {
    let (ctx, root) = context().await;
    let app = ctx.add_app(&root, "a1").await.unwrap();
    let cluster = ctx.add_cluster(&app, "p+c1").await.unwrap();

    let mut apps = AppOrder::default();
    apps.push("a1");
    let handle = ctx.add_instruction(&root, &apps).await.unwrap();
    assert_eq!(
        ctx.get_value(&handle).await.unwrap(),
        Value::String(r#"{"apporder":["a1"]}"#.to_string())
    );

    let mut resources = ResourceOrder::default();
    resources.push("r+Pod");
    resources.push("r+Pod");
    ctx.add_instruction(&cluster, &resources).await.unwrap();
    assert_eq!(
        ctx.get_resource_instruction("a1", "p+c1")
            .await
            .unwrap()
            .resources,
        vec!["r+Pod".to_string(), "r+Pod".to_string()]
    );
    assert_eq!(ctx.get_app_instruction().await.unwrap(), apps);
}

#[tokio::test]
async fn deletes_remove_subtrees() {
    let (ctx, root) = context().await;
    let app = ctx.add_app(&root, "a1").await.unwrap();
    let c1 = ctx.add_cluster(&app, "p+c1").await.unwrap();
    ctx.add_cluster(&app, "p+c2").await.unwrap();
    ctx.add_resource(&c1, "r+Pod", "").await.unwrap();

    ctx.delete_cluster(&c1).await.unwrap();
    assert_eq!(
        ctx.get_cluster_names("a1").await.unwrap(),
        vec!["p+c2".to_string()]
    );

    ctx.delete_app(&app).await.unwrap();
    assert!(ctx.get_app_handle("a1").await.is_err());

    ctx.delete_composite_app().await.unwrap();
    assert!(ctx.get_value(&root).await.unwrap_err().is_not_found());
}
