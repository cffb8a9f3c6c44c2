//! Applies generic Kubernetes resources to an AppContext.
//!
//! A [`GenericK8sIntent`](orchestrator_intents::generic::GenericK8sIntent) holds resources, each
//! with customizations. A new object is built from the resource's template (or synthesised, for a
//! ConfigMap or Secret), filled from the customization's files and patched, then added to every
//! cluster the customization targets. An existing object is looked up on each targeted cluster and
//! patched in place.

mod patch;
mod resolve;
#[cfg(test)]
mod tests;

pub use self::resolve::{HttpValueResolver, ValueResolver};

use self::patch::{decode, Patcher};
use crate::{k8s_error, split_cluster};
use orchestrator_core::{resource_name, AppContext, ContextDb, Error, Result};
use orchestrator_intents::{
    generic::{Customization, CustomizationContent, CustomizationManager, Resource, ResourceManager},
    ClusterRegistry, Dig,
};
use orchestrator_k8s_api::{configmap, secret, to_yaml};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Object kinds whose manifests are built from customization files.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ObjectKind {
    ConfigMap,
    Secret,
    Other,
}

pub struct GenericAction {
    contexts: Arc<dyn ContextDb>,
    resources: Arc<dyn ResourceManager>,
    customizations: Arc<dyn CustomizationManager>,
    clusters: Arc<dyn ClusterRegistry>,
    resolver: Arc<dyn ValueResolver>,
}

/// One customization of one resource, being applied.
struct Apply<'a> {
    ctx: &'a AppContext,
    resource: &'a Resource,
    kind: ObjectKind,
    customization: &'a Customization,
    files: CustomizationContent,
}

// === impl ObjectKind ===

impl ObjectKind {
    fn of(kind: &str) -> Self {
        match kind.to_lowercase().as_str() {
            "configmap" => Self::ConfigMap,
            "secret" => Self::Secret,
            _ => Self::Other,
        }
    }

    /// ConfigMaps and Secrets are built from the customization's files.
    fn has_files(&self) -> bool {
        matches!(self, Self::ConfigMap | Self::Secret)
    }
}

// === impl GenericAction ===

impl GenericAction {
    pub fn new(
        contexts: Arc<dyn ContextDb>,
        resources: Arc<dyn ResourceManager>,
        customizations: Arc<dyn CustomizationManager>,
        clusters: Arc<dyn ClusterRegistry>,
    ) -> Self {
        Self {
            contexts,
            resources,
            customizations,
            clusters,
            resolver: Arc::new(HttpValueResolver::default()),
        }
    }

    /// Overrides how `$(http...)$` JSON patch values are resolved.
    pub fn with_resolver(mut self, resolver: Arc<dyn ValueResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Applies every resource of `intent` to the AppContext `app_context_id`.
    #[instrument(skip(self), fields(context = %app_context_id))]
    pub async fn update_app_context(&self, intent: &str, app_context_id: &str) -> Result<()> {
        info!("Begin app context update");
        let ctx = AppContext::load(self.contexts.clone(), app_context_id)
            .await
            .map_err(|error| error.context("failed to load appContext"))?;
        let meta = ctx
            .get_composite_app_meta()
            .await
            .map_err(|error| error.context("failed to get compositeApp meta"))?;
        let dig = Dig::from(&meta);

        let resources = self.resources.get_all(&dig, intent).await?;
        for resource in &resources {
            self.apply_resource(&ctx, &dig, intent, resource).await?;
        }
        Ok(())
    }

    async fn apply_resource(
        &self,
        ctx: &AppContext,
        dig: &Dig,
        intent: &str,
        resource: &Resource,
    ) -> Result<()> {
        let name = &resource.metadata.name;
        let kind = ObjectKind::of(&resource.spec.resource_gvk.kind);
        let content = self.resources.get_content(name, dig, intent).await?;

        let customizations = self.customizations.get_all(dig, intent, name).await?;
        if customizations.is_empty() {
            warn!(resource = %name, "No customization is available for the resource");
        }

        for customization in &customizations {
            let files = if kind.has_files() || customization.spec.patch_type == "merge" {
                self.customizations
                    .get_content(&customization.metadata.name, dig, intent, name)
                    .await?
            } else {
                CustomizationContent::default()
            };
            let apply = Apply {
                ctx,
                resource,
                kind,
                customization,
                files,
            };

            if resource.spec.is_new_object() {
                let manifest = apply.new_manifest(&content.content)?;
                let manifest = if apply.spec().patch_type.is_empty() {
                    manifest
                } else {
                    apply.patcher(&*self.resolver).apply(&manifest).await?
                };
                self.create(&apply, &manifest).await?;
            } else {
                self.update(&apply).await?;
            }
        }
        Ok(())
    }

    /// Adds the manifest to every targeted cluster and appends it to the cluster's resource order.
    async fn create(&self, apply: &Apply<'_>, manifest: &str) -> Result<()> {
        let app = &apply.resource.spec.app_name;
        let name = apply.resource_name();
        for cluster in apply.ctx.get_cluster_names(app).await? {
            if !self.selects(apply, &cluster).await? {
                continue;
            }

            let handle = apply.ctx.get_cluster_handle(app, &cluster).await?;
            apply.ctx.add_resource(&handle, &name, manifest).await?;
            let mut order = apply.ctx.get_resource_instruction(app, &cluster).await?;
            order.push(&name);
            apply.ctx.add_instruction(&handle, &order).await?;
            info!(%app, %cluster, resource = %name, "Resource added to appContext");
        }
        Ok(())
    }

    /// Patches the existing resource on every targeted cluster.
    ///
    /// Clusters where the resource cannot be found or read are skipped.
    async fn update(&self, apply: &Apply<'_>) -> Result<()> {
        if apply.spec().patch_type.is_empty() {
            return Err(Error::validation("patch type not defined"));
        }

        let app = &apply.resource.spec.app_name;
        let name = apply.resource_name();
        let patcher = apply.patcher(&*self.resolver);
        for cluster in apply.ctx.get_cluster_names(app).await? {
            if !self.selects(apply, &cluster).await? {
                continue;
            }

            let handle = match apply.ctx.get_resource_handle(app, &cluster, &name).await {
                Ok(handle) => handle,
                Err(error) => {
                    warn!(%app, %cluster, resource = %name, %error, "Failed to get resource handle");
                    continue;
                }
            };
            let value = match apply.ctx.get_resource_value(&handle).await {
                Ok(value) => value,
                Err(error) => {
                    warn!(%handle, %error, "Failed to get handle value");
                    continue;
                }
            };

            let patched = patcher.apply(&value).await?;
            apply.ctx.update_resource_value(&handle, &patched).await?;
            info!(%app, %cluster, resource = %name, "Resource updated in appContext");
        }
        Ok(())
    }

    /// Returns true if the customization applies to `cluster`.
    ///
    /// Cluster-specific customizations select clusters by label or by name, and only when their
    /// mode is `allow`.
    async fn selects(&self, apply: &Apply<'_>, cluster: &str) -> Result<bool> {
        let spec = apply.spec();
        if !spec.is_cluster_specific() {
            return Ok(true);
        }

        let info = &spec.cluster_info;
        let allow = info.mode.eq_ignore_ascii_case("allow");
        let (_, name) = split_cluster(cluster);
        match info.scope.to_lowercase().as_str() {
            "label" => {
                let labelled = self
                    .clusters
                    .clusters_with_label(&info.cluster_provider, &info.cluster_label)
                    .await
                    .map_err(|error| {
                        error.context("Failed to get clusters by the provider and label")
                    })?;
                Ok(allow && labelled.iter().any(|c| c == name))
            }
            "name" => {
                let clusters = self
                    .clusters
                    .clusters(&info.cluster_provider)
                    .await
                    .map_err(|error| error.context("Failed to get clusters by the provider"))?;
                Ok(allow && name == info.cluster_name && clusters.iter().any(|c| c == name))
            }
            _ => Ok(true),
        }
    }
}

// === impl Apply ===

impl Apply<'_> {
    fn spec(&self) -> &orchestrator_intents::generic::CustomizationSpec {
        &self.customization.spec
    }

    fn resource_name(&self) -> String {
        let gvk = &self.resource.spec.resource_gvk;
        resource_name(&gvk.name, &gvk.kind)
    }

    fn patcher<'a>(&'a self, resolver: &'a dyn ValueResolver) -> Patcher<'a> {
        Patcher {
            resolver,
            gvk: &self.resource.spec.resource_gvk,
            kind: self.kind,
            spec: &self.customization.spec,
            files: &self.files,
        }
    }

    /// Builds the manifest of a new object from the base64 `template`.
    fn new_manifest(&self, template: &str) -> Result<String> {
        let name = &self.resource.spec.resource_gvk.name;
        match self.kind {
            ObjectKind::ConfigMap => {
                let template = decode(template)?;
                let mut cm =
                    configmap::from_template(Some(&template), name).map_err(k8s_error)?;
                let options = &self.spec().config_map_options;
                for file in &self.files.content {
                    if options.is_merge_patch(&file.file_name) {
                        continue;
                    }
                    let data = String::from_utf8(decode(&file.content)?).map_err(|error| {
                        Error::validation(format!(
                            "{} is not valid ConfigMap data: {error}",
                            file.file_name
                        ))
                    })?;
                    configmap::insert_data(&mut cm, options.key_name(file), data)
                        .map_err(k8s_error)?;
                }
                to_yaml(&cm).map_err(k8s_error)
            }

            ObjectKind::Secret => {
                let template = decode(template)?;
                let mut secret = secret::from_template(Some(&template), name).map_err(k8s_error)?;
                let options = &self.spec().secret_options;
                for file in &self.files.content {
                    if options.is_merge_patch(&file.file_name) {
                        continue;
                    }
                    secret::insert_data(&mut secret, options.key_name(file), decode(&file.content)?)
                        .map_err(k8s_error)?;
                }
                to_yaml(&secret).map_err(k8s_error)
            }

            ObjectKind::Other => {
                if template.is_empty() {
                    tracing::error!(resource = %self.resource.metadata.name, "resources content is empty");
                    return Err(Error::validation("resources content is empty"));
                }
                String::from_utf8(decode(template)?).map_err(|error| {
                    Error::validation(format!("resource template is not UTF-8: {error}"))
                })
            }
        }
    }
}
