use super::{resolve::embedded_url, ObjectKind, ValueResolver};
use crate::k8s_error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use orchestrator_core::{Error, Result};
use orchestrator_intents::generic::{CustomizationContent, CustomizationSpec, ResourceGvk};
use orchestrator_k8s_api::{json_to_yaml, merge::strategic_merge, yaml_to_json};
use serde_json::{Map, Value};

/// Applies a customization's patch to a manifest.
pub(super) struct Patcher<'a> {
    pub(super) resolver: &'a dyn ValueResolver,
    pub(super) gvk: &'a ResourceGvk,
    pub(super) kind: ObjectKind,
    pub(super) spec: &'a CustomizationSpec,
    pub(super) files: &'a CustomizationContent,
}

// === impl Patcher ===

impl Patcher<'_> {
    /// Patches the YAML `original` according to the customization's patch type.
    pub(super) async fn apply(&self, original: &str) -> Result<String> {
        match self.spec.patch_type.to_lowercase().as_str() {
            "json" => self.json_patch(original).await,
            "merge" => self.merge_patch(original),
            _ => Err(Error::validation("patch type not supported")),
        }
    }

    async fn json_patch(&self, original: &str) -> Result<String> {
        if self.spec.patch_json.is_empty() {
            tracing::error!(kind = ?self.kind, "invalid json patch");
            return Err(Error::validation("invalid json patch"));
        }

        let ops = self.resolve_values().await?;
        let patch: json_patch::Patch = serde_json::from_value(Value::Array(ops))
            .map_err(|error| Error::validation(format!("invalid json patch: {error}")))?;

        let mut doc = yaml_to_json(original.as_bytes()).map_err(k8s_error)?;
        json_patch::patch(&mut doc, &patch).map_err(|error| {
            Error::validation(format!("failed to apply the json patch: {error}"))
        })?;
        json_to_yaml(&doc).map_err(k8s_error)
    }

    /// Replaces `$(http...)$` values with the value served at the embedded URL. Every operation is
    /// resolved before failing, so the error lists every unresolvable value.
    async fn resolve_values(&self) -> Result<Vec<Value>> {
        let info = &self.spec.cluster_info;
        let mut errors = Vec::new();
        let mut ops = Vec::with_capacity(self.spec.patch_json.len());
        for op in &self.spec.patch_json {
            let mut op: Map<String, Value> = op.clone();
            let url = op.get("value").and_then(Value::as_str).and_then(|value| {
                embedded_url(value, &info.cluster_provider, &info.cluster_name)
            });
            if let Some(url) = url {
                match self.resolver.resolve(&url).await {
                    Ok(value) => {
                        op.insert("value".to_string(), value);
                    }
                    Err(error) => {
                        tracing::error!(%url, %error, "Failed to resolve patch value");
                        errors.push(error.to_string());
                    }
                }
            }
            ops.push(Value::Object(op));
        }

        if errors.is_empty() {
            Ok(ops)
        } else {
            Err(Error::validation(errors.join("\n")))
        }
    }

    fn merge_patch(&self, original: &str) -> Result<String> {
        if self.files.content.is_empty() {
            return Err(Error::validation("no patch file"));
        }

        let mut doc = yaml_to_json(original.as_bytes()).map_err(k8s_error)?;
        for file in &self.files.content {
            let is_patch = match self.kind {
                ObjectKind::ConfigMap => self.spec.config_map_options.is_merge_patch(&file.file_name),
                ObjectKind::Secret => self.spec.secret_options.is_merge_patch(&file.file_name),
                ObjectKind::Other => true,
            };
            if !is_patch || file.content.is_empty() {
                continue;
            }

            let patch = yaml_to_json(&decode(&file.content)?).map_err(k8s_error)?;
            doc = strategic_merge(&self.gvk.api_version, &self.gvk.kind, &doc, &patch)
                .map_err(k8s_error)?;
        }
        json_to_yaml(&doc).map_err(k8s_error)
    }
}

pub(super) fn decode(content: &str) -> Result<Vec<u8>> {
    STANDARD.decode(content).map_err(|error| {
        tracing::error!(%error, "Failed to decode the base64 string");
        Error::validation(format!("failed to decode the base64 string: {error}"))
    })
}
