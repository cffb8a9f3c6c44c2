//! Strategic merge patches.
//!
//! Objects merge field by field and a `null` patch value deletes a field. Lists of named elements
//! (containers, env, volumes, ports, ...) merge element-wise on their merge key. Every other list
//! is replaced. The `$patch: replace` and `$patch: delete` directives are honored on objects and
//! on merge-keyed list elements.
//!
//! The merged document must decode as the typed resource for its GVK, so patches are only accepted
//! for resources with a known schema.

use crate::{Error, Result};
use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        batch::v1::{CronJob, Job},
        core::v1::{
            ConfigMap, Namespace, PersistentVolumeClaim, Pod, ReplicationController, Secret,
            Service, ServiceAccount,
        },
        networking::v1::{Ingress, NetworkPolicy},
        rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
    },
    Resource,
};
use serde_json::{Map, Value};

const DIRECTIVE: &str = "$patch";

macro_rules! typed_resources {
    ($($ty:ty),+ $(,)?) => {
        /// Returns true if a typed schema is known for the GVK.
        pub fn is_known(api_version: &str, kind: &str) -> bool {
            $(
                if api_version == <$ty as Resource>::API_VERSION && kind == <$ty as Resource>::KIND {
                    return true;
                }
            )+
            false
        }

        /// Decodes `value` as the typed resource and encodes it again, dropping unknown fields.
        fn normalize(api_version: &str, kind: &str, value: Value) -> Result<Value> {
            $(
                if api_version == <$ty as Resource>::API_VERSION && kind == <$ty as Resource>::KIND {
                    let obj: $ty = serde_json::from_value(value)?;
                    return Ok(serde_json::to_value(obj)?);
                }
            )+
            Err(unknown(api_version, kind))
        }
    };
}

typed_resources!(
    ConfigMap,
    Secret,
    Pod,
    Service,
    ServiceAccount,
    Namespace,
    PersistentVolumeClaim,
    ReplicationController,
    Deployment,
    DaemonSet,
    ReplicaSet,
    StatefulSet,
    Job,
    CronJob,
    Ingress,
    NetworkPolicy,
    Role,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
);

/// Applies a strategic merge `patch` to `original`, both JSON documents of the given GVK.
pub fn strategic_merge(
    api_version: &str,
    kind: &str,
    original: &Value,
    patch: &Value,
) -> Result<Value> {
    if !is_known(api_version, kind) {
        return Err(unknown(api_version, kind));
    }

    let mut merged = original.clone();
    merge_value(&mut merged, patch);
    normalize(api_version, kind, merged)
}

fn unknown(api_version: &str, kind: &str) -> Error {
    Error::UnknownGvk {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
    }
}

/// Candidate merge keys for lists that merge element-wise, by field name.
fn merge_keys(field: &str) -> &'static [&'static str] {
    match field {
        "containers" | "initContainers" | "ephemeralContainers" | "env" | "volumes"
        | "imagePullSecrets" => &["name"],
        "volumeMounts" => &["mountPath"],
        "volumeDevices" => &["devicePath"],
        "ports" => &["containerPort", "port"],
        "hostAliases" => &["ip"],
        _ => &[],
    }
}

fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => merge_object(target, patch),
        (target, patch) => *target = strip_directives(patch),
    }
}

fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    if directive(patch) == Some("replace") {
        *target = strip_map(patch);
        return;
    }

    for (field, value) in patch {
        if field.starts_with('$') {
            continue;
        }
        match value {
            Value::Null => {
                target.remove(field);
            }
            Value::Object(obj) if directive(obj) == Some("delete") => {
                target.remove(field);
            }
            Value::Array(items) => match target.get_mut(field) {
                Some(Value::Array(existing)) if !merge_keys(field).is_empty() => {
                    merge_list(existing, items, merge_keys(field));
                }
                _ => {
                    target.insert(field.clone(), strip_directives(value));
                }
            },
            _ => match target.get_mut(field) {
                Some(existing) => merge_value(existing, value),
                None => {
                    target.insert(field.clone(), strip_directives(value));
                }
            },
        }
    }
}

fn merge_list(target: &mut Vec<Value>, patch: &[Value], keys: &[&str]) {
    for item in patch {
        let Some(obj) = item.as_object() else {
            *target = patch.iter().map(strip_directives).collect();
            return;
        };
        let Some((key, id)) = keys
            .iter()
            .find_map(|k| obj.get(*k).map(|id| (*k, id)))
        else {
            target.push(strip_directives(item));
            continue;
        };

        let pos = target.iter().position(|t| t.get(key) == Some(id));
        match (pos, directive(obj)) {
            (Some(pos), Some("delete")) => {
                target.remove(pos);
            }
            (None, Some("delete")) => {}
            (Some(pos), Some("replace")) => target[pos] = strip_directives(item),
            (Some(pos), _) => merge_value(&mut target[pos], item),
            (None, _) => target.push(strip_directives(item)),
        }
    }
}

fn directive(obj: &Map<String, Value>) -> Option<&str> {
    obj.get(DIRECTIVE).and_then(Value::as_str)
}

fn strip_map(obj: &Map<String, Value>) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, v)| !k.starts_with('$') && !v.is_null())
        .map(|(k, v)| (k.clone(), strip_directives(v)))
        .collect()
}

fn strip_directives(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(strip_map(obj)),
        Value::Array(items) => Value::Array(items.iter().map(strip_directives).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn deployment() -> Value {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "labels": {"app": "web", "tier": "fe"}},
            "spec": {
                "selector": {"matchLabels": {"app": "web"}},
                "template": {
                    "metadata": {"labels": {"app": "web"}},
                    "spec": {
                        "containers": [
                            {
                                "name": "web",
                                "image": "nginx:1.19",
                                "env": [{"name": "A", "value": "1"}],
                                "ports": [{"containerPort": 80}],
                            },
                            {"name": "sidecar", "image": "envoy:1"},
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn merges_containers_by_name() {
        let patch = json!({
            "metadata": {"labels": {"tier": null}},
            "spec": {"template": {"spec": {"containers": [
                {"name": "web", "image": "nginx:1.21", "env": [{"name": "B", "value": "2"}]},
                {"name": "sidecar", "$patch": "delete"},
                {"name": "logger", "image": "fluentd:1"},
            ]}}}
        });
        let merged = strategic_merge("apps/v1", "Deployment", &deployment(), &patch).unwrap();

        assert_eq!(merged["metadata"]["labels"], json!({"app": "web"}));
        let containers = &merged["spec"]["template"]["spec"]["containers"];
        assert_eq!(containers.as_array().unwrap().len(), 2);
        assert_eq!(containers[0]["image"], "nginx:1.21");
        assert_eq!(
            containers[0]["env"],
            json!([{"name": "A", "value": "1"}, {"name": "B", "value": "2"}])
        );
        assert_eq!(containers[0]["ports"], json!([{"containerPort": 80}]));
        assert_eq!(containers[1]["name"], "logger");
    }

    #[test]
    fn replaces_unkeyed_lists_and_replace_directive() {
        let patch = json!({
            "spec": {
                "selector": {"$patch": "replace", "matchLabels": {"app": "api"}},
                "template": {"spec": {"containers": [
                    {"name": "web", "args": ["--port", "8080"]},
                ]}}
            }
        });
        let merged = strategic_merge("apps/v1", "Deployment", &deployment(), &patch).unwrap();
        assert_eq!(merged["spec"]["selector"], json!({"matchLabels": {"app": "api"}}));
        assert_eq!(
            merged["spec"]["template"]["spec"]["containers"][0]["args"],
            json!(["--port", "8080"])
        );
    }

    #[test]
    fn merges_configmap_data() {
        let original = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "cm"},
            "data": {"a": "1", "b": "2"},
        });
        let patch = json!({"data": {"b": "3", "c": "4"}});
        let merged = strategic_merge("v1", "ConfigMap", &original, &patch).unwrap();
        assert_eq!(merged["data"], json!({"a": "1", "b": "3", "c": "4"}));
    }

    #[test]
    fn unknown_gvk_fails() {
        let err = strategic_merge("example.com/v1", "Widget", &json!({}), &json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownGvk { .. }), "{err}");
    }
}
