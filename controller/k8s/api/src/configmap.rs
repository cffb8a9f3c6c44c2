use crate::{yaml_to_json, Error, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use serde_json::Value;
use std::collections::BTreeMap;

const MAX_KEY_LEN: usize = 253;

/// Builds the base ConfigMap for a new resource.
///
/// A non-empty template must set `apiVersion`, `kind` and `metadata.name`. Without one, an empty
/// `v1` ConfigMap called `name` is returned.
pub fn from_template(template: Option<&[u8]>, name: &str) -> Result<ConfigMap> {
    let Some(template) = template.filter(|t| !t.is_empty()) else {
        return Ok(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::new()),
            ..Default::default()
        });
    };

    let mut value = yaml_to_json(template)?;
    validate_template(&value, "configmap")?;
    value["kind"] = Value::from("ConfigMap");
    let mut cm: ConfigMap = serde_json::from_value(value)?;
    cm.data.get_or_insert_with(BTreeMap::new);
    Ok(cm)
}

/// Adds a data entry, rejecting invalid and duplicate keys.
pub fn insert_data(cm: &mut ConfigMap, key: &str, value: String) -> Result<()> {
    let name = cm.metadata.name.as_deref().unwrap_or_default();
    validate_key(key, "ConfigMap", name)?;
    let data = cm.data.get_or_insert_with(BTreeMap::new);
    if data.contains_key(key) {
        return Err(duplicate_key(key, "ConfigMap", name));
    }
    data.insert(key.to_string(), value);
    Ok(())
}

/// Checks the fields every ConfigMap or Secret template must set. `kind` is lowercase.
pub(crate) fn validate_template(value: &Value, kind: &str) -> Result<()> {
    let mut errors = Vec::new();
    let field = |ptr: &str| {
        value
            .pointer(ptr)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if field("/apiVersion").is_empty() {
        errors.push(format!("apiVersion not set for {kind}"));
    }
    if !field("/kind").eq_ignore_ascii_case(kind) {
        errors.push(format!("kind not set for {kind}"));
    }
    if field("/metadata/name").is_empty() {
        errors.push(format!("{kind} name may not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Invalid(errors.join("\n")))
    }
}

/// Data keys must consist of alphanumerics, `-`, `_` or `.`.
pub(crate) fn validate_key(key: &str, kind: &str, name: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && key != "."
        && key != ".."
        && !key.starts_with("..");
    if !valid {
        tracing::debug!(%key, %kind, %name, "Invalid data key");
        return Err(Error::Invalid(format!(
            "{key} is not a valid key name for a {kind}"
        )));
    }
    Ok(())
}

pub(crate) fn duplicate_key(key: &str, kind: &str, name: &str) -> Error {
    Error::Invalid(format!(
        "a key with the name {key} already exists in Data for {kind} {name}"
    ))
}
