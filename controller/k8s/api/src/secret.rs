use crate::{
    configmap::{duplicate_key, validate_key, validate_template},
    yaml_to_json, Result,
};
use k8s_openapi::{api::core::v1::Secret, ByteString};
use kube::api::ObjectMeta;
use serde_json::Value;
use std::collections::BTreeMap;

const OPAQUE: &str = "Opaque";

/// Builds the base Secret for a new resource. The type defaults to `Opaque`.
pub fn from_template(template: Option<&[u8]>, name: &str) -> Result<Secret> {
    let Some(template) = template.filter(|t| !t.is_empty()) else {
        return Ok(Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            type_: Some(OPAQUE.to_string()),
            data: Some(BTreeMap::new()),
            ..Default::default()
        });
    };

    let mut value = yaml_to_json(template)?;
    validate_template(&value, "secret")?;
    value["kind"] = Value::from("Secret");
    let mut secret: Secret = serde_json::from_value(value)?;
    if secret.type_.as_deref().unwrap_or_default().is_empty() {
        secret.type_ = Some(OPAQUE.to_string());
    }
    secret.data.get_or_insert_with(BTreeMap::new);
    Ok(secret)
}

/// Adds a data entry holding `value`, which is base64-encoded on serialization.
pub fn insert_data(secret: &mut Secret, key: &str, value: Vec<u8>) -> Result<()> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    validate_key(key, "Secret", name)?;
    let data = secret.data.get_or_insert_with(BTreeMap::new);
    if data.contains_key(key) {
        return Err(duplicate_key(key, "Secret", name));
    }
    data.insert(key.to_string(), ByteString(value));
    Ok(())
}
