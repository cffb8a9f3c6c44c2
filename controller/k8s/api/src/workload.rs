use crate::{to_yaml, yaml_to_json, Error, Result};
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
    batch::v1::{CronJob, Job},
    core::v1::{Pod, PodTemplateSpec, ReplicationController},
};
use serde_json::Value;
use std::collections::BTreeMap;

/// A manifest decoded by kind, so that the labels of the pods it creates can be edited.
#[derive(Clone, Debug)]
pub enum Workload {
    Job(Box<Job>),
    CronJob(Box<CronJob>),
    DaemonSet(Box<DaemonSet>),
    Deployment(Box<Deployment>),
    ReplicaSet(Box<ReplicaSet>),
    StatefulSet(Box<StatefulSet>),
    Pod(Box<Pod>),
    ReplicationController(Box<ReplicationController>),
    /// Any other kind. It is carried through untouched.
    Other(Value),
}

// === impl Workload ===

impl Workload {
    pub fn from_yaml(manifest: &str) -> Result<Self> {
        let value = yaml_to_json(manifest.as_bytes())?;
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Invalid("resource kind is not set".to_string()))?
            .to_string();

        let workload = match kind.as_str() {
            "Job" => Self::Job(serde_json::from_value(value)?),
            "CronJob" => Self::CronJob(serde_json::from_value(value)?),
            "DaemonSet" => Self::DaemonSet(serde_json::from_value(value)?),
            "Deployment" => Self::Deployment(serde_json::from_value(value)?),
            "ReplicaSet" => Self::ReplicaSet(serde_json::from_value(value)?),
            "StatefulSet" => Self::StatefulSet(serde_json::from_value(value)?),
            "Pod" => Self::Pod(serde_json::from_value(value)?),
            "ReplicationController" => Self::ReplicationController(serde_json::from_value(value)?),
            _ => Self::Other(value),
        };
        Ok(workload)
    }

    pub fn to_yaml(&self) -> Result<String> {
        match self {
            Self::Job(o) => to_yaml(o),
            Self::CronJob(o) => to_yaml(o),
            Self::DaemonSet(o) => to_yaml(o),
            Self::Deployment(o) => to_yaml(o),
            Self::ReplicaSet(o) => to_yaml(o),
            Self::StatefulSet(o) => to_yaml(o),
            Self::Pod(o) => to_yaml(o),
            Self::ReplicationController(o) => to_yaml(o),
            Self::Other(v) => to_yaml(v),
        }
    }

    /// Returns the labels applied to the workload's pods, creating the maps as needed. Pods
    /// return their own labels. Kinds without a pod template return `None`.
    pub fn pod_labels_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        let template = match self {
            Self::Job(o) => &mut o.spec.get_or_insert_with(Default::default).template,
            Self::CronJob(o) => {
                &mut o
                    .spec
                    .get_or_insert_with(Default::default)
                    .job_template
                    .spec
                    .get_or_insert_with(Default::default)
                    .template
            }
            Self::DaemonSet(o) => &mut o.spec.get_or_insert_with(Default::default).template,
            Self::Deployment(o) => &mut o.spec.get_or_insert_with(Default::default).template,
            Self::ReplicaSet(o) => {
                o.spec
                    .get_or_insert_with(Default::default)
                    .template
                    .get_or_insert_with(Default::default)
            }
            Self::StatefulSet(o) => &mut o.spec.get_or_insert_with(Default::default).template,
            Self::ReplicationController(o) => o
                .spec
                .get_or_insert_with(Default::default)
                .template
                .get_or_insert_with(Default::default),
            Self::Pod(o) => return Some(o.metadata.labels.get_or_insert_with(BTreeMap::new)),
            Self::Other(_) => return None,
        };
        Some(template_labels(template))
    }

    /// Adds a `key=value` label to the workload's pods.
    ///
    /// Malformed labels and kinds without pods are logged and leave the workload unchanged.
    pub fn add_pod_label(&mut self, label: &str) {
        let Some((key, value)) = parse_label(label) else {
            tracing::warn!(%label, "SFC link label has invalid format");
            return;
        };
        match self.pod_labels_mut() {
            Some(labels) => {
                labels.insert(key.to_string(), value.to_string());
            }
            None => {
                tracing::warn!(kind = %self.kind(), "Resource type does not have pod template");
            }
        }
    }

    fn kind(&self) -> &str {
        match self {
            Self::Job(_) => "Job",
            Self::CronJob(_) => "CronJob",
            Self::DaemonSet(_) => "DaemonSet",
            Self::Deployment(_) => "Deployment",
            Self::ReplicaSet(_) => "ReplicaSet",
            Self::StatefulSet(_) => "StatefulSet",
            Self::Pod(_) => "Pod",
            Self::ReplicationController(_) => "ReplicationController",
            Self::Other(v) => v.get("kind").and_then(Value::as_str).unwrap_or_default(),
        }
    }
}

fn template_labels(template: &mut PodTemplateSpec) -> &mut BTreeMap<String, String> {
    template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(BTreeMap::new)
}

fn parse_label(label: &str) -> Option<(&str, &str)> {
    let mut parts = label.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => Some((key, value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: a1
spec:
  selector:
    matchLabels:
      app: a1
  template:
    metadata:
      labels:
        app: a1
    spec:
      containers:
        - name: a1
          image: busybox
"#;

    #[test]
    fn labels_deployment_pod_template() {
        let mut workload = Workload::from_yaml(DEPLOYMENT).unwrap();
        workload.add_pod_label("sfc=chain1");

        let relabelled = Workload::from_yaml(&workload.to_yaml().unwrap()).unwrap();
        let Workload::Deployment(deploy) = relabelled else {
            panic!("expected a deployment");
        };
        let labels = deploy.spec.unwrap().template.metadata.unwrap().labels.unwrap();
        assert_eq!(
            labels,
            btreemap! {
                "app".to_string() => "a1".to_string(),
                "sfc".to_string() => "chain1".to_string(),
            }
        );
    }

    #[test]
    fn labels_pods_and_cronjobs() {
        let mut pod = Workload::from_yaml("apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\n").unwrap();
        pod.add_pod_label("app=a2");
        assert_eq!(
            pod.pod_labels_mut().unwrap().get("app").map(String::as_str),
            Some("a2")
        );

        let mut cron =
            Workload::from_yaml("apiVersion: batch/v1\nkind: CronJob\nmetadata:\n  name: c\n")
                .unwrap();
        cron.add_pod_label("app=a3");
        assert_eq!(
            cron.pod_labels_mut().unwrap().get("app").map(String::as_str),
            Some("a3")
        );
    }

    #[test]
    fn invalid_labels_and_other_kinds_are_untouched() {
        let mut workload = Workload::from_yaml(DEPLOYMENT).unwrap();
        workload.add_pod_label("a=b=c");
        assert_eq!(workload.pod_labels_mut().unwrap().len(), 1);

        let mut svc = Workload::from_yaml("apiVersion: v1\nkind: Service\nmetadata:\n  name: s\n").unwrap();
        svc.add_pod_label("app=a1");
        assert!(matches!(svc, Workload::Other(_)));
        assert!(svc.pod_labels_mut().is_none());
    }
}
