use super::handle::{ClusterHandle, CompositeAppHandle};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// An instruction document stored beneath a parent level of the context tree.
pub trait Instruction: Serialize + DeserializeOwned {
    /// The level the instruction orders, e.g. `app` or `resource`.
    const LEVEL: &'static str;

    type Parent: super::Handle;
}

/// The order in which apps of a composite app are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppOrder {
    #[serde(rename = "apporder", default)]
    pub apps: Vec<String>,
}

/// The order in which resources of one app are applied to a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceOrder {
    #[serde(rename = "resorder", default)]
    pub resources: Vec<String>,
}

// === impl AppOrder ===

impl AppOrder {
    /// Appends `app`. Entries are never de-duplicated, so reapplying an intent repeats it.
    pub fn push(&mut self, app: impl ToString) {
        self.apps.push(app.to_string());
    }
}

impl Instruction for AppOrder {
    const LEVEL: &'static str = "app";
    type Parent = CompositeAppHandle;
}

// === impl ResourceOrder ===

impl ResourceOrder {
    /// Appends `resource`. Entries are never de-duplicated, so reapplying an intent repeats it.
    pub fn push(&mut self, resource: impl ToString) {
        self.resources.push(resource.to_string());
    }
}

impl Instruction for ResourceOrder {
    const LEVEL: &'static str = "resource";
    type Parent = ClusterHandle;
}
