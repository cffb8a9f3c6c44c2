//! Generic Kubernetes resource intents.
//!
//! A [`GenericK8sIntent`] groups [`Resource`]s, each naming a Kubernetes object to create or
//! patch. A resource's [`Customization`]s select the clusters it applies to and carry the patch.

mod customization;
mod intent;
mod resource;

pub use self::{
    customization::{
        ClusterInfo, Content, Customization, CustomizationClient, CustomizationContent,
        CustomizationManager, CustomizationSpec, KeyOptions, KindOptions,
    },
    intent::{GenericK8sIntent, GenericK8sIntentClient, GenericK8sIntentManager},
    resource::{Resource, ResourceClient, ResourceContent, ResourceGvk, ResourceManager, ResourceSpec},
};
