//! Shared building blocks for the intent controllers.
//!
//! Every controller persists its intents through a [`KeyedStore`]: a document collection addressed
//! by composite JSON keys, where a key with empty leaf fields acts as a wildcard over that level.
//! Resolved deployment state lives in an [`AppContext`], a tree of typed handles over a
//! [`ContextDb`]:
//!
//! ```text
//! [ CompositeApp ] -> [ App ] -> [ Cluster ] -> [ Resource ]
//!        \                            \
//!     app order                  resource order
//! ```
//!
//! Apply engines mutate the tree step by step; there is no transaction spanning several writes, so
//! an error part way through leaves the earlier writes in place.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod appcontext;
mod error;
mod meta;
pub mod store;

pub use self::{
    appcontext::{AppContext, CompositeAppMeta, ContextDb, MemContextDb},
    error::{Error, Result},
    meta::Metadata,
    store::{KeyedStore, MemStore, StoreExt},
};

/// Separates a resource's logical name from its kind, and a cluster provider from a cluster.
pub const SEPARATOR: &str = "+";

/// Joins `name` and `kind` into the composite resource name used in an [`AppContext`].
pub fn resource_name(name: &str, kind: &str) -> String {
    format!("{name}{SEPARATOR}{kind}")
}
