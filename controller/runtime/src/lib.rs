#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use orchestrator_core as core;
pub use orchestrator_intents as intents;
pub use orchestrator_policy as policy;

mod admin;
mod api;
mod args;
mod server;

pub use self::{
    admin::Admin,
    api::{Api, ApiError},
    args::Args,
};
