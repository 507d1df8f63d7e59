//! Gateway orchestrator and builder.

mod builder;
mod orchestrator;

pub use builder::{Heimdall, HeimdallBuilder};
pub use orchestrator::{Gateway, ProviderHealth, Response};
