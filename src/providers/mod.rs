//! Provider facade trait and supporting adapters.

pub mod http;
pub mod retry;
pub mod traits;

pub use http::HttpJsonProvider;
pub use retry::RetryConfig;
pub use traits::Provider;
