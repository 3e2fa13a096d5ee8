//! LLM provider dispatch.
//!
//! - [`ProviderBackend`]: the transport seam, one implementation per vendor API
//! - [`ProviderRegistry`]: availability, priority and per-provider health
//! - [`Dispatcher`]: failover, retry classification and dual verification

mod dispatcher;
#[cfg(feature = "http")]
pub mod http;
mod registry;
mod routing;
mod verification;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use dispatcher::{BackoffPolicy, CallOptions, DispatchConfig, Dispatcher, DualReply, Reply};
pub use registry::{ProviderConfig, ProviderHealth, ProviderRegistry, RegistryBuilder};
pub use routing::{recommended_provider, TaskType, DEFAULT_PROVIDER_PRIORITY};
pub use verification::{Consistency, VerificationAdvisory};

/// Transport to a single LLM vendor.
///
/// Implementations map every failure onto a [`ProviderError`] variant; the
/// dispatcher decides what to retry from that variant alone.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Sends `prompt` to `model` and returns the completion text.
    ///
    /// `timeout` is advisory; the dispatcher enforces it independently.
    async fn send(
        &self,
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError>;
}
