//! Provider registry: who is configured, who is usable, and how each is doing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::routing::{recommended_provider, TaskType, DEFAULT_PROVIDER_PRIORITY};
use super::ProviderBackend;
use crate::error::{ProviderError, ValidationError};

/// Static configuration of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    /// Inline credential; falls back to the `<NAME>_API_KEY` environment variable.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Endpoint for HTTP backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Creates a config with no inline credential.
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
        }
    }

    /// Environment variable consulted when no inline key is set.
    #[must_use]
    pub fn env_var(&self) -> String {
        format!("{}_API_KEY", self.name.to_uppercase())
    }

    /// Resolves the credential from config, then from the environment.
    #[must_use]
    pub fn credential(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(self.env_var()).ok().filter(|k| !k.trim().is_empty()))
    }
}

/// Snapshot of a provider's state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderHealth {
    pub available: bool,
    pub rank: usize,
    pub consecutive_failures: u32,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<ProviderError>,
}

#[derive(Debug, Default)]
struct Counters {
    consecutive_failures: u32,
    successes: u64,
    failures: u64,
    last_error: Option<ProviderError>,
}

pub(crate) struct ProviderEntry {
    pub(crate) name: String,
    pub(crate) model: String,
    pub(crate) backend: Arc<dyn ProviderBackend>,
    available: bool,
    rank: usize,
    counters: Mutex<Counters>,
}

impl ProviderEntry {
    fn counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_success(&self) {
        let mut c = self.counters();
        c.consecutive_failures = 0;
        c.successes += 1;
    }

    pub(crate) fn record_failure(&self, error: &ProviderError) {
        let mut c = self.counters();
        c.consecutive_failures += 1;
        c.failures += 1;
        c.last_error = Some(error.clone());
    }

    fn health(&self) -> ProviderHealth {
        let c = self.counters();
        ProviderHealth {
            available: self.available,
            rank: self.rank,
            consecutive_failures: c.consecutive_failures,
            successes: c.successes,
            failures: c.failures,
            last_error: c.last_error.clone(),
        }
    }
}

/// Every configured provider, shared across analysis runs.
///
/// Availability is decided once, at build time. Health counters are updated
/// on every attempt under each provider's own lock.
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
    routes: HashMap<TaskType, String>,
}

impl ProviderRegistry {
    /// Starts a registry using [`DEFAULT_PROVIDER_PRIORITY`].
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Returns true if `name` is registered and has a credential.
    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| e.available)
    }

    /// Available provider names in priority order.
    #[must_use]
    pub fn ranked_available(&self) -> Vec<&str> {
        let mut available: Vec<&ProviderEntry> =
            self.entries.iter().filter(|e| e.available).collect();
        available.sort_by_key(|e| e.rank);
        available.into_iter().map(|e| e.name.as_str()).collect()
    }

    /// Provider the routing table recommends for `task`.
    #[must_use]
    pub fn recommended_for(&self, task: TaskType) -> &str {
        self.routes
            .get(&task)
            .map_or_else(|| recommended_provider(task), String::as_str)
    }

    /// Health snapshot of `name`.
    #[must_use]
    pub fn health(&self, name: &str) -> Option<ProviderHealth> {
        self.entry(name).map(ProviderEntry::health)
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("available", &self.ranked_available())
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

struct Pending {
    name: String,
    model: String,
    credential: Option<String>,
    backend: Arc<dyn ProviderBackend>,
}

/// Builder for [`ProviderRegistry`].
pub struct RegistryBuilder {
    priority: Vec<String>,
    routes: HashMap<TaskType, String>,
    pending: Vec<Pending>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PROVIDER_PRIORITY.iter().map(ToString::to_string).collect(),
            routes: HashMap::new(),
            pending: Vec::new(),
        }
    }
}

impl RegistryBuilder {
    /// Replaces the static priority order.
    #[must_use]
    pub fn priority(mut self, order: Vec<String>) -> Self {
        self.priority = order;
        self
    }

    /// Overrides the recommended provider for one task.
    #[must_use]
    pub fn route(mut self, task: TaskType, provider: impl Into<String>) -> Self {
        self.routes.insert(task, provider.into());
        self
    }

    /// Adds a provider with an explicit credential (`None` means unavailable).
    #[must_use]
    pub fn provider(
        mut self,
        name: impl Into<String>,
        model: impl Into<String>,
        credential: Option<String>,
        backend: Arc<dyn ProviderBackend>,
    ) -> Self {
        self.pending.push(Pending {
            name: name.into(),
            model: model.into(),
            credential,
            backend,
        });
        self
    }

    /// Adds a provider from config, resolving its credential.
    #[must_use]
    pub fn configured(self, config: &ProviderConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        let credential = config.credential();
        self.provider(config.name.clone(), config.model.clone(), credential, backend)
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for duplicate provider names and
    /// `UnknownProvider` for routes naming an unregistered provider.
    pub fn build(self) -> Result<ProviderRegistry, ValidationError> {
        let mut entries: Vec<ProviderEntry> = Vec::with_capacity(self.pending.len());
        for (position, p) in self.pending.into_iter().enumerate() {
            if entries.iter().any(|e| e.name == p.name) {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("provider '{}' registered twice", p.name),
                });
            }
            let rank = self
                .priority
                .iter()
                .position(|n| *n == p.name)
                .unwrap_or(self.priority.len() + position);
            let available = p.credential.as_deref().is_some_and(|c| !c.trim().is_empty());
            debug!(provider = %p.name, model = %p.model, available, rank, "provider registered");
            entries.push(ProviderEntry {
                name: p.name,
                model: p.model,
                backend: p.backend,
                available,
                rank,
                counters: Mutex::new(Counters::default()),
            });
        }

        for provider in self.routes.values() {
            if !entries.iter().any(|e| e.name == *provider) {
                return Err(ValidationError::UnknownProvider {
                    name: provider.clone(),
                });
            }
        }

        let registry = ProviderRegistry {
            entries,
            routes: self.routes,
        };
        info!(available = ?registry.ranked_available(), "provider registry ready");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct Echo;

    #[async_trait]
    impl ProviderBackend for Echo {
        async fn send(
            &self,
            prompt: &str,
            _model: &str,
            _timeout: Duration,
        ) -> Result<String, ProviderError> {
            Ok(prompt.to_string())
        }
    }

    fn key() -> Option<String> {
        Some("sk-test".to_string())
    }

    #[test]
    fn test_availability_and_rank() {
        let registry = ProviderRegistry::builder()
            .provider("kimi", "moonshot-v1", key(), Arc::new(Echo))
            .provider("claude", "claude-sonnet", None, Arc::new(Echo))
            .provider("local", "llama", key(), Arc::new(Echo))
            .provider("gemini", "gemini-pro", key(), Arc::new(Echo))
            .build()
            .unwrap();

        assert!(!registry.is_available("claude"));
        assert!(registry.contains("claude"));
        assert!(!registry.is_available("openai"));
        assert_eq!(registry.ranked_available(), vec!["gemini", "kimi", "local"]);
    }

    #[test]
    fn test_blank_credential_is_unavailable() {
        let registry = ProviderRegistry::builder()
            .provider("deepseek", "deepseek-chat", Some("  ".into()), Arc::new(Echo))
            .build()
            .unwrap();
        assert!(!registry.is_available("deepseek"));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let result = ProviderRegistry::builder()
            .provider("claude", "a", key(), Arc::new(Echo))
            .provider("claude", "b", key(), Arc::new(Echo))
            .build();
        assert!(matches!(result, Err(ValidationError::InvalidConfig { .. })));
    }

    #[test]
    fn test_route_override() {
        let registry = ProviderRegistry::builder()
            .provider("gemini", "gemini-pro", key(), Arc::new(Echo))
            .route(TaskType::SingleTheory, "gemini")
            .build()
            .unwrap();
        assert_eq!(registry.recommended_for(TaskType::SingleTheory), "gemini");
        assert_eq!(registry.recommended_for(TaskType::SimpleQa), "deepseek");

        let result = ProviderRegistry::builder()
            .route(TaskType::SimpleQa, "nobody")
            .build();
        assert!(matches!(result, Err(ValidationError::UnknownProvider { .. })));
    }

    #[test]
    fn test_health_counters() {
        let registry = ProviderRegistry::builder()
            .provider("claude", "claude-sonnet", key(), Arc::new(Echo))
            .build()
            .unwrap();
        let entry = registry.entry("claude").unwrap();
        entry.record_failure(&ProviderError::EmptyResponse);
        entry.record_failure(&ProviderError::RateLimited { retry_after: None });

        let health = registry.health("claude").unwrap();
        assert_eq!(health.consecutive_failures, 2);
        assert_eq!(health.last_error, Some(ProviderError::RateLimited { retry_after: None }));

        entry.record_success();
        let health = registry.health("claude").unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.successes, 1);
        assert_eq!(health.failures, 2);
    }

    #[test]
    fn test_inline_credential_wins() {
        let mut config = ProviderConfig::new("mantic_test_inline", "m");
        config.api_key = Some("inline".to_string());
        assert_eq!(config.credential().as_deref(), Some("inline"));
        assert_eq!(config.env_var(), "MANTIC_TEST_INLINE_API_KEY");
    }
}
