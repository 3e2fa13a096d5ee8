//! Provider failover with retry classification.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::registry::{ProviderConfig, ProviderEntry, ProviderRegistry};
use super::routing::TaskType;
use super::verification::VerificationAdvisory;
use crate::error::{DispatchError, ProviderError, ProviderFailure, ValidationError};

/// Exponential backoff between retries of the same provider.
///
/// Deterministic: no jitter, so tests can reason about total delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub factor: u32,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 250,
            factor: 2,
            max_ms: 4_000,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            initial_ms: 0,
            factor: 1,
            max_ms: 0,
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// A server-provided `retry_after` wins when it is longer; both are capped.
    #[must_use]
    pub fn delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let computed = u64::from(self.factor)
            .checked_pow(retry)
            .and_then(|m| self.initial_ms.checked_mul(m))
            .unwrap_or(u64::MAX)
            .min(self.max_ms);
        let hinted = retry_after.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Duration::from_millis(computed.max(hinted).min(self.max_ms))
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Provider tried first when available.
    pub primary: Option<String>,
    /// Provider definitions used to build a registry.
    pub providers: Vec<ProviderConfig>,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Retries per provider after the first attempt.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    /// Ask the top two providers and compare their answers.
    pub dual_verification: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            primary: Some("claude".to_string()),
            providers: Vec::new(),
            timeout_ms: 60_000,
            max_retries: 2,
            backoff: BackoffPolicy::default(),
            dual_verification: false,
        }
    }
}

impl DispatchConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero timeout or a backoff factor of zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "dispatch.timeout_ms must be positive".to_string(),
            });
        }
        if self.backoff.factor == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "dispatch.backoff.factor must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub provider: String,
    pub text: String,
    /// Attempts spent on the answering provider.
    pub attempts: u32,
}

/// Outcome of [`Dispatcher::call_dual`].
#[derive(Debug, Clone, PartialEq)]
pub struct DualReply {
    pub primary: Reply,
    pub secondary: Option<Reply>,
    pub advisory: VerificationAdvisory,
}

/// Routes prompts to providers with failover.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Creates a dispatcher over a shared registry.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if the configured primary is not registered,
    /// or `InvalidConfig` for out-of-range settings.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config: DispatchConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        if let Some(primary) = &config.primary {
            if !registry.contains(primary) && !registry.is_empty() {
                return Err(ValidationError::UnknownProvider { name: primary.clone() });
            }
        }
        Ok(Self { registry, config })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Ordered candidate providers for `task`.
    ///
    /// Primary (if available), then the task's recommended provider (if
    /// available and different), then every other available provider by rank.
    #[must_use]
    pub fn candidates(&self, task: TaskType) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if self.registry.is_available(name) && !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        };
        if let Some(primary) = &self.config.primary {
            push(primary);
        }
        push(self.registry.recommended_for(task));
        for name in self.registry.ranked_available() {
            push(name);
        }
        out
    }

    /// Sends `prompt`, failing over across candidates until one answers.
    ///
    /// # Errors
    ///
    /// - `NoProviderAvailable` when no provider has a credential
    /// - `AllProvidersExhausted` when every candidate failed terminally
    pub async fn call(
        &self,
        task: TaskType,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<Reply, DispatchError> {
        let candidates = self.candidates(task);
        self.failover(task, &candidates, prompt, options, Vec::new()).await
    }

    /// Sends `prompt` to the top two candidates concurrently and compares them.
    ///
    /// Falls back to plain failover when fewer than two providers are
    /// available, or when both fail.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::call`].
    pub async fn call_dual(
        &self,
        task: TaskType,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<DualReply, DispatchError> {
        let candidates = self.candidates(task);
        if candidates.len() < 2 {
            let reply = self.failover(task, &candidates, prompt, options, Vec::new()).await?;
            let advisory =
                VerificationAdvisory::single_source(&reply.provider, "only one provider available");
            return Ok(DualReply {
                primary: reply,
                secondary: None,
                advisory,
            });
        }

        let (first, second) = tokio::join!(
            self.try_provider(task, &candidates[0], prompt, options),
            self.try_provider(task, &candidates[1], prompt, options),
        );

        match (first, second) {
            (Ok(a), Ok(b)) => {
                let advisory =
                    VerificationAdvisory::compare(&a.provider, &a.text, &b.provider, &b.text);
                debug!(
                    task = %task,
                    consistency = ?advisory.consistency,
                    "dual verification compared"
                );
                Ok(DualReply {
                    primary: a,
                    secondary: Some(b),
                    advisory,
                })
            }
            (Ok(reply), Err(failure)) | (Err(failure), Ok(reply)) => {
                let advisory = VerificationAdvisory::single_source(
                    &reply.provider,
                    format!("{} failed: {}", failure.provider, failure.error),
                );
                Ok(DualReply {
                    primary: reply,
                    secondary: None,
                    advisory,
                })
            }
            (Err(a), Err(b)) => {
                warn!(task = %task, "both verification providers failed, falling back to failover");
                let reply = self
                    .failover(task, &candidates[2..], prompt, options, vec![a, b])
                    .await?;
                let advisory = VerificationAdvisory::single_source(
                    &reply.provider,
                    "both verification providers failed",
                );
                Ok(DualReply {
                    primary: reply,
                    secondary: None,
                    advisory,
                })
            }
        }
    }

    async fn failover(
        &self,
        task: TaskType,
        candidates: &[String],
        prompt: &str,
        options: &CallOptions,
        mut failures: Vec<ProviderFailure>,
    ) -> Result<Reply, DispatchError> {
        if candidates.is_empty() && failures.is_empty() {
            warn!(task = %task, "no provider available");
            return Err(DispatchError::NoProviderAvailable { task: task.to_string() });
        }

        for name in candidates {
            match self.try_provider(task, name, prompt, options).await {
                Ok(reply) => return Ok(reply),
                Err(failure) => {
                    info!(task = %task, provider = %name, error = %failure.error, "failing over");
                    failures.push(failure);
                }
            }
        }

        warn!(task = %task, providers = failures.len(), "all providers exhausted");
        Err(DispatchError::AllProvidersExhausted {
            task: task.to_string(),
            failures,
        })
    }

    /// Runs the retry loop against one provider.
    async fn try_provider(
        &self,
        task: TaskType,
        name: &str,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<Reply, ProviderFailure> {
        let Some(entry) = self.registry.entry(name) else {
            return Err(ProviderFailure {
                provider: name.to_string(),
                attempts: 0,
                error: ProviderError::MalformedRequest {
                    message: format!("provider '{name}' is not registered"),
                },
            });
        };
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);

        let mut attempts = 0u32;
        let mut empty_seen = false;
        loop {
            attempts += 1;
            let started = Instant::now();
            match attempt(entry, prompt, timeout).await {
                Ok(text) => {
                    entry.record_success();
                    debug!(
                        task = %task,
                        provider = %name,
                        attempt = attempts,
                        elapsed_ms = elapsed_ms(started),
                        "provider answered"
                    );
                    return Ok(Reply {
                        provider: name.to_string(),
                        text,
                        attempts,
                    });
                }
                Err(error) => {
                    entry.record_failure(&error);
                    let retryable = match &error {
                        ProviderError::EmptyResponse => !std::mem::replace(&mut empty_seen, true),
                        other => other.is_retryable(),
                    };
                    warn!(
                        task = %task,
                        provider = %name,
                        attempt = attempts,
                        kind = error.kind(),
                        retryable,
                        "provider attempt failed"
                    );
                    if !retryable || attempts > max_retries {
                        return Err(ProviderFailure {
                            provider: name.to_string(),
                            attempts,
                            error,
                        });
                    }
                    let retry_after = match &error {
                        ProviderError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.config.backoff.delay(attempts - 1, retry_after);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn attempt(
    entry: &ProviderEntry,
    prompt: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    match tokio::time::timeout(timeout, entry.backend.send(prompt, &entry.model, timeout)).await {
        Err(_) => Err(ProviderError::Timeout { after: timeout }),
        Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::EmptyResponse),
        Ok(result) => result,
    }
}
