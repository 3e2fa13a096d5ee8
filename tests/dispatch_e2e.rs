mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_dispatch, key, ScriptedBackend};
use mantic::{
    CallOptions, Consistency, DispatchConfig, DispatchError, Dispatcher, ProviderError,
    ProviderRegistry, TaskType,
};

fn server_error() -> Result<String, ProviderError> {
    Err(ProviderError::ServerError {
        status: 503,
        message: "overloaded".to_string(),
    })
}

fn dispatcher(registry: ProviderRegistry, config: DispatchConfig) -> Dispatcher {
    Dispatcher::new(Arc::new(registry), config).unwrap()
}

#[tokio::test]
async fn uncredentialed_primary_skipped_for_recommended_provider() {
    let claude = ScriptedBackend::ok("claude says hi");
    let deepseek = ScriptedBackend::ok("deepseek reading");
    let gemini = ScriptedBackend::ok("gemini reading");
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", None, claude.clone())
        .provider("gemini", "gemini-pro", key(), gemini.clone())
        .provider("deepseek", "deepseek-chat", key(), deepseek.clone())
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    assert_eq!(d.candidates(TaskType::QuickInterpretation), vec!["deepseek", "gemini"]);

    let reply = d
        .call(TaskType::QuickInterpretation, "interpret meihua", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.provider, "deepseek");
    assert_eq!(reply.text, "deepseek reading");
    assert_eq!(claude.calls(), 0);
    assert_eq!(gemini.calls(), 0);
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let claude = ScriptedBackend::always(Err(ProviderError::AuthError {
        message: "key revoked".to_string(),
    }));
    let gemini = ScriptedBackend::ok("fine");
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), claude.clone())
        .provider("gemini", "gemini-pro", key(), gemini.clone())
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let reply = d
        .call(TaskType::SingleTheory, "interpret bazi", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.provider, "gemini");
    assert_eq!(claude.calls(), 1);
}

#[tokio::test]
async fn retryable_errors_bounded_by_max_retries() {
    let claude = ScriptedBackend::always(server_error());
    let gemini = ScriptedBackend::ok("fine");
    let registry = Arc::new(
        ProviderRegistry::builder()
            .provider("claude", "claude-sonnet", key(), claude.clone())
            .provider("gemini", "gemini-pro", key(), gemini.clone())
            .build()
            .unwrap(),
    );
    let d = Dispatcher::new(Arc::clone(&registry), fast_dispatch()).unwrap();

    let reply = d
        .call(TaskType::SingleTheory, "interpret ziwei", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.provider, "gemini");
    assert_eq!(reply.attempts, 1);
    assert_eq!(claude.calls(), 3);

    let health = registry.health("claude").unwrap();
    assert_eq!(health.consecutive_failures, 3);
    assert!(matches!(health.last_error, Some(ProviderError::ServerError { status: 503, .. })));
    assert_eq!(registry.health("gemini").unwrap().successes, 1);

    let options = CallOptions {
        max_retries: Some(0),
        ..CallOptions::default()
    };
    d.call(TaskType::SingleTheory, "again", &options).await.unwrap();
    assert_eq!(claude.calls(), 4);
}

#[tokio::test]
async fn exhaustion_reports_every_provider_in_order() {
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), ScriptedBackend::always(server_error()))
        .provider(
            "gemini",
            "gemini-pro",
            key(),
            ScriptedBackend::always(Err(ProviderError::MalformedRequest {
                message: "bad schema".to_string(),
            })),
        )
        .provider(
            "kimi",
            "moonshot-v1",
            key(),
            ScriptedBackend::always(Err(ProviderError::ConnectionError {
                message: "reset".to_string(),
            })),
        )
        .provider("deepseek", "deepseek-chat", None, ScriptedBackend::ok("unreachable"))
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let err = d
        .call(TaskType::SingleTheory, "interpret qimen", &CallOptions::default())
        .await
        .unwrap_err();
    let DispatchError::AllProvidersExhausted { task, failures } = err else {
        panic!("expected exhaustion");
    };
    assert_eq!(task, "single_theory");
    let summary: Vec<(&str, u32)> = failures
        .iter()
        .map(|f| (f.provider.as_str(), f.attempts))
        .collect();
    assert_eq!(summary, vec![("claude", 3), ("gemini", 1), ("kimi", 3)]);
    assert!(matches!(failures[1].error, ProviderError::MalformedRequest { .. }));
}

#[tokio::test]
async fn empty_response_retried_once() {
    let claude = ScriptedBackend::new(vec![
        Ok("   ".to_string()),
        Ok(String::new()),
        Ok("late".to_string()),
    ]);
    let gemini = ScriptedBackend::ok("fine");
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), claude.clone())
        .provider("gemini", "gemini-pro", key(), gemini)
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let reply = d
        .call(TaskType::SingleTheory, "interpret", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.provider, "gemini");
    assert_eq!(claude.calls(), 2);
}

#[tokio::test]
async fn rate_limit_then_success_stays_on_provider() {
    let claude = ScriptedBackend::new(vec![
        Err(ProviderError::RateLimited {
            retry_after: Some(Duration::from_millis(5)),
        }),
        Ok("after the wait".to_string()),
    ]);
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), claude.clone())
        .build()
        .unwrap();
    let config = DispatchConfig {
        backoff: mantic::BackoffPolicy {
            initial_ms: 1,
            factor: 2,
            max_ms: 10,
        },
        ..fast_dispatch()
    };
    let d = dispatcher(registry, config);

    let reply = d
        .call(TaskType::SingleTheory, "interpret", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.provider, "claude");
    assert_eq!(reply.attempts, 2);
    assert_eq!(reply.text, "after the wait");
}

#[tokio::test]
async fn attempt_timeout_is_enforced() {
    let slow = ScriptedBackend::slow("too late", Duration::from_millis(500));
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), slow.clone())
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());
    let options = CallOptions {
        timeout: Some(Duration::from_millis(20)),
        max_retries: Some(1),
    };

    let err = d.call(TaskType::SingleTheory, "interpret", &options).await.unwrap_err();
    let DispatchError::AllProvidersExhausted { failures, .. } = err else {
        panic!("expected exhaustion");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempts, 2);
    assert_eq!(
        failures[0].error,
        ProviderError::Timeout {
            after: Duration::from_millis(20)
        }
    );
    assert_eq!(slow.calls(), 2);
}

#[tokio::test]
async fn no_credentials_is_not_an_outage() {
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", None, ScriptedBackend::ok("x"))
        .provider("gemini", "gemini-pro", None, ScriptedBackend::ok("x"))
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let err = d
        .call(TaskType::SimpleQa, "hello", &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoProviderAvailable { .. }));
}

#[tokio::test]
async fn unknown_primary_rejected() {
    let registry = ProviderRegistry::builder()
        .provider("gemini", "gemini-pro", key(), ScriptedBackend::ok("x"))
        .build()
        .unwrap();
    let config = DispatchConfig {
        primary: Some("openai".to_string()),
        ..fast_dispatch()
    };
    assert!(Dispatcher::new(Arc::new(registry), config).is_err());
}

#[tokio::test]
async fn dual_verification_compares_two_answers() {
    let text = "A favorable window; we recommend acting before winter.";
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), ScriptedBackend::ok(text))
        .provider("gemini", "gemini-pro", key(), ScriptedBackend::ok(text))
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let dual = d
        .call_dual(TaskType::SingleTheory, "interpret", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(dual.primary.provider, "claude");
    assert_eq!(dual.secondary.as_ref().unwrap().provider, "gemini");
    assert_eq!(dual.advisory.consistency, Consistency::High);
}

#[tokio::test]
async fn dual_verification_single_source_when_one_side_fails() {
    let registry = ProviderRegistry::builder()
        .provider(
            "claude",
            "claude-sonnet",
            key(),
            ScriptedBackend::always(Err(ProviderError::AuthError {
                message: "expired".to_string(),
            })),
        )
        .provider("gemini", "gemini-pro", key(), ScriptedBackend::ok("neutral outlook"))
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let dual = d
        .call_dual(TaskType::SingleTheory, "interpret", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(dual.primary.provider, "gemini");
    assert!(dual.secondary.is_none());
    assert_eq!(dual.advisory.consistency, Consistency::SingleSource);
    assert!(dual.advisory.notes[0].contains("claude"));
}

#[tokio::test]
async fn dual_verification_falls_back_when_both_fail() {
    let kimi = ScriptedBackend::ok("kimi steps in");
    let registry = ProviderRegistry::builder()
        .provider("claude", "claude-sonnet", key(), ScriptedBackend::always(server_error()))
        .provider("gemini", "gemini-pro", key(), ScriptedBackend::always(server_error()))
        .provider("kimi", "moonshot-v1", key(), kimi.clone())
        .build()
        .unwrap();
    let d = dispatcher(registry, fast_dispatch());

    let dual = d
        .call_dual(TaskType::SingleTheory, "interpret", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(dual.primary.provider, "kimi");
    assert_eq!(kimi.calls(), 1);
    assert_eq!(dual.advisory.consistency, Consistency::SingleSource);
}
