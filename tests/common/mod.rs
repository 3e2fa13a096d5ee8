#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mantic::input::UserInputBuilder;
use mantic::theory::{classical_spec, TheoryError};
use mantic::{
    BackoffPolicy, BirthCertainty, DispatchConfig, Gender, ProviderBackend, ProviderError,
    TheoryCalculator, TheorySpec, UserInput,
};

/// Backend that replays a script, repeating the last entry once the script runs out.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    last: Mutex<Result<String, ProviderError>>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        let last = script.last().cloned().unwrap_or(Err(ProviderError::EmptyResponse));
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        })
    }

    pub fn always(reply: Result<String, ProviderError>) -> Arc<Self> {
        Self::new(vec![reply])
    }

    pub fn ok(text: &str) -> Arc<Self> {
        Self::always(Ok(text.to_string()))
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(Ok(text.to_string())),
            delay,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderBackend for ScriptedBackend {
    async fn send(
        &self,
        _prompt: &str,
        _model: &str,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => self.last.lock().unwrap().clone(),
        }
    }
}

/// Calculator that always reports the same verdict.
pub struct FixedTheory {
    spec: TheorySpec,
    payload: serde_json::Value,
}

impl FixedTheory {
    pub fn new(name: &str, judgment: &str, level: f64, confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            spec: classical_spec(name).expect("classical theory"),
            payload: serde_json::json!({
                "judgment": judgment,
                "judgment_level": level,
                "confidence": confidence,
                "theory": name,
            }),
        })
    }
}

impl TheoryCalculator for FixedTheory {
    fn spec(&self) -> &TheorySpec {
        &self.spec
    }

    fn calculate(&self, _input: &UserInput) -> Result<serde_json::Value, TheoryError> {
        Ok(self.payload.clone())
    }
}

pub fn key() -> Option<String> {
    Some("test-key".to_string())
}

pub fn fast_dispatch() -> DispatchConfig {
    DispatchConfig {
        timeout_ms: 1_000,
        backoff: BackoffPolicy::none(),
        ..DispatchConfig::default()
    }
}

pub fn question() -> UserInputBuilder {
    UserInput::builder()
        .question("career", "Should I take the position abroad?")
        .current_time(Utc.with_ymd_and_hms(2024, 10, 8, 14, 30, 0).unwrap())
}

/// Input every classical theory can work with.
pub fn rich_input() -> UserInput {
    question()
        .birth_date(1991, 3, 12)
        .birth_time(9, Some(20), BirthCertainty::Exact)
        .gender(Gender::Male)
        .numbers(vec![5, 2, 8])
        .character('行')
        .build()
        .unwrap()
}
