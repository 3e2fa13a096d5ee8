//! Decision engine: selection, calculation, interpretation and reconciliation.
//!
//! One call to [`DecisionEngine::analyze`] is one run:
//!
//! 1. select theories for the input
//! 2. calculate each (synchronously, quick tier first)
//! 3. interpret each through the provider dispatcher
//! 4. resolve conflicts over the complete result set

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::conflict::{ConflictInfo, ConflictResolver};
use crate::error::{DispatchError, ExecutionError, ManticResult, Stage, ValidationError};
use crate::input::UserInput;
use crate::observer::{AnalysisObserver, SilentObserver};
use crate::prompt::{DefaultPromptRenderer, PromptRenderer};
use crate::provider::{CallOptions, Dispatcher, ProviderRegistry, TaskType, VerificationAdvisory};
use crate::selector::{SelectedTheory, SelectionReason, TheorySelector};
use crate::theory::{StandardAnswer, TheoryAnalysisResult, TheoryCatalog, TheoryTier};

/// Unique identifier for an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(Uuid);

impl AnalysisId {
    /// Creates a new random analysis ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub created_at: DateTime<Utc>,
    /// Digest of the input, matching the `fingerprint` field in logs.
    pub input_fingerprint: String,
    pub selected_theories: Vec<SelectedTheory>,
    pub selection_reason: SelectionReason,
    /// One result per selected theory, in execution order.
    pub theory_results: Vec<TheoryAnalysisResult>,
    pub conflict_info: ConflictInfo,
    /// Resolution confidence, reduced when selection fell short.
    pub overall_confidence: f64,
}

impl Analysis {
    /// Result of `theory`, if it ran.
    #[must_use]
    pub fn result(&self, theory: &str) -> Option<&TheoryAnalysisResult> {
        self.theory_results.iter().find(|r| r.theory == theory)
    }
}

/// A theory whose calculation is done and whose prompt is ready.
struct Prepared {
    name: String,
    calculation: serde_json::Value,
    answer: StandardAnswer,
    prompt: String,
    task: TaskType,
}

struct Interpreted {
    provider: String,
    text: String,
    verification: Option<VerificationAdvisory>,
}

/// Orchestrates one analysis per call. Cheap to share behind an `Arc`.
pub struct DecisionEngine {
    catalog: Arc<TheoryCatalog>,
    dispatcher: Dispatcher,
    selector: TheorySelector,
    resolver: ConflictResolver,
    prompts: Arc<dyn PromptRenderer>,
    observer: Arc<dyn AnalysisObserver>,
    config: EngineConfig,
}

impl DecisionEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty catalog or an invalid config.
    pub fn new(
        catalog: Arc<TheoryCatalog>,
        registry: Arc<ProviderRegistry>,
        config: EngineConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "theory catalog is empty".to_string(),
            });
        }
        let dispatcher = Dispatcher::new(registry, config.dispatch.clone())?;
        Ok(Self {
            catalog,
            dispatcher,
            selector: TheorySelector::new(),
            resolver: ConflictResolver::new(config.conflict),
            prompts: Arc::new(DefaultPromptRenderer),
            observer: Arc::new(SilentObserver),
            config,
        })
    }

    /// Replaces the prompt renderer.
    #[must_use]
    pub fn with_prompt_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.prompts = renderer;
        self
    }

    /// Installs an observer for stage progress.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AnalysisObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a full analysis of `input`.
    ///
    /// # Errors
    ///
    /// - `NoApplicableTheory` when no theory in the catalog can run
    /// - `TheoryFailed` when a calculator rejects the input
    /// - `Interpretation` when every provider failed for some theory; with
    ///   several failures, the earliest theory in execution order is reported
    pub async fn analyze(&self, input: &UserInput) -> ManticResult<Analysis> {
        let started = Instant::now();
        let fingerprint = input.fingerprint();

        let selection = self.selector.select(
            input,
            &self.catalog,
            self.config.selection.min_theories,
            self.config.selection.max_theories,
        )?;
        if selection.selected.is_empty() {
            warn!(fingerprint = %fingerprint, "no applicable theory");
            return Err(ExecutionError::NoApplicableTheory.into());
        }
        info!(
            fingerprint = %fingerprint,
            theories = ?selection.names(),
            shortfall = selection.reason.shortfall,
            "analysis started"
        );
        self.observer.theories_selected(&selection);

        let order = selection.execution_order();
        let planned: Vec<String> = order.iter().map(|s| s.name.clone()).collect();
        self.observer.execution_planned(&planned);

        let prepared = order
            .into_iter()
            .map(|s| self.prepare(s, input))
            .collect::<Result<Vec<_>, _>>()?;

        let interpreted = if self.config.parallel_interpretations {
            self.interpret_concurrently(&prepared).await?
        } else {
            self.interpret_sequentially(&prepared).await?
        };

        let theory_results: Vec<TheoryAnalysisResult> = prepared
            .into_iter()
            .zip(interpreted)
            .map(|(p, i)| {
                let mut result = TheoryAnalysisResult::from_answer(p.name, p.answer);
                result.calculation = p.calculation;
                result.interpretation = i.text;
                result.provider = Some(i.provider);
                result.verification = i.verification;
                result
            })
            .collect();

        let conflict_info = self.resolver.resolve(&theory_results)?;
        self.observer.conflicts_resolved(&conflict_info);
        let resolved = conflict_info.resolution.as_ref().map_or(0.0, |r| r.confidence);
        let overall_confidence = if selection.reason.shortfall {
            resolved * self.config.shortfall_penalty
        } else {
            resolved
        };

        info!(
            fingerprint = %fingerprint,
            results = theory_results.len(),
            conflicts = conflict_info.conflicts.len(),
            overall_confidence,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "analysis finished"
        );

        Ok(Analysis {
            id: AnalysisId::new(),
            created_at: Utc::now(),
            input_fingerprint: fingerprint,
            selected_theories: selection.selected,
            selection_reason: selection.reason,
            theory_results,
            conflict_info,
            overall_confidence,
        })
    }

    fn prepare(
        &self,
        selected: &SelectedTheory,
        input: &UserInput,
    ) -> Result<Prepared, ExecutionError> {
        let calculator = self
            .catalog
            .get(&selected.name)
            .ok_or_else(|| ExecutionError::UnknownTheory {
                name: selected.name.clone(),
            })?;
        let failed = |stage: Stage, message: String| ExecutionError::TheoryFailed {
            theory: selected.name.clone(),
            stage,
            message,
        };

        let calculation = calculator
            .calculate(input)
            .map_err(|e| failed(Stage::Calculate, e.message))?;
        let answer = calculator
            .to_standard_answer(&calculation)
            .map_err(|e| failed(Stage::StandardAnswer, e.message))?;
        answer
            .validate()
            .map_err(|e| failed(Stage::StandardAnswer, e.to_string()))?;

        debug!(
            theory = %selected.name,
            judgment = %answer.judgment,
            confidence = answer.confidence,
            "theory calculated"
        );
        self.observer.theory_calculated(&selected.name, &answer);

        let prompt = self.prompts.render(calculator.spec(), input, &calculation, &answer);
        let task = match selected.tier {
            TheoryTier::Quick => TaskType::QuickInterpretation,
            TheoryTier::Basic | TheoryTier::Deep => TaskType::SingleTheory,
        };
        Ok(Prepared {
            name: selected.name.clone(),
            calculation,
            answer,
            prompt,
            task,
        })
    }

    async fn interpret_sequentially(
        &self,
        prepared: &[Prepared],
    ) -> Result<Vec<Interpreted>, ExecutionError> {
        let dual = self.config.dispatch.dual_verification;
        let mut out = Vec::with_capacity(prepared.len());
        for p in prepared {
            let interpreted = interpret(&self.dispatcher, dual, p.task, &p.prompt)
                .await
                .map_err(|source| interpretation_failed(&p.name, source))?;
            self.observer.theory_interpreted(&p.name, &interpreted.provider);
            out.push(interpreted);
        }
        Ok(out)
    }

    /// Interprets every theory on its own task.
    ///
    /// Every task runs to completion even after a failure. The error reported
    /// belongs to the earliest failed theory in execution order.
    async fn interpret_concurrently(
        &self,
        prepared: &[Prepared],
    ) -> Result<Vec<Interpreted>, ExecutionError> {
        let dual = self.config.dispatch.dual_verification;
        let mut set = JoinSet::new();
        for (idx, p) in prepared.iter().enumerate() {
            let dispatcher = self.dispatcher.clone();
            let prompt = p.prompt.clone();
            let task = p.task;
            set.spawn(async move { (idx, interpret(&dispatcher, dual, task, &prompt).await) });
        }

        let mut slots: Vec<Option<Interpreted>> = (0..prepared.len()).map(|_| None).collect();
        let mut failed: Option<(usize, DispatchError)> = None;
        let mut aborted: Option<String> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(interpreted))) => {
                    self.observer
                        .theory_interpreted(&prepared[idx].name, &interpreted.provider);
                    slots[idx] = Some(interpreted);
                }
                Ok((idx, Err(source))) => {
                    let earlier = failed.as_ref().is_some_and(|(first, _)| *first < idx);
                    if !earlier {
                        failed = Some((idx, source));
                    }
                }
                Err(e) => aborted = Some(e.to_string()),
            }
        }

        if let Some((idx, source)) = failed {
            return Err(interpretation_failed(&prepared[idx].name, source));
        }

        let mut out = Vec::with_capacity(slots.len());
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(interpreted) => out.push(interpreted),
                None => {
                    return Err(ExecutionError::TaskAborted {
                        theory: prepared[idx].name.clone(),
                        message: aborted.unwrap_or_else(|| "task vanished".to_string()),
                    });
                }
            }
        }
        Ok(out)
    }
}

fn interpretation_failed(theory: &str, source: DispatchError) -> ExecutionError {
    ExecutionError::Interpretation {
        theory: theory.to_string(),
        stage: Stage::Interpret,
        source,
    }
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("catalog", &self.catalog)
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn interpret(
    dispatcher: &Dispatcher,
    dual: bool,
    task: TaskType,
    prompt: &str,
) -> Result<Interpreted, DispatchError> {
    let options = CallOptions::default();
    if dual {
        let reply = dispatcher.call_dual(task, prompt, &options).await?;
        Ok(Interpreted {
            provider: reply.primary.provider,
            text: reply.primary.text,
            verification: Some(reply.advisory),
        })
    } else {
        let reply = dispatcher.call(task, prompt, &options).await?;
        Ok(Interpreted {
            provider: reply.provider,
            text: reply.text,
            verification: None,
        })
    }
}
