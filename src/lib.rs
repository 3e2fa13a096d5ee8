//! # Mantic - a multi-theory decision engine
//!
//! Mantic answers a personal question by running several classical
//! divination theories over the same input, having an LLM interpret each
//! theory's computed verdict, and reconciling the (often disagreeing)
//! verdicts into one confidence-weighted answer.
//!
//! ## Core Concepts
//!
//! - **Theory**: a deterministic calculator with declared input requirements
//! - **Selection**: which theories the available input supports, and why
//! - **Dispatch**: provider failover with explicit retry classification
//! - **Conflict**: a recorded disagreement between two theories' verdicts
//! - **Resolution**: the reconciled verdict and its adjusted confidence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mantic::{DecisionEngine, EngineConfig, ProviderRegistry, TheoryCatalog, UserInput};
//!
//! let mut catalog = TheoryCatalog::new();
//! catalog.register(Arc::new(MyMeihua::default()))?;
//!
//! let registry = ProviderRegistry::builder()
//!     .provider("claude", "claude-sonnet", std::env::var("CLAUDE_API_KEY").ok(), backend)
//!     .build()?;
//!
//! let config = EngineConfig::default();
//! let engine = DecisionEngine::new(Arc::new(catalog), Arc::new(registry), config)?;
//! let input = UserInput::builder()
//!     .question("career", "Should I accept the offer?")
//!     .numbers(vec![3, 8, 5])
//!     .build()?;
//! let analysis = engine.analyze(&input).await?;
//! println!("{}", analysis.conflict_info.summary());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod input;
pub mod judgment;
pub mod observer;
pub mod prompt;
pub mod provider;
pub mod selector;
pub mod theory;

// Re-export primary types at crate root for convenience
pub use config::EngineConfig;
pub use conflict::{
    Conflict, ConflictInfo, ConflictLevel, ConflictPolicy, ConflictResolver, Resolution,
    ResolutionStrategy,
};
pub use engine::{Analysis, AnalysisId, DecisionEngine};
pub use error::{
    DispatchError, ExecutionError, ManticError, ManticResult, ProviderError, ProviderFailure, Stage,
    ValidationError,
};
pub use input::{
    BirthCertainty, BirthInfo, CalendarType, Direction, Gender, InputField, PersonBirthInfo,
    UserInput,
};
pub use judgment::Judgment;
pub use observer::{AnalysisObserver, SilentObserver};
pub use prompt::{DefaultPromptRenderer, PromptRenderer};
pub use provider::{
    BackoffPolicy, CallOptions, Consistency, DispatchConfig, Dispatcher, ProviderBackend,
    ProviderConfig, ProviderRegistry, TaskType, VerificationAdvisory,
};
pub use selector::{Selection, SelectionConfig, SelectionReason, SelectedTheory, TheorySelector};
pub use theory::{
    StandardAnswer, TheoryAnalysisResult, TheoryCalculator, TheoryCatalog, TheorySpec, TheoryTier,
};
