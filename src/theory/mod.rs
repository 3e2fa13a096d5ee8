//! Theory calculators and their declared input requirements.
//!
//! Calculators are external collaborators: pure, deterministic functions of a
//! [`UserInput`]. The engine only relies on the capability surface defined by
//! [`TheoryCalculator`] and on the standardized [`StandardAnswer`] each one
//! produces.

mod builtin;
mod catalog;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;
use crate::input::{InputField, UserInput};
use crate::judgment::{ensure_unit, Judgment};
use crate::provider::VerificationAdvisory;

pub use builtin::{classical_spec, classical_specs, DOMAIN_PRIORITY};
pub use catalog::TheoryCatalog;

/// Slack for float sums of field weights when comparing against a minimum.
const COMPLETENESS_TOLERANCE: f64 = 1e-9;

/// Failure reported by a calculator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TheoryError {
    /// Human-readable reason.
    pub message: String,
}

impl TheoryError {
    /// Creates a calculator error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Depth class of a theory; quick theories run (and are interpreted) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TheoryTier {
    /// Fast, low-requirement divinations.
    Quick,
    /// Birth-chart based analyses.
    Basic,
    /// Elaborate time/space based methods.
    Deep,
}

impl fmt::Display for TheoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quick => write!(f, "quick"),
            Self::Basic => write!(f, "basic"),
            Self::Deep => write!(f, "deep"),
        }
    }
}

/// Static description of what a theory needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheorySpec {
    pub name: String,
    pub tier: TheoryTier,
    pub required: Vec<InputField>,
    pub optional: Vec<InputField>,
    /// Weight per field in `[0, 1]`; fields without an entry weigh nothing.
    pub weights: BTreeMap<InputField, f64>,
    /// Completeness below which the theory is not applicable.
    pub min_completeness: f64,
}

impl TheorySpec {
    /// Starts a spec with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>, tier: TheoryTier) -> Self {
        Self {
            name: name.into(),
            tier,
            required: Vec::new(),
            optional: Vec::new(),
            weights: BTreeMap::new(),
            min_completeness: 0.0,
        }
    }

    /// Adds a required field with its weight.
    #[must_use]
    pub fn require(mut self, field: InputField, weight: f64) -> Self {
        self.required.push(field);
        self.weights.insert(field, weight);
        self
    }

    /// Adds an optional field with its weight.
    #[must_use]
    pub fn optional(mut self, field: InputField, weight: f64) -> Self {
        self.optional.push(field);
        self.weights.insert(field, weight);
        self
    }

    /// Sets the minimum completeness.
    #[must_use]
    pub fn min_completeness(mut self, min: f64) -> Self {
        self.min_completeness = min;
        self
    }

    /// Checks weights and the minimum completeness.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for out-of-range values or an empty name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "theory name".to_string(),
            });
        }
        ensure_unit(&format!("{}.min_completeness", self.name), self.min_completeness)?;
        for (field, weight) in &self.weights {
            ensure_unit(&format!("{}.weight[{field}]", self.name), *weight)?;
        }
        Ok(())
    }

    fn weight(&self, field: InputField) -> f64 {
        self.weights.get(&field).copied().unwrap_or(0.0)
    }

    fn fields(&self) -> impl Iterator<Item = InputField> + '_ {
        self.required.iter().chain(self.optional.iter()).copied()
    }

    /// Returns true when every required field is present in `input`.
    #[must_use]
    pub fn required_present(&self, input: &UserInput) -> bool {
        self.required.iter().all(|f| input.has_field(*f))
    }

    /// Required fields absent from `input`.
    #[must_use]
    pub fn missing_required(&self, input: &UserInput) -> Vec<InputField> {
        self.required
            .iter()
            .copied()
            .filter(|f| !input.has_field(*f))
            .collect()
    }

    /// Weighted fraction of declared fields present in `input`.
    ///
    /// Always in `[0, 1]`; `0` whenever a required field is missing. A theory
    /// whose fields weigh nothing is complete once its required fields are in.
    #[must_use]
    pub fn completeness(&self, input: &UserInput) -> f64 {
        if !self.required_present(input) {
            return 0.0;
        }
        let total: f64 = self.fields().map(|f| self.weight(f)).sum();
        if total <= 0.0 {
            return 1.0;
        }
        let achieved: f64 = self
            .fields()
            .filter(|f| input.has_field(*f))
            .map(|f| self.weight(f))
            .sum();
        (achieved / total).clamp(0.0, 1.0)
    }

    /// Returns true if `completeness` clears the declared minimum.
    #[must_use]
    pub fn meets_minimum(&self, completeness: f64) -> bool {
        completeness + COMPLETENESS_TOLERANCE >= self.min_completeness
    }

    /// Returns true if the theory can run on `input` without relaxation.
    #[must_use]
    pub fn is_applicable(&self, input: &UserInput) -> bool {
        self.required_present(input) && self.meets_minimum(self.completeness(input))
    }

    /// Returns true if the theory relies on the birth hour.
    #[must_use]
    pub fn depends_on_birth_hour(&self) -> bool {
        self.required.contains(&InputField::BirthHour) || self.weight(InputField::BirthHour) > 0.0
    }
}

/// Standardized summary every calculator reduces its raw output to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardAnswer {
    pub judgment: Judgment,
    pub judgment_level: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl StandardAnswer {
    /// Creates an answer without timing or advice.
    #[must_use]
    pub fn new(judgment: Judgment, judgment_level: f64, confidence: f64) -> Self {
        Self {
            judgment,
            judgment_level,
            confidence,
            timing: None,
            advice: None,
        }
    }

    /// Reads the conventional keys of a raw calculation payload.
    ///
    /// Missing keys default to a neutral judgment at level 0.5 with
    /// confidence 0.8.
    ///
    /// # Errors
    ///
    /// Returns `TheoryError` if `judgment` is present but not a known category.
    pub fn from_payload(raw: &serde_json::Value) -> Result<Self, TheoryError> {
        let judgment = match raw.get("judgment") {
            None | Some(serde_json::Value::Null) => Judgment::Neutral,
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| TheoryError::new(format!("unrecognized judgment {value}: {e}")))?,
        };
        let number = |key: &str, default: f64| {
            raw.get(key).and_then(serde_json::Value::as_f64).unwrap_or(default)
        };
        let text = |key: &str| raw.get(key).and_then(serde_json::Value::as_str).map(str::to_string);

        Ok(Self {
            judgment,
            judgment_level: number("judgment_level", 0.5),
            confidence: number("confidence", 0.8),
            timing: text("timing"),
            advice: text("advice"),
        })
    }

    /// Checks that level and confidence lie in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfUnitRange` otherwise.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_unit("judgment_level", self.judgment_level)?;
        ensure_unit("confidence", self.confidence)?;
        Ok(())
    }
}

/// Capability surface of a theory calculator.
///
/// All methods are pure and deterministic.
pub trait TheoryCalculator: Send + Sync {
    /// Static requirements of this theory.
    fn spec(&self) -> &TheorySpec;

    /// Runs the ruleset and returns its raw, theory-specific payload.
    ///
    /// # Errors
    ///
    /// Returns `TheoryError` when the input cannot be charted.
    fn calculate(&self, input: &UserInput) -> Result<serde_json::Value, TheoryError>;

    /// Reduces a raw payload to the standardized answer.
    ///
    /// # Errors
    ///
    /// Returns `TheoryError` when the payload is not understood.
    fn to_standard_answer(&self, raw: &serde_json::Value) -> Result<StandardAnswer, TheoryError> {
        StandardAnswer::from_payload(raw)
    }

    /// Theory name.
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Fields that must be present.
    fn required_fields(&self) -> &[InputField] {
        &self.spec().required
    }

    /// Fields that improve the analysis when present.
    fn optional_fields(&self) -> &[InputField] {
        &self.spec().optional
    }

    /// Weight of each declared field.
    fn field_weights(&self) -> &BTreeMap<InputField, f64> {
        &self.spec().weights
    }

    /// Completeness below which the theory is not applicable.
    fn min_completeness(&self) -> f64 {
        self.spec().min_completeness
    }
}

/// Outcome of one theory in one analysis run. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoryAnalysisResult {
    pub theory: String,
    /// Raw calculator payload.
    pub calculation: serde_json::Value,
    /// Natural-language interpretation from a provider.
    pub interpretation: String,
    pub judgment: Judgment,
    pub judgment_level: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
    /// Provider that produced the interpretation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Dual-verification advisory, when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationAdvisory>,
}

impl TheoryAnalysisResult {
    /// Builds a result from a standardized answer with no interpretation yet.
    #[must_use]
    pub fn from_answer(theory: impl Into<String>, answer: StandardAnswer) -> Self {
        Self {
            theory: theory.into(),
            calculation: serde_json::Value::Null,
            interpretation: String::new(),
            judgment: answer.judgment,
            judgment_level: answer.judgment_level,
            confidence: answer.confidence,
            timing: answer.timing,
            advice: answer.advice,
            provider: None,
            verification: None,
        }
    }

    /// Numeric anchor of this result on the `[0, 1]` verdict axis.
    #[must_use]
    pub fn anchor(&self) -> f64 {
        self.judgment.anchor(self.judgment_level)
    }
}
