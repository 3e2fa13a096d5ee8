//! Conflict detection and reconciliation across theory results.
//!
//! Disagreement between theories is an explicit output, not an error.
//! Every pair of results is compared on the numeric verdict axis; pairs far
//! enough apart become [`Conflict`] records, and the whole set is reconciled
//! into one confidence-weighted [`Resolution`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ExecutionError, ValidationError};
use crate::judgment::{ensure_unit, Judgment};
use crate::theory::TheoryAnalysisResult;

/// Severity of a recorded conflict. Differences below `Minor` are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictLevel {
    /// Level 2: a difference of degree.
    Minor,
    /// Level 3: a significant difference.
    Significant,
    /// Level 4: polar opposition.
    Severe,
}

impl ConflictLevel {
    /// Numeric level (2, 3 or 4).
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Minor => 2,
            Self::Significant => 3,
            Self::Severe => 4,
        }
    }

    /// Short human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Minor => "difference of degree",
            Self::Significant => "significant difference",
            Self::Severe => "polar opposition",
        }
    }
}

impl fmt::Display for ConflictLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} ({})", self.as_u8(), self.label())
    }
}

/// Tunable thresholds and penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictPolicy {
    /// Smallest recorded difference (level 2).
    pub minor_threshold: f64,
    /// Level 3 from here.
    pub significant_threshold: f64,
    /// Level 4 from here.
    pub severe_threshold: f64,
    /// Confidence multiplier when any level-4 conflict exists.
    pub severe_penalty: f64,
    /// Confidence multiplier when the worst conflict is level 3.
    pub significant_penalty: f64,
    /// Weight above which a theory is called out as dominant.
    pub dominant_weight: f64,
    /// Adjusted confidence below which a low-confidence note is added.
    pub low_confidence: f64,
    /// Adjusted confidence at or above which a high-confidence note is added.
    pub high_confidence: f64,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            minor_threshold: 0.15,
            significant_threshold: 0.35,
            severe_threshold: 0.6,
            severe_penalty: 0.85,
            significant_penalty: 0.95,
            dominant_weight: 0.4,
            low_confidence: 0.6,
            high_confidence: 0.8,
        }
    }
}

impl ConflictPolicy {
    /// Checks ranges and threshold ordering.
    ///
    /// # Errors
    ///
    /// Returns a validation error for values outside `[0, 1]` or thresholds
    /// that are not strictly increasing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("conflict.minor_threshold", self.minor_threshold),
            ("conflict.significant_threshold", self.significant_threshold),
            ("conflict.severe_threshold", self.severe_threshold),
            ("conflict.severe_penalty", self.severe_penalty),
            ("conflict.significant_penalty", self.significant_penalty),
            ("conflict.dominant_weight", self.dominant_weight),
            ("conflict.low_confidence", self.low_confidence),
            ("conflict.high_confidence", self.high_confidence),
        ] {
            ensure_unit(field, value)?;
        }
        let increasing = self.minor_threshold < self.significant_threshold
            && self.significant_threshold < self.severe_threshold;
        if !increasing {
            return Err(ValidationError::InvalidConfig {
                reason: "conflict thresholds must be strictly increasing".to_string(),
            });
        }
        Ok(())
    }

    /// Level for a pair of anchors, or `None` below the minor threshold.
    #[must_use]
    pub fn classify(
        &self,
        a: Judgment,
        anchor_a: f64,
        b: Judgment,
        anchor_b: f64,
    ) -> Option<ConflictLevel> {
        let delta = (anchor_a - anchor_b).abs();
        if a.is_polar_to(b) || delta >= self.severe_threshold {
            Some(ConflictLevel::Severe)
        } else if delta >= self.significant_threshold {
            Some(ConflictLevel::Significant)
        } else if delta >= self.minor_threshold {
            Some(ConflictLevel::Minor)
        } else {
            None
        }
    }
}

/// A recorded disagreement between two theories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub level: ConflictLevel,
    /// The two theories, in result order.
    pub theories: [String; 2],
    pub anchors: [f64; 2],
    pub delta: f64,
    pub detail: String,
}

/// How the reconciled verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Only one theory ran.
    SingleTheory,
    /// No recorded conflicts.
    Consistent,
    /// Only level-2 conflicts.
    SimpleAverage,
    /// Worst conflict is level 3.
    WeightedHarmonization,
    /// At least one level-4 conflict.
    Arbitration,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SingleTheory => "single_theory",
            Self::Consistent => "consistent",
            Self::SimpleAverage => "simple_average",
            Self::WeightedHarmonization => "weighted_harmonization",
            Self::Arbitration => "arbitration",
        };
        f.write_str(label)
    }
}

/// Reconciled verdict over all results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    pub judgment: Judgment,
    /// Reconciled score in `[0, 1]`.
    pub score: f64,
    /// Normalized weight per theory, proportional to confidence.
    pub weights: BTreeMap<String, f64>,
    /// Severity-adjusted confidence in `[0, 1]`.
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

/// Conflicts of one run plus their resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// True iff `conflicts` is non-empty.
    pub has_conflict: bool,
    /// Ordered by pair position in the result list.
    pub conflicts: Vec<Conflict>,
    pub resolution: Option<Resolution>,
}

impl ConflictInfo {
    /// Number of conflicts at `level`.
    #[must_use]
    pub fn count(&self, level: ConflictLevel) -> usize {
        self.conflicts.iter().filter(|c| c.level == level).count()
    }

    /// Highest recorded level.
    #[must_use]
    pub fn worst(&self) -> Option<ConflictLevel> {
        self.conflicts.iter().map(|c| c.level).max()
    }

    /// Short text digest: counts per level, strategy and verdict.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.has_conflict {
            parts.push(format!(
                "{} conflict(s): {} severe, {} significant, {} minor",
                self.conflicts.len(),
                self.count(ConflictLevel::Severe),
                self.count(ConflictLevel::Significant),
                self.count(ConflictLevel::Minor)
            ));
        } else {
            parts.push("no conflicts".to_string());
        }
        if let Some(r) = &self.resolution {
            parts.push(format!(
                "strategy {}; verdict {} (score {:.2}, confidence {:.2})",
                r.strategy, r.judgment, r.score, r.confidence
            ));
        }
        parts.join("; ")
    }
}

/// Stateless, deterministic conflict resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
}

impl ConflictResolver {
    /// Creates a resolver with the given policy.
    #[must_use]
    pub const fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Detects conflicts among `results` and reconciles them.
    ///
    /// # Errors
    ///
    /// Returns `EmptyResultSet` when `results` is empty.
    pub fn resolve(
        &self,
        results: &[TheoryAnalysisResult],
    ) -> Result<ConflictInfo, ExecutionError> {
        match results {
            [] => Err(ExecutionError::EmptyResultSet),
            [only] => Ok(single(only)),
            _ => Ok(self.reconcile(results)),
        }
    }

    fn reconcile(&self, results: &[TheoryAnalysisResult]) -> ConflictInfo {
        let anchors: Vec<f64> = results.iter().map(TheoryAnalysisResult::anchor).collect();

        let mut conflicts = Vec::new();
        for i in 0..results.len() {
            for j in (i + 1)..results.len() {
                let (a, b) = (&results[i], &results[j]);
                let level = self.policy.classify(a.judgment, anchors[i], b.judgment, anchors[j]);
                if let Some(level) = level {
                    conflicts.push(describe(level, a, anchors[i], b, anchors[j]));
                }
            }
        }

        let weights = normalized_weights(results);
        let score = results
            .iter()
            .zip(&anchors)
            .zip(&weights)
            .map(|((_, anchor), w)| anchor * w)
            .sum::<f64>()
            .clamp(0.0, 1.0);
        let mean_confidence: f64 = results
            .iter()
            .zip(&weights)
            .map(|(r, w)| r.confidence.clamp(0.0, 1.0) * w)
            .sum();

        let worst = conflicts.iter().map(|c| c.level).max();
        let (strategy, penalty) = match worst {
            Some(ConflictLevel::Severe) => {
                (ResolutionStrategy::Arbitration, self.policy.severe_penalty)
            }
            Some(ConflictLevel::Significant) => {
                (ResolutionStrategy::WeightedHarmonization, self.policy.significant_penalty)
            }
            Some(ConflictLevel::Minor) => (ResolutionStrategy::SimpleAverage, 1.0),
            None => (ResolutionStrategy::Consistent, 1.0),
        };
        let confidence = (mean_confidence * penalty).clamp(0.0, 1.0);

        let mut weight_map: BTreeMap<String, f64> = BTreeMap::new();
        for (r, w) in results.iter().zip(&weights) {
            *weight_map.entry(r.theory.clone()).or_insert(0.0) += w;
        }

        let recommendations = self.recommendations(&conflicts, &weight_map, confidence);
        let judgment = Judgment::from_score(score);

        debug!(
            results = results.len(),
            conflicts = conflicts.len(),
            strategy = %strategy,
            score,
            confidence,
            "conflicts resolved"
        );

        ConflictInfo {
            has_conflict: !conflicts.is_empty(),
            conflicts,
            resolution: Some(Resolution {
                strategy,
                judgment,
                score,
                weights: weight_map,
                confidence,
                recommendations,
            }),
        }
    }

    fn recommendations(
        &self,
        conflicts: &[Conflict],
        weights: &BTreeMap<String, f64>,
        confidence: f64,
    ) -> Vec<String> {
        let mut out = Vec::new();
        let severe: Vec<&Conflict> = conflicts
            .iter()
            .filter(|c| c.level == ConflictLevel::Severe)
            .collect();
        let significant = conflicts
            .iter()
            .filter(|c| c.level == ConflictLevel::Significant)
            .count();

        if severe.is_empty() {
            if significant > 0 {
                out.push(format!(
                    "{significant} significant difference(s) found; \
                     lean on the higher-confidence theories"
                ));
            } else {
                out.push("The theories are broadly consistent".to_string());
            }
        } else {
            let involved: BTreeSet<&str> = severe
                .iter()
                .flat_map(|c| c.theories.iter().map(String::as_str))
                .collect();
            out.push(format!(
                "{} polar opposition(s) found; treat the verdict with caution",
                severe.len()
            ));
            out.push(format!(
                "Strong disagreement between {}; weigh them by confidence or add information",
                involved.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        if confidence < self.policy.low_confidence {
            out.push(
                "Overall confidence is low; more input would sharpen the analysis".to_string(),
            );
        } else if confidence >= self.policy.high_confidence {
            out.push("Overall confidence is high".to_string());
        }

        let mut dominant: Option<(&str, f64)> = None;
        for (name, &w) in weights {
            if dominant.map_or(true, |(_, best)| w > best) {
                dominant = Some((name, w));
            }
        }
        if let Some((name, w)) = dominant.filter(|(_, w)| *w > self.policy.dominant_weight) {
            out.push(format!(
                "{name} carries the most weight ({:.0}%); its reading deserves the closest look",
                w * 100.0
            ));
        }
        out
    }
}

fn single(result: &TheoryAnalysisResult) -> ConflictInfo {
    let confidence = result.confidence.clamp(0.0, 1.0);
    let mut weights = BTreeMap::new();
    weights.insert(result.theory.clone(), 1.0);
    ConflictInfo {
        has_conflict: false,
        conflicts: Vec::new(),
        resolution: Some(Resolution {
            strategy: ResolutionStrategy::SingleTheory,
            judgment: result.judgment,
            score: result.anchor(),
            weights,
            confidence,
            recommendations: vec![format!(
                "Only {} was applied; a second theory would allow cross-checking",
                result.theory
            )],
        }),
    }
}

/// Weights proportional to confidence, uniform when every confidence is zero.
fn normalized_weights(results: &[TheoryAnalysisResult]) -> Vec<f64> {
    let confidences: Vec<f64> = results.iter().map(|r| r.confidence.clamp(0.0, 1.0)).collect();
    let total: f64 = confidences.iter().sum();
    if total > 0.0 {
        confidences.iter().map(|c| c / total).collect()
    } else {
        warn!(results = results.len(), "all confidences are zero, weighting uniformly");
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / results.len() as f64;
        vec![uniform; results.len()]
    }
}

fn describe(
    level: ConflictLevel,
    a: &TheoryAnalysisResult,
    anchor_a: f64,
    b: &TheoryAnalysisResult,
    anchor_b: f64,
) -> Conflict {
    let delta = (anchor_a - anchor_b).abs();
    let detail = match level {
        ConflictLevel::Minor => format!(
            "{} and {} agree in direction but differ in degree ({delta:.2})",
            a.theory, b.theory
        ),
        ConflictLevel::Significant => format!(
            "{} ({}) and {} ({}) differ significantly ({delta:.2})",
            a.theory, a.judgment, b.theory, b.judgment
        ),
        ConflictLevel::Severe => format!(
            "{} judged {} ({anchor_a:.2}) while {} judged {} ({anchor_b:.2}): polar opposition",
            a.theory, a.judgment, b.theory, b.judgment
        ),
    };
    Conflict {
        level,
        theories: [a.theory.clone(), b.theory.clone()],
        anchors: [anchor_a, anchor_b],
        delta,
        detail,
    }
}
