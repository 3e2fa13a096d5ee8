//! Theory selection.
//!
//! Scores every catalog theory against a [`UserInput`], keeps the qualified
//! ones, and relaxes the minimum-completeness gate when too few qualify.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::input::{BirthCertainty, InputField, UserInput};
use crate::theory::{TheoryCatalog, TheorySpec, TheoryTier};

/// Score factor for hour-dependent theories when the birth hour is a guess.
pub const APPROXIMATE_HOUR_FACTOR: f64 = 0.8;
/// Score factor for hour-dependent theories when the birth hour is unknown.
pub const UNKNOWN_HOUR_FACTOR: f64 = 0.3;

/// Bounds on how many theories one analysis runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub min_theories: usize,
    pub max_theories: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_theories: 3,
            max_theories: 5,
        }
    }
}

impl SelectionConfig {
    /// Checks that `1 <= min <= max`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelectionBounds` otherwise.
    pub const fn validate(&self) -> Result<(), ValidationError> {
        if self.min_theories == 0 || self.min_theories > self.max_theories {
            return Err(ValidationError::InvalidSelectionBounds {
                min: self.min_theories,
                max: self.max_theories,
            });
        }
        Ok(())
    }
}

/// A theory chosen for this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedTheory {
    pub name: String,
    pub tier: TheoryTier,
    /// Unattenuated completeness in `[0, 1]`.
    pub completeness: f64,
    /// Ranking score (completeness after birth-certainty attenuation).
    pub score: f64,
    /// True if admitted below its minimum completeness.
    pub relaxed: bool,
}

/// Why the selection looks the way it does.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionReason {
    pub summary: String,
    /// Theories admitted below their minimum completeness.
    pub relaxed: Vec<String>,
    /// True when fewer than the minimum number of theories qualified.
    pub shortfall: bool,
    /// Inputs that would unlock more theories.
    pub missing_info: Vec<String>,
}

/// Output of [`TheorySelector::select`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub selected: Vec<SelectedTheory>,
    pub reason: SelectionReason,
}

impl Selection {
    /// Names of the selected theories in ranking order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.name.as_str()).collect()
    }

    /// Selected theories ordered for execution.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&SelectedTheory> {
        execution_order(&self.selected)
    }
}

/// Orders theories quick tier first, then basic, then deep; stable within a tier.
#[must_use]
pub fn execution_order(selected: &[SelectedTheory]) -> Vec<&SelectedTheory> {
    let mut ordered: Vec<&SelectedTheory> = selected.iter().collect();
    ordered.sort_by_key(|s| s.tier);
    ordered
}

struct Candidate<'a> {
    spec: &'a TheorySpec,
    completeness: f64,
    score: f64,
    rank: usize,
}

impl Candidate<'_> {
    fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.rank.cmp(&other.rank))
            .then_with(|| self.spec.name.cmp(&other.spec.name))
    }

    fn into_selected(self, relaxed: bool) -> SelectedTheory {
        SelectedTheory {
            name: self.spec.name.clone(),
            tier: self.spec.tier,
            completeness: self.completeness,
            score: self.score,
            relaxed,
        }
    }
}

/// Stateless, deterministic theory selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TheorySelector;

impl TheorySelector {
    /// Creates a selector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Selects between `min_count` and `max_count` theories for `input`.
    ///
    /// Falling short of `min_count` is reported in the reason, never as an
    /// error. The result may be empty if nothing in the catalog can run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelectionBounds` if the bounds are inconsistent.
    pub fn select(
        &self,
        input: &UserInput,
        catalog: &TheoryCatalog,
        min_count: usize,
        max_count: usize,
    ) -> Result<Selection, ValidationError> {
        SelectionConfig {
            min_theories: min_count,
            max_theories: max_count,
        }
        .validate()?;

        let certainty = input.birth_certainty();
        let mut qualified = Vec::new();
        let mut below_minimum = Vec::new();

        for calculator in catalog.iter() {
            let spec = calculator.spec();
            if !spec.required_present(input) {
                continue;
            }
            let completeness = spec.completeness(input);
            let candidate = Candidate {
                spec,
                completeness,
                score: attenuate(spec, completeness, certainty),
                rank: catalog.priority_rank(&spec.name),
            };
            if spec.meets_minimum(completeness) {
                qualified.push(candidate);
            } else {
                below_minimum.push(candidate);
            }
        }

        qualified.sort_by(Candidate::cmp_rank);
        below_minimum.sort_by(Candidate::cmp_rank);

        let qualified_count = qualified.len();
        let shortfall = qualified_count < min_count;

        let mut selected: Vec<SelectedTheory> = qualified
            .into_iter()
            .take(max_count)
            .map(|c| c.into_selected(false))
            .collect();

        let mut relaxed = Vec::new();
        if shortfall {
            let needed = min_count - selected.len();
            for candidate in below_minimum.into_iter().take(needed) {
                relaxed.push(candidate.spec.name.clone());
                selected.push(candidate.into_selected(true));
            }
        }

        let missing_info = missing_info(input, catalog, &selected);
        let summary = summarize(&selected, qualified_count, &relaxed, shortfall, min_count);

        debug!(
            fingerprint = %input.fingerprint(),
            selected = ?selected.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            qualified = qualified_count,
            shortfall,
            "theories selected"
        );

        Ok(Selection {
            selected,
            reason: SelectionReason {
                summary,
                relaxed,
                shortfall,
                missing_info,
            },
        })
    }
}

fn attenuate(spec: &TheorySpec, completeness: f64, certainty: BirthCertainty) -> f64 {
    if !spec.depends_on_birth_hour() {
        return completeness;
    }
    match certainty {
        BirthCertainty::Exact => completeness,
        BirthCertainty::Approximate => completeness * APPROXIMATE_HOUR_FACTOR,
        BirthCertainty::Unknown => completeness * UNKNOWN_HOUR_FACTOR,
    }
}

/// For every unselected theory, the required fields it still lacks.
fn missing_info(
    input: &UserInput,
    catalog: &TheoryCatalog,
    selected: &[SelectedTheory],
) -> Vec<String> {
    let mut unlocks: BTreeMap<InputField, Vec<&str>> = BTreeMap::new();
    for calculator in catalog.iter() {
        let spec = calculator.spec();
        if selected.iter().any(|s| s.name == spec.name) {
            continue;
        }
        for field in spec.missing_required(input) {
            unlocks.entry(field).or_default().push(&spec.name);
        }
    }
    unlocks
        .into_iter()
        .map(|(field, mut theories)| {
            theories.sort_unstable();
            format!("{field} (enables {})", theories.join(", "))
        })
        .collect()
}

fn summarize(
    selected: &[SelectedTheory],
    qualified: usize,
    relaxed: &[String],
    shortfall: bool,
    min_count: usize,
) -> String {
    let names: Vec<&str> = selected.iter().map(|s| s.name.as_str()).collect();
    let mut summary = format!(
        "selected {} theor{} ({}) from {qualified} qualified",
        selected.len(),
        if selected.len() == 1 { "y" } else { "ies" },
        names.join(", ")
    );
    if shortfall {
        summary.push_str(&format!("; fewer than {min_count} qualified"));
        if !relaxed.is_empty() {
            summary.push_str(&format!(", relaxed minimum for {}", relaxed.join(", ")));
        }
        if selected.len() < min_count {
            summary.push_str("; results rest on limited information");
        }
    }
    summary
}
