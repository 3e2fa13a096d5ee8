//! Judgment categories and their numeric anchors.
//!
//! Every theory reports one of five ordered categories plus a degree
//! (`judgment_level`). Reconciliation works on a single numeric axis in
//! `[0.0, 1.0]`; this module owns the mapping in both directions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Ordered verdict category, from strong-negative to strong-positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    /// Strongly unfavorable.
    StrongNegative,
    /// Unfavorable.
    Negative,
    /// Neither favorable nor unfavorable.
    Neutral,
    /// Favorable.
    Positive,
    /// Strongly favorable.
    StrongPositive,
}

impl Judgment {
    /// All categories in ascending order.
    pub const ALL: [Self; 5] = [
        Self::StrongNegative,
        Self::Negative,
        Self::Neutral,
        Self::Positive,
        Self::StrongPositive,
    ];

    /// Lower bounds of the score bands, from strong-positive downwards.
    pub const BREAKPOINTS: [(f64, Self); 4] = [
        (0.85, Self::StrongPositive),
        (0.65, Self::Positive),
        (0.35, Self::Neutral),
        (0.15, Self::Negative),
    ];

    /// Base anchor of the category on the `[0, 1]` axis.
    #[must_use]
    pub const fn base_anchor(self) -> f64 {
        match self {
            Self::StrongPositive => 1.0,
            Self::Positive => 0.7,
            Self::Neutral => 0.5,
            Self::Negative => 0.3,
            Self::StrongNegative => 0.0,
        }
    }

    /// Anchor blended with the judgment level inside the category's band.
    ///
    /// A higher level pushes favorable categories up and unfavorable ones
    /// down; neutral stays at 0.5. The result is clamped to `[0, 1]`.
    #[must_use]
    pub fn anchor(self, level: f64) -> f64 {
        let level = level.clamp(0.0, 1.0);
        let base = self.base_anchor();
        let value = match self {
            Self::StrongPositive | Self::Positive => base + (1.0 - base) * (level - 0.5) * 0.5,
            Self::Negative | Self::StrongNegative => base - base * (level - 0.5) * 0.5,
            Self::Neutral => 0.5,
        };
        value.clamp(0.0, 1.0)
    }

    /// Maps a reconciled score back to a category using [`Self::BREAKPOINTS`].
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        Self::BREAKPOINTS
            .iter()
            .find(|(lower, _)| score >= *lower)
            .map_or(Self::StrongNegative, |(_, judgment)| *judgment)
    }

    /// Returns true for the two extreme categories.
    #[must_use]
    pub const fn is_extreme(self) -> bool {
        matches!(self, Self::StrongPositive | Self::StrongNegative)
    }

    /// Returns true if `self` and `other` are the two opposite extremes.
    #[must_use]
    pub const fn is_polar_to(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::StrongPositive, Self::StrongNegative)
                | (Self::StrongNegative, Self::StrongPositive)
        )
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrongPositive => write!(f, "strong-positive"),
            Self::Positive => write!(f, "positive"),
            Self::Neutral => write!(f, "neutral"),
            Self::Negative => write!(f, "negative"),
            Self::StrongNegative => write!(f, "strong-negative"),
        }
    }
}

/// Checks that a value lies in `[0.0, 1.0]`.
///
/// # Errors
///
/// Returns `ValidationError::OutOfUnitRange` for values outside the range or NaN.
pub fn ensure_unit(field: &str, value: f64) -> Result<f64, ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfUnitRange {
            field: field.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremes_are_fixed() {
        assert!((Judgment::StrongPositive.anchor(0.0) - 1.0).abs() < 1e-12);
        assert!((Judgment::StrongPositive.anchor(1.0) - 1.0).abs() < 1e-12);
        assert!(Judgment::StrongNegative.anchor(0.2).abs() < 1e-12);
        assert!((Judgment::Neutral.anchor(0.9) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_anchor_moves_with_level() {
        assert!(Judgment::Positive.anchor(0.9) > Judgment::Positive.anchor(0.5));
        assert!(Judgment::Negative.anchor(0.9) < Judgment::Negative.anchor(0.5));
        assert!((Judgment::Positive.anchor(0.7) - 0.73).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_stays_in_unit_range() {
        for judgment in Judgment::ALL {
            for step in 0..=20 {
                let level = f64::from(step) / 20.0;
                let anchor = judgment.anchor(level);
                assert!((0.0..=1.0).contains(&anchor), "{judgment} {level} -> {anchor}");
            }
        }
    }

    #[test]
    fn test_breakpoints_are_monotonic() {
        let mut previous = Judgment::StrongNegative;
        for step in 0..=100 {
            let current = Judgment::from_score(f64::from(step) / 100.0);
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(Judgment::from_score(0.85), Judgment::StrongPositive);
        assert_eq!(Judgment::from_score(0.84), Judgment::Positive);
        assert_eq!(Judgment::from_score(0.5), Judgment::Neutral);
        assert_eq!(Judgment::from_score(0.15), Judgment::Negative);
        assert_eq!(Judgment::from_score(0.149), Judgment::StrongNegative);
    }

    #[test]
    fn test_polarity() {
        assert!(Judgment::StrongPositive.is_polar_to(Judgment::StrongNegative));
        assert!(!Judgment::StrongPositive.is_polar_to(Judgment::Negative));
        assert!(Judgment::StrongNegative.is_extreme());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Judgment::StrongNegative).unwrap();
        assert_eq!(json, "\"strong_negative\"");
        assert_eq!(format!("{}", Judgment::StrongNegative), "strong-negative");
    }

    #[test]
    fn test_ensure_unit() {
        assert!(ensure_unit("confidence", 0.4).is_ok());
        assert!(ensure_unit("confidence", 1.2).is_err());
        assert!(ensure_unit("confidence", f64::NAN).is_err());
    }
}
