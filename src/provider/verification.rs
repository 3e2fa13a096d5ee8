//! Consistency check between two providers' answers to the same prompt.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Score at or above which two answers count as highly consistent.
pub const HIGH_CONSISTENCY: f64 = 0.8;
/// Score at or above which two answers count as moderately consistent.
pub const MEDIUM_CONSISTENCY: f64 = 0.6;

const VERDICT_PATTERN: &str = concat!(
    r"(?i)\b(strong[\s-]?positive|strong[\s-]?negative|positive|negative|neutral",
    r"|unfavou?rable|favou?rable|inauspicious|auspicious|recommend(?:ed)?|avoid|caution)\b",
);

fn verdict_regex() -> &'static Regex {
    static VERDICT: OnceLock<Regex> = OnceLock::new();
    VERDICT.get_or_init(|| Regex::new(VERDICT_PATTERN).expect("verdict pattern is a valid regex"))
}

/// Agreement band between two answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    High,
    Medium,
    Low,
    /// Only one provider answered.
    SingleSource,
}

impl Consistency {
    /// Band for a consistency score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONSISTENCY {
            Self::High
        } else if score >= MEDIUM_CONSISTENCY {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Advisory attached to a dual-verified interpretation. Never blocks a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAdvisory {
    pub consistency: Consistency,
    /// `None` for single-source results.
    pub score: Option<f64>,
    pub primary_provider: String,
    pub secondary_provider: Option<String>,
    pub notes: Vec<String>,
}

impl VerificationAdvisory {
    /// Compares two answers.
    ///
    /// Score = 0.3 x length ratio + 0.7 x Jaccard overlap of verdict words.
    #[must_use]
    pub fn compare(
        primary_provider: &str,
        primary: &str,
        secondary_provider: &str,
        secondary: &str,
    ) -> Self {
        let (a_len, b_len) = (primary.chars().count(), secondary.chars().count());
        let longest = a_len.max(b_len);
        #[allow(clippy::cast_precision_loss)]
        let length_ratio = if longest == 0 {
            1.0
        } else {
            a_len.min(b_len) as f64 / longest as f64
        };

        let a = verdict_terms(primary);
        let b = verdict_terms(secondary);
        let union = a.union(&b).count();
        #[allow(clippy::cast_precision_loss)]
        let overlap = if union == 0 {
            0.0
        } else {
            a.intersection(&b).count() as f64 / union as f64
        };

        let score = (length_ratio * 0.3 + overlap * 0.7).clamp(0.0, 1.0);
        let mut notes = Vec::new();
        if lean(&a) * lean(&b) < 0 {
            notes.push(format!(
                "{primary_provider} and {secondary_provider} lean in opposite directions"
            ));
        }
        if length_ratio < 0.5 {
            notes.push("answers differ markedly in length".to_string());
        }
        if union == 0 {
            notes.push("no verdict wording found to compare".to_string());
        }

        Self {
            consistency: Consistency::from_score(score),
            score: Some(score),
            primary_provider: primary_provider.to_string(),
            secondary_provider: Some(secondary_provider.to_string()),
            notes,
        }
    }

    /// Advisory for a result only one provider produced.
    #[must_use]
    pub fn single_source(provider: &str, reason: impl Into<String>) -> Self {
        Self {
            consistency: Consistency::SingleSource,
            score: None,
            primary_provider: provider.to_string(),
            secondary_provider: None,
            notes: vec![reason.into()],
        }
    }
}

fn verdict_terms(text: &str) -> BTreeSet<String> {
    verdict_regex()
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .to_lowercase()
                .chars()
                .filter(char::is_ascii_alphabetic)
                .collect()
        })
        .collect()
}

/// +1 favorable, -1 unfavorable, 0 mixed or silent.
fn lean(terms: &BTreeSet<String>) -> i32 {
    let favorable = [
        "positive",
        "strongpositive",
        "favorable",
        "favourable",
        "auspicious",
        "recommend",
        "recommended",
    ];
    let unfavorable = [
        "negative",
        "strongnegative",
        "unfavorable",
        "unfavourable",
        "inauspicious",
        "avoid",
        "caution",
    ];
    let up = terms.iter().filter(|t| favorable.contains(&t.as_str())).count();
    let down = terms.iter().filter(|t| unfavorable.contains(&t.as_str())).count();
    match up.cmp(&down) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_answers_are_high() {
        let text = "The outlook is positive; we recommend moving ahead in spring.";
        let advisory = VerificationAdvisory::compare("claude", text, "gemini", text);
        assert_eq!(advisory.consistency, Consistency::High);
        assert!((advisory.score.unwrap() - 1.0).abs() < 1e-9);
        assert!(advisory.notes.is_empty());
    }

    #[test]
    fn test_opposite_answers_are_low() {
        let advisory = VerificationAdvisory::compare(
            "claude",
            "A favorable period, positive signs overall.",
            "deepseek",
            "An unfavorable period; avoid big commitments.",
        );
        assert_eq!(advisory.consistency, Consistency::Low);
        assert!(advisory.notes.iter().any(|n| n.contains("opposite")));
    }

    #[test]
    fn test_no_verdict_words() {
        let advisory = VerificationAdvisory::compare("a", "hello there", "b", "hello there");
        assert!((advisory.score.unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(advisory.consistency, Consistency::Low);
    }

    #[test]
    fn test_strong_variants_normalized() {
        let a = verdict_terms("Strong-Positive reading");
        let b = verdict_terms("strong positive reading");
        assert_eq!(a, b);
    }

    #[test]
    fn test_bands() {
        assert_eq!(Consistency::from_score(0.8), Consistency::High);
        assert_eq!(Consistency::from_score(0.6), Consistency::Medium);
        assert_eq!(Consistency::from_score(0.59), Consistency::Low);
    }

    #[test]
    fn test_single_source() {
        let advisory = VerificationAdvisory::single_source("gemini", "claude failed");
        assert_eq!(advisory.consistency, Consistency::SingleSource);
        assert!(advisory.score.is_none());
    }
}
