//! Interpretation prompts.

use crate::input::{BirthCertainty, UserInput};
use crate::theory::{StandardAnswer, TheorySpec};

/// Renders the prompt sent to a provider for one theory.
pub trait PromptRenderer: Send + Sync {
    /// Builds the interpretation prompt.
    fn render(
        &self,
        spec: &TheorySpec,
        input: &UserInput,
        calculation: &serde_json::Value,
        answer: &StandardAnswer,
    ) -> String;
}

/// Plain-text template used when no custom renderer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptRenderer;

impl PromptRenderer for DefaultPromptRenderer {
    fn render(
        &self,
        spec: &TheorySpec,
        input: &UserInput,
        calculation: &serde_json::Value,
        answer: &StandardAnswer,
    ) -> String {
        let mut prompt = format!(
            "Interpret the following {} ({} tier) reading.\n\
             Question category: {}\n\
             Question: {}\n\
             Computed verdict: {} (level {:.2}, confidence {:.2})\n",
            spec.name,
            spec.tier,
            input.question_type,
            input.question_description,
            answer.judgment,
            answer.judgment_level,
            answer.confidence,
        );
        if let Some(timing) = &answer.timing {
            prompt.push_str(&format!("Timing: {timing}\n"));
        }
        if let Some(advice) = &answer.advice {
            prompt.push_str(&format!("Advice: {advice}\n"));
        }
        if spec.depends_on_birth_hour() && input.birth.is_some() {
            match input.birth_certainty() {
                BirthCertainty::Exact => {}
                BirthCertainty::Approximate => {
                    prompt.push_str(
                        "Note: the birth hour is approximate; hedge hour-dependent conclusions.\n",
                    );
                }
                BirthCertainty::Unknown => {
                    prompt.push_str(
                        "Note: the birth hour is unknown; avoid hour-dependent conclusions.\n",
                    );
                }
            }
        }
        let raw = serde_json::to_string_pretty(calculation)
            .unwrap_or_else(|_| calculation.to_string());
        prompt.push_str("Calculation:\n");
        prompt.push_str(&raw);
        prompt.push_str("\nExplain the verdict in plain language and stay consistent with it.");
        prompt
    }
}
