//! Task kinds and the static task to provider table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider order used when nothing else decides.
pub const DEFAULT_PROVIDER_PRIORITY: [&str; 4] = ["claude", "gemini", "deepseek", "kimi"];

/// Kind of work a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Full multi-theory report.
    ComprehensiveReport,
    /// Interpretation of one basic or deep theory.
    SingleTheory,
    /// Interpretation of one quick theory.
    QuickInterpretation,
    /// Short conversational turn.
    QuickInteraction,
    /// Simple question answering.
    SimpleQa,
    /// Extracting birth data from free text.
    BirthInfoParse,
    /// Explaining disagreement between theories.
    ConflictResolution,
    /// Processing user feedback.
    UserFeedback,
}

impl TaskType {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComprehensiveReport => "comprehensive_report",
            Self::SingleTheory => "single_theory",
            Self::QuickInterpretation => "quick_interpretation",
            Self::QuickInteraction => "quick_interaction",
            Self::SimpleQa => "simple_qa",
            Self::BirthInfoParse => "birth_info_parse",
            Self::ConflictResolution => "conflict_resolution",
            Self::UserFeedback => "user_feedback",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider best suited for `task`.
#[must_use]
pub const fn recommended_provider(task: TaskType) -> &'static str {
    match task {
        TaskType::ComprehensiveReport
        | TaskType::SingleTheory
        | TaskType::ConflictResolution => "claude",
        TaskType::QuickInterpretation
        | TaskType::QuickInteraction
        | TaskType::SimpleQa
        | TaskType::UserFeedback => "deepseek",
        TaskType::BirthInfoParse => "kimi",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table() {
        assert_eq!(recommended_provider(TaskType::SingleTheory), "claude");
        assert_eq!(recommended_provider(TaskType::QuickInterpretation), "deepseek");
        assert_eq!(recommended_provider(TaskType::BirthInfoParse), "kimi");
        for task in [TaskType::ComprehensiveReport, TaskType::UserFeedback, TaskType::SimpleQa] {
            assert!(DEFAULT_PROVIDER_PRIORITY.contains(&recommended_provider(task)));
        }
    }

    #[test]
    fn test_task_names() {
        assert_eq!(TaskType::QuickInterpretation.to_string(), "quick_interpretation");
        let json = serde_json::to_string(&TaskType::BirthInfoParse).unwrap();
        assert_eq!(json, "\"birth_info_parse\"");
    }
}
