//! Progress notifications for analysis runs.
//!
//! An [`AnalysisObserver`] is told about each stage of
//! [`DecisionEngine::analyze`](crate::DecisionEngine::analyze) as it happens.
//! Every method has a no-op default, so implementors only override what
//! they display.

use crate::conflict::ConflictInfo;
use crate::selector::Selection;
use crate::theory::StandardAnswer;

/// Receives stage events from the engine.
///
/// Callbacks run on the engine's task and must not block.
pub trait AnalysisObserver: Send + Sync {
    /// Theories were chosen for the input.
    fn theories_selected(&self, _selection: &Selection) {}

    /// Names of the selected theories in the order they will run.
    fn execution_planned(&self, _order: &[String]) {}

    /// A calculator produced its verdict.
    fn theory_calculated(&self, _theory: &str, _answer: &StandardAnswer) {}

    /// A provider interpreted a theory.
    ///
    /// With parallel interpretations this fires in completion order.
    fn theory_interpreted(&self, _theory: &str, _provider: &str) {}

    /// Conflict resolution finished over the complete result set.
    fn conflicts_resolved(&self, _info: &ConflictInfo) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl AnalysisObserver for SilentObserver {}
