//! Registry of theory calculators.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ValidationError;

use super::{TheoryCalculator, DOMAIN_PRIORITY};

/// Name-indexed set of calculators plus the tie-break priority order.
///
/// Built once at startup, then shared read-only (wrap it in an `Arc`).
pub struct TheoryCatalog {
    theories: Vec<Arc<dyn TheoryCalculator>>,
    index: HashMap<String, usize>,
    priority: Vec<String>,
}

impl TheoryCatalog {
    /// Creates an empty catalog using the classical priority order.
    #[must_use]
    pub fn new() -> Self {
        Self::with_priority(DOMAIN_PRIORITY.iter().map(ToString::to_string).collect())
    }

    /// Creates an empty catalog with a custom priority order.
    ///
    /// Theories missing from `priority` rank after every listed one.
    #[must_use]
    pub fn with_priority(priority: Vec<String>) -> Self {
        Self {
            theories: Vec::new(),
            index: HashMap::new(),
            priority,
        }
    }

    /// Registers a calculator.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTheory` if the name is taken, or a validation error
    /// if the calculator's spec is malformed.
    pub fn register(
        &mut self,
        calculator: Arc<dyn TheoryCalculator>,
    ) -> Result<(), ValidationError> {
        let spec = calculator.spec();
        spec.validate()?;
        if self.index.contains_key(&spec.name) {
            return Err(ValidationError::DuplicateTheory {
                name: spec.name.clone(),
            });
        }
        self.index.insert(spec.name.clone(), self.theories.len());
        self.theories.push(calculator);
        Ok(())
    }

    /// Looks a calculator up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TheoryCalculator>> {
        self.index.get(name).map(|&i| &self.theories[i])
    }

    /// Calculators in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TheoryCalculator>> {
        self.theories.iter()
    }

    /// Position of `name` in the priority order; unlisted names rank last.
    #[must_use]
    pub fn priority_rank(&self, name: &str) -> usize {
        self.priority
            .iter()
            .position(|p| p == name)
            .unwrap_or(self.priority.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.theories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.theories.is_empty()
    }
}

impl Default for TheoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TheoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TheoryCatalog")
            .field("theories", &self.theories.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::UserInput;
    use crate::theory::{classical_spec, TheoryError, TheorySpec};

    struct Fixed(TheorySpec);

    impl TheoryCalculator for Fixed {
        fn spec(&self) -> &TheorySpec {
            &self.0
        }

        fn calculate(&self, _input: &UserInput) -> Result<serde_json::Value, TheoryError> {
            Ok(serde_json::json!({ "judgment": "neutral" }))
        }
    }

    fn fixed(name: &str) -> Arc<dyn TheoryCalculator> {
        Arc::new(Fixed(classical_spec(name).unwrap()))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut catalog = TheoryCatalog::new();
        catalog.register(fixed("meihua")).unwrap();
        catalog.register(fixed("bazi")).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("bazi").unwrap().name(), "bazi");
        assert!(catalog.get("ziwei").is_none());
        assert_eq!(
            catalog.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
            vec!["meihua", "bazi"]
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut catalog = TheoryCatalog::new();
        catalog.register(fixed("cezi")).unwrap();
        let err = catalog.register(fixed("cezi")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateTheory {
                name: "cezi".to_string()
            }
        );
    }

    #[test]
    fn test_priority_rank() {
        let catalog = TheoryCatalog::new();
        assert_eq!(catalog.priority_rank("xiaoliu"), 0);
        assert!(catalog.priority_rank("meihua") < catalog.priority_rank("ziwei"));
        assert_eq!(catalog.priority_rank("tarot"), DOMAIN_PRIORITY.len());
    }

    #[test]
    fn test_malformed_spec_rejected() {
        let mut catalog = TheoryCatalog::new();
        let spec = TheorySpec::new("odd", crate::theory::TheoryTier::Quick).min_completeness(2.0);
        assert!(catalog.register(Arc::new(Fixed(spec))).is_err());
        assert!(catalog.is_empty());
    }
}
