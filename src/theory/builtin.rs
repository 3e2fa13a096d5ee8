//! Requirement specs of the classical theories.
//!
//! Only the declared inputs live here; the rule-tables themselves are
//! provided by calculator implementations outside this crate.

use crate::input::InputField;

use super::{TheorySpec, TheoryTier};

/// Tie-break order for selection: broadly applicable, low-requirement
/// theories first.
pub const DOMAIN_PRIORITY: [&str; 8] = [
    "xiaoliu", "meihua", "cezi", "liuyao", "daliuren", "qimen", "bazi", "ziwei",
];

/// Spec of a classical theory by name.
#[must_use]
pub fn classical_spec(name: &str) -> Option<TheorySpec> {
    let spec = match name {
        "bazi" => TheorySpec::new("bazi", TheoryTier::Basic)
            .require(InputField::BirthYear, 0.25)
            .require(InputField::BirthMonth, 0.25)
            .require(InputField::BirthDay, 0.25)
            .optional(InputField::BirthHour, 0.15)
            .optional(InputField::Gender, 0.05)
            .optional(InputField::BirthLongitude, 0.05)
            .min_completeness(0.75),
        "ziwei" => TheorySpec::new("ziwei", TheoryTier::Basic)
            .require(InputField::QuestionType, 0.15)
            .require(InputField::QuestionDescription, 0.15)
            .require(InputField::BirthYear, 0.15)
            .require(InputField::BirthMonth, 0.15)
            .require(InputField::BirthDay, 0.15)
            .require(InputField::BirthHour, 0.2)
            .require(InputField::Gender, 0.05)
            .optional(InputField::CalendarType, 0.0)
            .min_completeness(0.95),
        "qimen" => TheorySpec::new("qimen", TheoryTier::Deep)
            .require(InputField::QuestionType, 0.3)
            .require(InputField::QuestionDescription, 0.3)
            .require(InputField::CurrentTime, 0.3)
            .optional(InputField::InquiryTime, 0.05)
            .optional(InputField::BirthYear, 0.05)
            .min_completeness(0.7),
        "daliuren" => TheorySpec::new("daliuren", TheoryTier::Deep)
            .require(InputField::QuestionDescription, 0.3)
            .require(InputField::CurrentTime, 0.4)
            .optional(InputField::InquiryTime, 0.3)
            .min_completeness(0.6),
        "liuyao" => TheorySpec::new("liuyao", TheoryTier::Deep)
            .require(InputField::Numbers, 0.7)
            .optional(InputField::CurrentTime, 0.2)
            .optional(InputField::QuestionDescription, 0.1)
            .min_completeness(0.6),
        "meihua" => TheorySpec::new("meihua", TheoryTier::Quick)
            .optional(InputField::Numbers, 0.3)
            .optional(InputField::Character, 0.2)
            .optional(InputField::FavoriteColor, 0.2)
            .optional(InputField::Direction, 0.2)
            .optional(InputField::CurrentTime, 0.1),
        "xiaoliu" => TheorySpec::new("xiaoliu", TheoryTier::Quick)
            .optional(InputField::Numbers, 0.5)
            .optional(InputField::BirthMonth, 0.2)
            .optional(InputField::BirthDay, 0.2)
            .optional(InputField::CurrentTime, 0.1),
        "cezi" => TheorySpec::new("cezi", TheoryTier::Quick)
            .require(InputField::QuestionDescription, 0.3)
            .require(InputField::Character, 0.7)
            .optional(InputField::CurrentTime, 0.0)
            .min_completeness(0.7),
        _ => return None,
    };
    Some(spec)
}

/// Specs of every classical theory, in [`DOMAIN_PRIORITY`] order.
#[must_use]
pub fn classical_specs() -> Vec<TheorySpec> {
    DOMAIN_PRIORITY.iter().filter_map(|name| classical_spec(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_priority_name_has_a_spec() {
        assert_eq!(classical_specs().len(), DOMAIN_PRIORITY.len());
        assert!(classical_spec("tarot").is_none());
    }

    #[test]
    fn weights_sum_to_one() {
        for spec in classical_specs() {
            let total: f64 = spec.weights.values().sum();
            assert!((total - 1.0).abs() < 1e-9, "{} sums to {total}", spec.name);
        }
    }
}
