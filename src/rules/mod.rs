mod domain;
mod evaluator;
mod selector;
mod threshold;

pub use domain::{
    ApplicabilityCondition, RuleConfig, RuleId, RuleMode, RuleSet, RuleSetConfig, RuleSetId,
    StandardDefinition, TestRule, TimeWindow, ToleranceBudget,
};
pub use evaluator::{evaluator_for, parse_bounds, ConfigurationError, EvaluatorFn, RuleBounds};
pub use selector::select_applicable_rules;
pub use threshold::{ComplianceThreshold, ThresholdKind, ValidationError};
