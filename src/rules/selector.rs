use super::domain::{RuleSet, TestRule};
use crate::hierarchy::SpatialEntity;

/// Effective rules for an entity: rules from every qualifying rule set, in
/// rule-set order then rule order. Overlapping rules on the same metric are
/// all kept.
pub fn select_applicable_rules<'a>(
    entity: &SpatialEntity,
    rule_sets: &'a [RuleSet],
) -> Vec<&'a TestRule> {
    rule_sets
        .iter()
        .filter(|rule_set| rule_set.applies_to(&entity.context))
        .flat_map(|rule_set| rule_set.rules.iter())
        .collect()
}
