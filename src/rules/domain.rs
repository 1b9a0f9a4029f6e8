use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::evaluator::{parse_bounds, ConfigurationError, RuleBounds};
use super::threshold::{ComplianceThreshold, ThresholdKind};
use crate::hierarchy::EntityContext;

/// Identifier wrapper for test rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// Identifier wrapper for rule sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleSetId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    Bidirectional,
    UnidirectionalMin,
    UnidirectionalMax,
    BetweenRange,
    OutsideRange,
    Equality,
}

/// Time budget a rule may spend out of range and still pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceBudget {
    Percentage(f64),
    Hours(f64),
}

/// Hour-of-day window restricting which samples a rule sees. `start == end`
/// keeps the full day; `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let hour = timestamp.hour();
        if self.start_hour == self.end_hour {
            return true;
        }
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Raw rule shape as loaded from standard configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub mode: RuleMode,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub tolerance_percentage: Option<f64>,
    #[serde(default)]
    pub tolerance_hours: Option<f64>,
    #[serde(default)]
    pub window: Option<TimeWindow>,
}

/// Declarative compliance rule with canonicalized, validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRule {
    pub id: RuleId,
    pub name: String,
    pub metric: String,
    pub mode: RuleMode,
    pub bounds: RuleBounds,
    pub unit: String,
    pub tolerance: ToleranceBudget,
    pub window: Option<TimeWindow>,
    threshold: Option<ComplianceThreshold>,
}

impl TestRule {
    /// Fail-fast constructor: limits are canonicalized and threshold bounds
    /// validated here, never at evaluation time.
    pub fn from_config(config: RuleConfig) -> Result<Self, ConfigurationError> {
        let bounds = parse_bounds(config.mode, &config.parameters)?;
        let unit = config.unit.unwrap_or_default();

        let threshold = match config.mode {
            RuleMode::Bidirectional | RuleMode::BetweenRange => Some(ComplianceThreshold::new(
                ThresholdKind::Bidirectional,
                bounds.lower,
                bounds.upper,
                unit.clone(),
                bounds.tolerance,
            )?),
            RuleMode::UnidirectionalMin => Some(ComplianceThreshold::new(
                ThresholdKind::UnidirectionalMin,
                bounds.lower,
                None,
                unit.clone(),
                bounds.tolerance,
            )?),
            RuleMode::UnidirectionalMax => Some(ComplianceThreshold::new(
                ThresholdKind::UnidirectionalMax,
                None,
                bounds.upper,
                unit.clone(),
                bounds.tolerance,
            )?),
            RuleMode::OutsideRange | RuleMode::Equality => None,
        };

        let tolerance = match (config.tolerance_hours, config.tolerance_percentage) {
            (Some(hours), _) => ToleranceBudget::Hours(hours),
            (None, Some(percentage)) => ToleranceBudget::Percentage(percentage),
            (None, None) => ToleranceBudget::Percentage(0.0),
        };
        let budget_value = match tolerance {
            ToleranceBudget::Percentage(value) | ToleranceBudget::Hours(value) => value,
        };
        if !budget_value.is_finite() || budget_value < 0.0 {
            return Err(ConfigurationError::NegativeToleranceBudget {
                value: budget_value,
            });
        }

        Ok(Self {
            id: RuleId(config.id),
            name: config.name,
            metric: config.metric,
            mode: config.mode,
            bounds,
            unit,
            tolerance,
            window: config.window,
            threshold,
        })
    }

    /// Threshold value object backing this rule, where the mode has one.
    pub fn threshold(&self) -> Option<&ComplianceThreshold> {
        self.threshold.as_ref()
    }
}

/// Context filter; absent fields are wildcards, present ones must all hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicabilityCondition {
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default)]
    pub continents: Option<Vec<String>>,
    #[serde(default)]
    pub building_types: Option<Vec<String>>,
    #[serde(default)]
    pub room_types: Option<Vec<String>>,
    #[serde(default)]
    pub ventilation_types: Option<Vec<String>>,
    #[serde(default)]
    pub seasons: Option<Vec<String>>,
    #[serde(default)]
    pub min_area_m2: Option<f64>,
    #[serde(default)]
    pub max_area_m2: Option<f64>,
}

impl ApplicabilityCondition {
    pub fn matches(&self, context: &EntityContext) -> bool {
        member_of(&self.countries, &context.country)
            && member_of(&self.regions, &context.region)
            && member_of(&self.continents, &context.continent)
            && member_of(&self.building_types, &context.building_type)
            && member_of(&self.room_types, &context.room_type)
            && member_of(&self.ventilation_types, &context.ventilation_type)
            && member_of(&self.seasons, &context.season)
            && self.area_in_range(context.area_m2)
    }

    fn area_in_range(&self, area: Option<f64>) -> bool {
        if self.min_area_m2.is_none() && self.max_area_m2.is_none() {
            return true;
        }
        let Some(area) = area else {
            return false;
        };
        self.min_area_m2.map(|min| area >= min).unwrap_or(true)
            && self.max_area_m2.map(|max| area <= max).unwrap_or(true)
    }
}

fn member_of(filter: &Option<Vec<String>>, attribute: &Option<String>) -> bool {
    let Some(allowed) = filter else {
        return true;
    };
    let Some(value) = attribute else {
        return false;
    };
    allowed
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(value))
}

/// Ordered rules qualified by applicability conditions.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub id: RuleSetId,
    pub name: String,
    pub standard: String,
    pub category: Option<String>,
    pub rules: Vec<TestRule>,
    pub conditions: Vec<ApplicabilityCondition>,
}

impl RuleSet {
    /// An empty condition list applies universally; otherwise any matching
    /// condition qualifies the entity.
    pub fn applies_to(&self, context: &EntityContext) -> bool {
        self.conditions.is_empty()
            || self
                .conditions
                .iter()
                .any(|condition| condition.matches(context))
    }
}

/// Raw rule-set shape as loaded from standard configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub id: String,
    pub name: String,
    pub standard: String,
    #[serde(default)]
    pub category: Option<String>,
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub conditions: Vec<ApplicabilityCondition>,
}

impl RuleSetConfig {
    pub fn build(self) -> Result<RuleSet, ConfigurationError> {
        let rules = self
            .rules
            .into_iter()
            .map(TestRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleSet {
            id: RuleSetId(self.id),
            name: self.name,
            standard: self.standard,
            category: self.category,
            rules,
            conditions: self.conditions,
        })
    }
}

/// Standard bundle as consumed from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardDefinition {
    pub id: String,
    pub name: String,
    pub rule_sets: Vec<RuleSetConfig>,
}

impl StandardDefinition {
    pub fn build(self) -> Result<Vec<RuleSet>, ConfigurationError> {
        self.rule_sets
            .into_iter()
            .map(RuleSetConfig::build)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn rule_config(mode: RuleMode, parameters: Value) -> RuleConfig {
        RuleConfig {
            id: "r-1".to_string(),
            name: "Operative temperature band".to_string(),
            metric: "operative_temperature".to_string(),
            mode,
            parameters,
            unit: Some("C".to_string()),
            tolerance_percentage: Some(5.0),
            tolerance_hours: None,
            window: None,
        }
    }

    #[test]
    fn from_config_builds_threshold_for_range_modes() {
        let rule = TestRule::from_config(rule_config(
            RuleMode::Bidirectional,
            json!({"limits": {"lower": 20.0, "upper": 26.0}}),
        ))
        .expect("rule builds");

        let threshold = rule.threshold().expect("threshold present");
        assert!(threshold.is_compliant(23.0));
        assert!(!threshold.is_compliant(19.0));
        assert_eq!(rule.tolerance, ToleranceBudget::Percentage(5.0));
    }

    #[test]
    fn hour_budget_takes_precedence_when_both_are_given() {
        let mut config = rule_config(RuleMode::UnidirectionalMax, json!({"max": 1000.0}));
        config.tolerance_hours = Some(12.0);
        let rule = TestRule::from_config(config).expect("rule builds");
        assert_eq!(rule.tolerance, ToleranceBudget::Hours(12.0));
    }

    #[test]
    fn negative_budget_is_rejected_at_construction() {
        let mut config = rule_config(RuleMode::UnidirectionalMax, json!({"max": 1000.0}));
        config.tolerance_percentage = Some(-3.0);
        match TestRule::from_config(config) {
            Err(ConfigurationError::NegativeToleranceBudget { value }) => assert_eq!(value, -3.0),
            other => panic!("expected budget error, got {other:?}"),
        }
    }

    #[test]
    fn condition_matches_on_building_type() {
        let condition = ApplicabilityCondition {
            building_types: Some(vec!["office".to_string()]),
            ..ApplicabilityCondition::default()
        };

        let mut context = EntityContext {
            building_type: Some("office".to_string()),
            ..EntityContext::default()
        };
        assert!(condition.matches(&context));

        context.building_type = Some("hotel".to_string());
        assert!(!condition.matches(&context));

        context.building_type = None;
        assert!(!condition.matches(&context));
    }

    #[test]
    fn area_filter_uses_inclusive_bounds() {
        let condition = ApplicabilityCondition {
            min_area_m2: Some(10.0),
            max_area_m2: Some(50.0),
            ..ApplicabilityCondition::default()
        };

        let context = |area: Option<f64>| EntityContext {
            area_m2: area,
            ..EntityContext::default()
        };
        assert!(condition.matches(&context(Some(10.0))));
        assert!(condition.matches(&context(Some(50.0))));
        assert!(!condition.matches(&context(Some(50.5))));
        assert!(!condition.matches(&context(None)));
    }

    #[test]
    fn window_wraps_past_midnight() {
        let overnight = TimeWindow {
            start_hour: 22,
            end_hour: 6,
        };
        let at = |hour: u32| {
            Utc.with_ymd_and_hms(2025, 6, 1, hour, 30, 0)
                .single()
                .expect("valid timestamp")
        };
        assert!(overnight.contains(at(23)));
        assert!(overnight.contains(at(3)));
        assert!(!overnight.contains(at(12)));
    }
}
