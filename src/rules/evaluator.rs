use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::RuleMode;
use crate::series::Sample;

/// Configuration errors raised while canonicalizing rule limits.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no recognizable limit shape in rule configuration")]
    UnrecognizedShape,
    #[error("{mode:?} rule is missing its {side} bound")]
    MissingBound { mode: RuleMode, side: &'static str },
    #[error("limit key '{key}' must be numeric")]
    NonNumeric { key: String },
    #[error("range bounds must satisfy lower < upper (got {lower} and {upper})")]
    InvertedRange { lower: f64, upper: f64 },
    #[error("tolerance budget must be finite and non-negative (got {value})")]
    NegativeToleranceBudget { value: f64 },
    #[error(transparent)]
    Threshold(#[from] crate::rules::threshold::ValidationError),
}

/// Canonical `{min, max}` / single-limit form shared by every evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleBounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub target: Option<f64>,
    pub tolerance: f64,
}

/// Canonicalizes heterogeneous limit configurations. Accepted shapes, in
/// priority order: a `limits` object with `lower`/`upper` or `min`/`max`
/// keys, top-level `min`/`max`, a `limit` object with `min`/`max`.
pub fn parse_bounds(mode: RuleMode, config: &Value) -> Result<RuleBounds, ConfigurationError> {
    let source = if let Some(limits) = config.get("limits").filter(|value| value.is_object()) {
        limits
    } else if has_limit_keys(config) {
        config
    } else if let Some(limit) = config.get("limit").filter(|value| value.is_object()) {
        limit
    } else {
        return Err(ConfigurationError::UnrecognizedShape);
    };

    let bounds = RuleBounds {
        lower: number_at(source, &["lower", "min"])?,
        upper: number_at(source, &["upper", "max"])?,
        target: number_at(source, &["target"])?,
        tolerance: number_at(source, &["tolerance"])?.unwrap_or(0.0),
    };

    match mode {
        RuleMode::Bidirectional | RuleMode::BetweenRange | RuleMode::OutsideRange => {
            let lower = bounds
                .lower
                .ok_or(ConfigurationError::MissingBound { mode, side: "lower" })?;
            let upper = bounds
                .upper
                .ok_or(ConfigurationError::MissingBound { mode, side: "upper" })?;
            if lower >= upper {
                return Err(ConfigurationError::InvertedRange { lower, upper });
            }
        }
        RuleMode::UnidirectionalMin => {
            if bounds.lower.is_none() {
                return Err(ConfigurationError::MissingBound { mode, side: "lower" });
            }
        }
        RuleMode::UnidirectionalMax => {
            if bounds.upper.is_none() {
                return Err(ConfigurationError::MissingBound { mode, side: "upper" });
            }
        }
        RuleMode::Equality => {
            if bounds.target.is_none() {
                return Err(ConfigurationError::MissingBound { mode, side: "target" });
            }
        }
    }

    Ok(bounds)
}

fn has_limit_keys(value: &Value) -> bool {
    ["min", "max", "target"]
        .iter()
        .any(|key| value.get(key).is_some())
}

fn number_at(source: &Value, keys: &[&str]) -> Result<Option<f64>, ConfigurationError> {
    for key in keys {
        if let Some(raw) = source.get(key) {
            return raw
                .as_f64()
                .map(Some)
                .ok_or_else(|| ConfigurationError::NonNumeric {
                    key: (*key).to_string(),
                });
        }
    }
    Ok(None)
}

pub type EvaluatorFn = fn(&[Sample], &RuleBounds) -> Vec<bool>;

/// The mode → evaluator map. Adding a mode means one variant and one arm.
pub fn evaluator_for(mode: RuleMode) -> EvaluatorFn {
    match mode {
        RuleMode::Bidirectional => bidirectional,
        RuleMode::UnidirectionalMin => unidirectional_min,
        RuleMode::UnidirectionalMax => unidirectional_max,
        RuleMode::BetweenRange => between_range,
        RuleMode::OutsideRange => outside_range,
        RuleMode::Equality => equality,
    }
}

/// Missing samples are non-compliant by policy, never dropped.
fn mask(samples: &[Sample], predicate: impl Fn(f64) -> bool) -> Vec<bool> {
    samples
        .iter()
        .map(|sample| sample.value.map(&predicate).unwrap_or(false))
        .collect()
}

fn bidirectional(samples: &[Sample], bounds: &RuleBounds) -> Vec<bool> {
    let lower = bounds.lower.unwrap_or(f64::NEG_INFINITY) - bounds.tolerance;
    let upper = bounds.upper.unwrap_or(f64::INFINITY) + bounds.tolerance;
    mask(samples, |value| value >= lower && value <= upper)
}

fn unidirectional_min(samples: &[Sample], bounds: &RuleBounds) -> Vec<bool> {
    let lower = bounds.lower.unwrap_or(f64::NEG_INFINITY) - bounds.tolerance;
    mask(samples, |value| value >= lower)
}

fn unidirectional_max(samples: &[Sample], bounds: &RuleBounds) -> Vec<bool> {
    let upper = bounds.upper.unwrap_or(f64::INFINITY) + bounds.tolerance;
    mask(samples, |value| value <= upper)
}

fn between_range(samples: &[Sample], bounds: &RuleBounds) -> Vec<bool> {
    bidirectional(samples, bounds)
}

fn outside_range(samples: &[Sample], bounds: &RuleBounds) -> Vec<bool> {
    let lower = bounds.lower.unwrap_or(f64::NEG_INFINITY) + bounds.tolerance;
    let upper = bounds.upper.unwrap_or(f64::INFINITY) - bounds.tolerance;
    mask(samples, |value| value <= lower || value >= upper)
}

fn equality(samples: &[Sample], bounds: &RuleBounds) -> Vec<bool> {
    match bounds.target {
        Some(target) => mask(samples, |value| (value - target).abs() <= bounds.tolerance),
        None => vec![false; samples.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn samples(values: &[Option<f64>]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                Sample::new(
                    Utc.with_ymd_and_hms(2025, 6, 1, i as u32, 0, 0)
                        .single()
                        .expect("valid timestamp"),
                    *value,
                )
            })
            .collect()
    }

    fn comfort_bounds() -> RuleBounds {
        RuleBounds {
            lower: Some(20.0),
            upper: Some(26.0),
            ..RuleBounds::default()
        }
    }

    #[test]
    fn bidirectional_mask_matches_expected_pattern() {
        let series = samples(&[
            Some(18.0),
            Some(20.0),
            Some(22.0),
            Some(24.0),
            Some(26.0),
            Some(28.0),
        ]);
        let mask = evaluator_for(RuleMode::Bidirectional)(&series, &comfort_bounds());
        assert_eq!(mask, vec![false, true, true, true, true, false]);

        let compliant = mask.iter().filter(|flag| **flag).count();
        let rate = 100.0 * compliant as f64 / mask.len() as f64;
        assert!((rate - 66.7).abs() < 0.1);

        // between_range is the inclusive in-range alias some standards use
        let between = evaluator_for(RuleMode::BetweenRange)(&series, &comfort_bounds());
        assert_eq!(between, mask);
    }

    #[test]
    fn missing_samples_are_non_compliant() {
        let series = samples(&[Some(22.0), None, Some(24.0)]);
        let mask = evaluator_for(RuleMode::Bidirectional)(&series, &comfort_bounds());
        assert_eq!(mask, vec![true, false, true]);
    }

    #[test]
    fn single_sided_modes_ignore_the_other_bound() {
        let series = samples(&[Some(400.0), Some(1000.0), Some(1400.0)]);
        let bounds = RuleBounds {
            upper: Some(1000.0),
            ..RuleBounds::default()
        };
        let mask = evaluator_for(RuleMode::UnidirectionalMax)(&series, &bounds);
        assert_eq!(mask, vec![true, true, false]);

        let bounds = RuleBounds {
            lower: Some(500.0),
            ..RuleBounds::default()
        };
        let mask = evaluator_for(RuleMode::UnidirectionalMin)(&series, &bounds);
        assert_eq!(mask, vec![false, true, true]);
    }

    #[test]
    fn outside_range_is_inclusive_at_both_bounds() {
        let series = samples(&[Some(18.0), Some(20.0), Some(23.0), Some(26.0), Some(30.0)]);
        let mask = evaluator_for(RuleMode::OutsideRange)(&series, &comfort_bounds());
        assert_eq!(mask, vec![true, true, false, true, true]);
    }

    #[test]
    fn equality_compares_within_tolerance() {
        let series = samples(&[Some(21.0), Some(21.4), Some(22.0)]);
        let bounds = RuleBounds {
            target: Some(21.0),
            tolerance: 0.5,
            ..RuleBounds::default()
        };
        let mask = evaluator_for(RuleMode::Equality)(&series, &bounds);
        assert_eq!(mask, vec![true, true, false]);
    }

    #[test]
    fn parser_prefers_limits_object_over_top_level_keys() {
        let config = json!({
            "limits": {"lower": 20.0, "upper": 26.0},
            "min": 0.0,
            "max": 100.0
        });
        let bounds = parse_bounds(RuleMode::Bidirectional, &config).expect("bounds parse");
        assert_eq!(bounds.lower, Some(20.0));
        assert_eq!(bounds.upper, Some(26.0));
    }

    #[test]
    fn parser_accepts_each_documented_shape() {
        let from_limits = parse_bounds(
            RuleMode::Bidirectional,
            &json!({"limits": {"min": 20.0, "max": 26.0}}),
        )
        .expect("limits shape");
        let from_top_level =
            parse_bounds(RuleMode::Bidirectional, &json!({"min": 20.0, "max": 26.0}))
                .expect("top-level shape");
        let from_limit = parse_bounds(
            RuleMode::Bidirectional,
            &json!({"limit": {"min": 20.0, "max": 26.0}}),
        )
        .expect("limit shape");

        assert_eq!(from_limits, from_top_level);
        assert_eq!(from_top_level, from_limit);
    }

    #[test]
    fn parser_rejects_unrecognizable_and_partial_shapes() {
        match parse_bounds(RuleMode::Bidirectional, &json!({"bounds": [20, 26]})) {
            Err(ConfigurationError::UnrecognizedShape) => {}
            other => panic!("expected unrecognized shape, got {other:?}"),
        }

        match parse_bounds(RuleMode::Bidirectional, &json!({"min": 20.0})) {
            Err(ConfigurationError::MissingBound { side, .. }) => assert_eq!(side, "upper"),
            other => panic!("expected missing bound, got {other:?}"),
        }

        match parse_bounds(RuleMode::Bidirectional, &json!({"min": 26.0, "max": 20.0})) {
            Err(ConfigurationError::InvertedRange { lower, upper }) => {
                assert_eq!(lower, 26.0);
                assert_eq!(upper, 20.0);
            }
            other => panic!("expected inverted range, got {other:?}"),
        }

        match parse_bounds(RuleMode::UnidirectionalMax, &json!({"max": "high"})) {
            Err(ConfigurationError::NonNumeric { key }) => assert_eq!(key, "max"),
            other => panic!("expected non-numeric, got {other:?}"),
        }
    }
}
