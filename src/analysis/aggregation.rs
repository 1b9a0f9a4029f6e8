use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::CategoryRating;
use super::summary::{AggregationResults, DomainRating, ParameterRating};
use crate::hierarchy::EntityContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    Worst,
    Best,
    Average,
    WeightedAverage,
    MultiPropertyWeighted,
}

/// Entity properties usable as aggregation weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightProperty {
    AreaM2,
    VolumeM3,
    DesignOccupancy,
}

impl WeightProperty {
    /// Missing properties weight as 1.0 so one unmapped room never drops
    /// out of the roll-up.
    pub fn resolve(self, context: &EntityContext) -> f64 {
        match self {
            Self::AreaM2 => context.area_m2,
            Self::VolumeM3 => context.volume_m3,
            Self::DesignOccupancy => context.design_occupancy,
        }
        .unwrap_or(1.0)
    }
}

/// How `MultiPropertyWeighted` folds several properties into one weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightCombination {
    Product,
    Sum,
}

/// Named aggregation strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSpec {
    pub id: String,
    pub name: String,
    pub strategy: AggregationStrategy,
    #[serde(default)]
    pub weight_properties: Vec<WeightProperty>,
    #[serde(default)]
    pub weight_combination: Option<WeightCombination>,
}

impl AggregatorSpec {
    pub fn resolve_weights(&self, context: &EntityContext) -> Vec<f64> {
        self.weight_properties
            .iter()
            .map(|property| property.resolve(context))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("cannot aggregate an empty child set")]
    EmptyChildSet,
}

/// Child contribution: a numeric value plus the raw per-property weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedValue {
    pub value: f64,
    pub weights: Vec<f64>,
}

impl WeightedValue {
    pub fn new(value: f64, weights: Vec<f64>) -> Self {
        Self { value, weights }
    }

    pub fn unweighted(value: f64) -> Self {
        Self {
            value,
            weights: Vec::new(),
        }
    }
}

fn effective_weight(
    strategy: AggregationStrategy,
    combination: WeightCombination,
    weights: &[f64],
) -> f64 {
    match strategy {
        AggregationStrategy::WeightedAverage => weights.first().copied().unwrap_or(1.0),
        AggregationStrategy::MultiPropertyWeighted => {
            if weights.is_empty() {
                1.0
            } else {
                match combination {
                    WeightCombination::Product => weights.iter().product(),
                    WeightCombination::Sum => weights.iter().sum(),
                }
            }
        }
        _ => 1.0,
    }
}

/// Combines child values under the named strategy. A zero weight total
/// falls back to the unweighted mean; an empty child set is an error.
pub fn aggregate_values(
    strategy: AggregationStrategy,
    combination: WeightCombination,
    children: &[WeightedValue],
) -> Result<f64, AggregationError> {
    if children.is_empty() {
        return Err(AggregationError::EmptyChildSet);
    }

    let mean =
        || children.iter().map(|child| child.value).sum::<f64>() / children.len() as f64;

    let combined = match strategy {
        AggregationStrategy::Worst => children
            .iter()
            .map(|child| child.value)
            .fold(f64::NEG_INFINITY, f64::max),
        AggregationStrategy::Best => children
            .iter()
            .map(|child| child.value)
            .fold(f64::INFINITY, f64::min),
        AggregationStrategy::Average => mean(),
        AggregationStrategy::WeightedAverage | AggregationStrategy::MultiPropertyWeighted => {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for child in children {
                let weight = effective_weight(strategy, combination, &child.weights);
                weighted_sum += child.value * weight;
                weight_total += weight;
            }
            if weight_total == 0.0 {
                mean()
            } else {
                weighted_sum / weight_total
            }
        }
    };

    Ok(combined)
}

/// Boolean form of the strategies: `Best` passes when any child passes,
/// every other strategy requires all children to pass.
pub fn aggregate_flags(
    strategy: AggregationStrategy,
    flags: &[bool],
) -> Result<bool, AggregationError> {
    if flags.is_empty() {
        return Err(AggregationError::EmptyChildSet);
    }
    Ok(match strategy {
        AggregationStrategy::Best => flags.iter().any(|flag| *flag),
        _ => flags.iter().all(|flag| *flag),
    })
}

fn rating_from_aggregate(value: f64) -> CategoryRating {
    let rounded = value.round().clamp(1.0, 4.0) as u8;
    CategoryRating::from_value(rounded).unwrap_or(CategoryRating::CategoryIV)
}

/// Combines child ratings on the 1..4 scale (4 = worst).
pub fn aggregate_ratings(
    strategy: AggregationStrategy,
    combination: WeightCombination,
    children: &[(CategoryRating, Vec<f64>)],
) -> Result<CategoryRating, AggregationError> {
    let values: Vec<WeightedValue> = children
        .iter()
        .map(|(rating, weights)| WeightedValue::new(f64::from(rating.value()), weights.clone()))
        .collect();
    aggregate_values(strategy, combination, &values).map(rating_from_aggregate)
}

/// One child analysis as seen by its parent's aggregation.
#[derive(Debug, Clone)]
pub struct ChildSummary {
    pub overall: CategoryRating,
    pub passed: bool,
    pub domains: BTreeMap<String, CategoryRating>,
    pub parameters: BTreeMap<String, CategoryRating>,
    pub weights: Vec<f64>,
}

/// Rolls child summaries into the parent payload: the overall rating plus
/// per-domain and per-parameter ratings, each combined under the same
/// strategy across the children that carry the entry.
pub fn aggregate_children(
    spec: &AggregatorSpec,
    default_combination: WeightCombination,
    children: &[ChildSummary],
) -> Result<AggregationResults, AggregationError> {
    if children.is_empty() {
        return Err(AggregationError::EmptyChildSet);
    }
    let combination = spec.weight_combination.unwrap_or(default_combination);

    let overall_inputs: Vec<(CategoryRating, Vec<f64>)> = children
        .iter()
        .map(|child| (child.overall, child.weights.clone()))
        .collect();
    let overall_rating = aggregate_ratings(spec.strategy, combination, &overall_inputs)?;

    let mut domain_inputs: BTreeMap<String, Vec<(CategoryRating, Vec<f64>)>> = BTreeMap::new();
    let mut parameter_inputs: BTreeMap<String, Vec<(CategoryRating, Vec<f64>)>> = BTreeMap::new();
    for child in children {
        for (domain, rating) in &child.domains {
            domain_inputs
                .entry(domain.clone())
                .or_default()
                .push((*rating, child.weights.clone()));
        }
        for (parameter, rating) in &child.parameters {
            parameter_inputs
                .entry(parameter.clone())
                .or_default()
                .push((*rating, child.weights.clone()));
        }
    }

    let mut domains = BTreeMap::new();
    for (domain, inputs) in domain_inputs {
        let rating = aggregate_ratings(spec.strategy, combination, &inputs)?;
        domains.insert(domain, DomainRating { rating });
    }
    let mut parameters = BTreeMap::new();
    for (parameter, inputs) in parameter_inputs {
        let rating = aggregate_ratings(spec.strategy, combination, &inputs)?;
        parameters.insert(parameter, ParameterRating { rating_value: rating });
    }

    let flags: Vec<bool> = children.iter().map(|child| child.passed).collect();
    let overall_pass = aggregate_flags(spec.strategy, &flags)?;

    Ok(AggregationResults {
        overall_rating,
        domains,
        parameters,
        overall_pass,
        child_count: children.len(),
        strategy: spec.strategy,
    })
}
