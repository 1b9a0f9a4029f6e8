use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::aggregation::AggregationStrategy;
use super::domain::CategoryRating;
use crate::series::MetricRegistry;

/// Rating entry for one IEQ domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainRating {
    pub rating: CategoryRating,
}

/// Rating entry for one metric. Historical payloads spell the key either
/// `rating_value` or `rating`; both are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRating {
    #[serde(rename = "rating_value", alias = "rating")]
    pub rating_value: CategoryRating,
}

/// Category breakdown attached to a `ComplianceAnalysis`; the shape is a
/// hard contract consumed by downstream visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResults {
    pub overall_rating: CategoryRating,
    pub domains: BTreeMap<String, DomainRating>,
    pub parameters: BTreeMap<String, ParameterRating>,
}

/// Category breakdown attached to an `AggregatedAnalysis`, same downstream
/// contract plus roll-up bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResults {
    pub overall_rating: CategoryRating,
    pub domains: BTreeMap<String, DomainRating>,
    pub parameters: BTreeMap<String, ParameterRating>,
    pub overall_pass: bool,
    pub child_count: usize,
    pub strategy: AggregationStrategy,
}

const BAND_CATEGORY_II: f64 = 5.0;
const BAND_CATEGORY_III: f64 = 10.0;
const BAND_CATEGORY_IV: f64 = 15.0;

/// Bands an out-of-range percentage into a category rating.
pub fn rating_from_out_of_range(percentage: f64) -> CategoryRating {
    if percentage <= BAND_CATEGORY_II {
        CategoryRating::CategoryI
    } else if percentage <= BAND_CATEGORY_III {
        CategoryRating::CategoryII
    } else if percentage <= BAND_CATEGORY_IV {
        CategoryRating::CategoryIII
    } else {
        CategoryRating::CategoryIV
    }
}

/// Builds the summary payload from `(metric, out_of_range_percentage)`
/// entries. A metric observed by several rules keeps its worst band; the
/// domain and overall ratings are the worst of their members.
pub fn build_summary(
    entries: &[(String, f64)],
    registry: &MetricRegistry,
) -> Option<SummaryResults> {
    if entries.is_empty() {
        return None;
    }

    let mut parameters: BTreeMap<String, ParameterRating> = BTreeMap::new();
    for (metric, out_of_range) in entries {
        let rating = rating_from_out_of_range(*out_of_range);
        parameters
            .entry(metric.clone())
            .and_modify(|existing| existing.rating_value = existing.rating_value.worst(rating))
            .or_insert(ParameterRating {
                rating_value: rating,
            });
    }

    let mut domains: BTreeMap<String, DomainRating> = BTreeMap::new();
    for (metric, parameter) in &parameters {
        let Some(domain) = registry.domain_of(metric) else {
            continue;
        };
        domains
            .entry(domain.label().to_string())
            .and_modify(|existing| existing.rating = existing.rating.worst(parameter.rating_value))
            .or_insert(DomainRating {
                rating: parameter.rating_value,
            });
    }

    let overall_rating = parameters
        .values()
        .map(|parameter| parameter.rating_value)
        .reduce(CategoryRating::worst)?;

    Some(SummaryResults {
        overall_rating,
        domains,
        parameters,
    })
}
