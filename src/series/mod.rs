mod import;
mod registry;
mod resolution;

pub use import::{read_series, ImportError};
pub use registry::{AggregationMethod, DataCategory, MetricRegistry};
pub use resolution::{
    aggregate_to_resolution, detect_resolution, ensure_minimum_resolution, validate_resolution,
    InsufficientDataError, ResolutionError,
};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hierarchy::EntityId;

/// Identifier wrapper for time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesId(pub String);

/// Single observation; `None` marks a missing measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }
}

/// Materialized, time-ordered series for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub id: SeriesId,
    pub metric: String,
    pub unit: String,
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|sample| sample.timestamp).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Metering point binding a series to the spatial entity it observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteringPoint {
    pub id: String,
    pub entity_id: EntityId,
    pub series: TimeSeries,
}

/// Read-only lookup of metering points per entity, built by ingestion.
#[derive(Debug, Default)]
pub struct SeriesCatalog {
    by_entity: HashMap<EntityId, Vec<MeteringPoint>>,
}

impl SeriesCatalog {
    pub fn new(points: Vec<MeteringPoint>) -> Self {
        let mut by_entity: HashMap<EntityId, Vec<MeteringPoint>> = HashMap::new();
        for point in points {
            by_entity
                .entry(point.entity_id.clone())
                .or_default()
                .push(point);
        }
        Self { by_entity }
    }

    pub fn series_for(&self, entity: &EntityId, metric: &str) -> Option<&TimeSeries> {
        self.by_entity.get(entity).and_then(|points| {
            points
                .iter()
                .find(|point| point.series.metric == metric)
                .map(|point| &point.series)
        })
    }
}
