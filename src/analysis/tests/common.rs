use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use crate::analysis::{
    AggregationStrategy, AggregatorSpec, AnalysisOrchestrator, FailedChildPolicy,
    MemoryAnalysisStore, WeightCombination, WeightProperty,
};
use crate::hierarchy::{EntityArena, EntityContext, EntityId, EntityKind, SpatialEntity};
use crate::rules::{RuleConfig, RuleMode, RuleSet, RuleSetConfig};
use crate::series::{MeteringPoint, MetricRegistry, Sample, SeriesCatalog, TimeSeries};
use crate::series::SeriesId;

pub(super) fn start_of_run() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0)
        .single()
        .expect("valid start")
}

pub(super) fn series_with_step(
    metric: &str,
    step: Duration,
    values: &[Option<f64>],
) -> TimeSeries {
    TimeSeries {
        id: SeriesId(format!("{metric}-series")),
        metric: metric.to_string(),
        unit: "unit".to_string(),
        samples: values
            .iter()
            .enumerate()
            .map(|(i, value)| Sample::new(start_of_run() + step * i as i32, *value))
            .collect(),
    }
}

pub(super) fn hourly_series(metric: &str, values: &[Option<f64>]) -> TimeSeries {
    series_with_step(metric, Duration::hours(1), values)
}

pub(super) fn comfort_band_values() -> Vec<Option<f64>> {
    vec![
        Some(18.0),
        Some(20.0),
        Some(22.0),
        Some(24.0),
        Some(26.0),
        Some(28.0),
    ]
}

pub(super) fn comfort_rule(id: &str, metric: &str, tolerance_percentage: f64) -> RuleConfig {
    RuleConfig {
        id: id.to_string(),
        name: format!("{metric} comfort band"),
        metric: metric.to_string(),
        mode: RuleMode::Bidirectional,
        parameters: json!({"limits": {"lower": 20.0, "upper": 26.0}}),
        unit: Some("C".to_string()),
        tolerance_percentage: Some(tolerance_percentage),
        tolerance_hours: None,
        window: None,
    }
}

pub(super) fn universal_rule_set(rules: Vec<RuleConfig>) -> RuleSet {
    RuleSetConfig {
        id: "rs-1".to_string(),
        name: "Indoor climate".to_string(),
        standard: "EN16798-1".to_string(),
        category: None,
        rules,
        conditions: Vec::new(),
    }
    .build()
    .expect("rule set builds")
}

pub(super) fn entity(
    id: &str,
    kind: EntityKind,
    parents: &[&str],
    children: &[&str],
    area: Option<f64>,
) -> SpatialEntity {
    SpatialEntity {
        id: EntityId::new(id),
        name: id.to_string(),
        kind,
        parent_ids: parents.iter().map(|p| EntityId::new(*p)).collect(),
        child_ids: children.iter().map(|c| EntityId::new(*c)).collect(),
        context: EntityContext {
            building_type: Some("office".to_string()),
            area_m2: area,
            ..EntityContext::default()
        },
    }
}

/// portfolio → building-a → {room-1, room-2}
pub(super) fn two_room_arena(room_1_area: Option<f64>, room_2_area: Option<f64>) -> EntityArena {
    EntityArena::new(vec![
        entity("portfolio", EntityKind::Portfolio, &[], &["building-a"], None),
        entity(
            "building-a",
            EntityKind::Building,
            &["portfolio"],
            &["room-1", "room-2"],
            None,
        ),
        entity("room-1", EntityKind::Room, &["building-a"], &[], room_1_area),
        entity("room-2", EntityKind::Room, &["building-a"], &[], room_2_area),
    ])
    .expect("valid hierarchy")
}

pub(super) fn catalog_for(series: Vec<(&str, TimeSeries)>) -> SeriesCatalog {
    SeriesCatalog::new(
        series
            .into_iter()
            .map(|(entity, series)| MeteringPoint {
                id: format!("mp-{entity}-{}", series.metric),
                entity_id: EntityId::new(entity),
                series,
            })
            .collect(),
    )
}

pub(super) fn worst_aggregator() -> AggregatorSpec {
    AggregatorSpec {
        id: "agg-worst".to_string(),
        name: "Worst of children".to_string(),
        strategy: AggregationStrategy::Worst,
        weight_properties: Vec::new(),
        weight_combination: None,
    }
}

pub(super) fn area_weighted_aggregator() -> AggregatorSpec {
    AggregatorSpec {
        id: "agg-area".to_string(),
        name: "Area weighted average".to_string(),
        strategy: AggregationStrategy::WeightedAverage,
        weight_properties: vec![WeightProperty::AreaM2],
        weight_combination: None,
    }
}

pub(super) fn orchestrator_with_policy(
    policy: FailedChildPolicy,
) -> (
    AnalysisOrchestrator<MemoryAnalysisStore>,
    Arc<MemoryAnalysisStore>,
) {
    let store = Arc::new(MemoryAnalysisStore::new());
    let orchestrator = AnalysisOrchestrator::with_policies(
        store.clone(),
        MetricRegistry::standard(),
        policy,
        WeightCombination::Product,
    );
    (orchestrator, store)
}

pub(super) fn orchestrator() -> (
    AnalysisOrchestrator<MemoryAnalysisStore>,
    Arc<MemoryAnalysisStore>,
) {
    orchestrator_with_policy(FailedChildPolicy::Exclude)
}
