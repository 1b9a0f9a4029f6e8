use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;

use super::aggregation::{
    aggregate_children, AggregationError, AggregatorSpec, ChildSummary, WeightCombination,
};
use super::domain::{
    AggregatedAnalysis, AnalysisId, AnalysisStatus, CategoryRating, ComplianceAnalysis,
    TestResult, TestResultId,
};
use super::store::AnalysisStore;
use super::summary::{build_summary, AggregationResults, SummaryResults};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hierarchy::{EntityArena, EntityId, SpatialEntity};
use crate::rules::{evaluator_for, select_applicable_rules, RuleSet, TestRule, ToleranceBudget};
use crate::series::{
    detect_resolution, ensure_minimum_resolution, validate_resolution, MetricRegistry,
    ResolutionError, Sample, SeriesCatalog, TimeSeries,
};

/// How a parent's aggregation treats a failed child analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedChildPolicy {
    Exclude,
    Worst,
    Propagate,
}

/// Recoverable failure captured at one entity's evaluation boundary.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("rule {rule} left no samples to evaluate inside its window")]
    EmptyWindow { rule: String },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("child {child} failed: {message}")]
    ChildFailed { child: EntityId, message: String },
    #[error("evaluation task for {entity} did not complete")]
    TaskAborted { entity: EntityId },
}

static TEST_RESULT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ANALYSIS_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_test_result_id() -> TestResultId {
    let id = TEST_RESULT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TestResultId(format!("tr-{id:06}"))
}

fn next_analysis_id() -> AnalysisId {
    let id = ANALYSIS_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AnalysisId(format!("an-{id:06}"))
}

/// Drives the per-entity evaluation lifecycle and the bottom-up roll-up.
///
/// Leaf evaluation is data-parallel; aggregation runs strictly after every
/// child of a parent has reached a terminal state.
pub struct AnalysisOrchestrator<S> {
    store: Arc<S>,
    registry: Arc<MetricRegistry>,
    failed_child_policy: FailedChildPolicy,
    weight_combination: WeightCombination,
}

impl<S: AnalysisStore + 'static> AnalysisOrchestrator<S> {
    pub fn new(store: Arc<S>, registry: MetricRegistry) -> Self {
        Self::with_policies(
            store,
            registry,
            FailedChildPolicy::Exclude,
            WeightCombination::Product,
        )
    }

    pub fn with_policies(
        store: Arc<S>,
        registry: MetricRegistry,
        failed_child_policy: FailedChildPolicy,
        weight_combination: WeightCombination,
    ) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            failed_child_policy,
            weight_combination,
        }
    }

    pub fn from_config(store: Arc<S>, registry: MetricRegistry, config: &EngineConfig) -> Self {
        Self::with_policies(
            store,
            registry,
            config.failed_child_policy,
            config.weight_combination,
        )
    }

    /// Evaluates every leaf, then aggregates bottom-up to the roots.
    pub async fn run(
        &self,
        arena: &EntityArena,
        rule_sets: &[RuleSet],
        catalog: &SeriesCatalog,
        aggregator: &AggregatorSpec,
    ) -> Result<RunReport, EngineError> {
        let mut handles: Vec<(EntityId, JoinHandle<LeafEvaluation>)> = Vec::new();
        for entity in arena.bottom_up().filter(|entity| entity.is_leaf()) {
            let owned = entity.clone();
            let rules: Vec<TestRule> = select_applicable_rules(entity, rule_sets)
                .into_iter()
                .cloned()
                .collect();
            let mut series_by_metric: HashMap<String, TimeSeries> = HashMap::new();
            for rule in &rules {
                if series_by_metric.contains_key(&rule.metric) {
                    continue;
                }
                if let Some(series) = catalog.series_for(&entity.id, &rule.metric) {
                    series_by_metric.insert(rule.metric.clone(), series.clone());
                }
            }
            let registry = Arc::clone(&self.registry);
            let entity_id = entity.id.clone();
            let handle = tokio::task::spawn_blocking(move || {
                evaluate_leaf(owned, rules, series_by_metric, &registry)
            });
            handles.push((entity_id, handle));
        }

        let mut outcomes: HashMap<EntityId, NodeOutcome> = HashMap::new();
        let mut leaf_analyses = Vec::new();
        for (entity_id, handle) in handles {
            let evaluation = match handle.await {
                Ok(evaluation) => evaluation,
                Err(_) => LeafEvaluation::aborted(entity_id.clone()),
            };
            for result in evaluation.results {
                self.store.insert_test_result(result)?;
            }
            let analysis = evaluation.analysis;
            outcomes.insert(entity_id, NodeOutcome::from_leaf(&analysis));
            self.store.insert_analysis(analysis.clone())?;
            leaf_analyses.push(analysis);
        }

        let mut aggregated_analyses = Vec::new();
        for entity in arena.bottom_up().filter(|entity| !entity.is_leaf()) {
            match self.aggregate_entity(arena, entity, aggregator, &outcomes) {
                Some(analysis) => {
                    outcomes.insert(entity.id.clone(), NodeOutcome::from_aggregated(&analysis));
                    self.store.insert_aggregated(analysis.clone())?;
                    aggregated_analyses.push(analysis);
                }
                None => {
                    // no data anywhere below this node
                    outcomes.insert(entity.id.clone(), NodeOutcome::empty());
                }
            }
        }

        Ok(RunReport {
            leaf_analyses,
            aggregated_analyses,
        })
    }

    fn aggregate_entity(
        &self,
        arena: &EntityArena,
        entity: &SpatialEntity,
        aggregator: &AggregatorSpec,
        outcomes: &HashMap<EntityId, NodeOutcome>,
    ) -> Option<AggregatedAnalysis> {
        let mut contributions: Vec<ChildSummary> = Vec::new();
        let mut child_analysis_ids: Vec<AnalysisId> = Vec::new();
        let mut failed: Vec<(EntityId, String)> = Vec::new();

        for child in arena.children_of(&entity.id) {
            let Some(outcome) = outcomes.get(&child.id) else {
                continue;
            };
            match outcome.status {
                AnalysisStatus::Failed => {
                    let message = outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "analysis failed".to_string());
                    if self.failed_child_policy == FailedChildPolicy::Worst {
                        contributions.push(ChildSummary {
                            overall: CategoryRating::CategoryIV,
                            passed: false,
                            domains: BTreeMap::new(),
                            parameters: BTreeMap::new(),
                            weights: aggregator.resolve_weights(&child.context),
                        });
                        if let Some(id) = &outcome.analysis_id {
                            child_analysis_ids.push(id.clone());
                        }
                    }
                    failed.push((child.id.clone(), message));
                }
                _ => {
                    if let Some(ratings) = &outcome.ratings {
                        contributions.push(ChildSummary {
                            overall: ratings.overall,
                            passed: outcome.passed,
                            domains: ratings.domains.clone(),
                            parameters: ratings.parameters.clone(),
                            weights: aggregator.resolve_weights(&child.context),
                        });
                        if let Some(id) = &outcome.analysis_id {
                            child_analysis_ids.push(id.clone());
                        }
                    }
                }
            }
        }

        let mut record = AggregatedAnalysis {
            id: next_analysis_id(),
            entity_id: entity.id.clone(),
            child_analysis_ids,
            aggregator_id: aggregator.id.clone(),
            status: AnalysisStatus::Running,
            error_message: None,
            aggregation_results: None,
        };

        if self.failed_child_policy == FailedChildPolicy::Propagate {
            if let Some((child, message)) = failed.first() {
                let error = AnalysisError::ChildFailed {
                    child: child.clone(),
                    message: message.clone(),
                };
                tracing::warn!(entity = %entity.id, error = %error, "aggregation failed");
                record.status = AnalysisStatus::Failed;
                record.error_message = Some(error.to_string());
                return Some(record);
            }
        }

        if contributions.is_empty() {
            if failed.is_empty() {
                return None;
            }
            let error = AnalysisError::Aggregation(AggregationError::EmptyChildSet);
            tracing::warn!(entity = %entity.id, error = %error, "aggregation failed");
            record.status = AnalysisStatus::Failed;
            record.error_message = Some(error.to_string());
            return Some(record);
        }

        match aggregate_children(aggregator, self.weight_combination, &contributions) {
            Ok(results) => {
                tracing::info!(
                    entity = %entity.id,
                    rating = results.overall_rating.value(),
                    children = results.child_count,
                    "aggregated entity"
                );
                record.status = AnalysisStatus::Completed;
                record.aggregation_results = Some(results);
            }
            Err(err) => {
                tracing::warn!(entity = %entity.id, error = %err, "aggregation failed");
                record.status = AnalysisStatus::Failed;
                record.error_message = Some(err.to_string());
            }
        }
        Some(record)
    }
}

/// Forest of analyses produced by one engine run.
#[derive(Debug)]
pub struct RunReport {
    pub leaf_analyses: Vec<ComplianceAnalysis>,
    pub aggregated_analyses: Vec<AggregatedAnalysis>,
}

impl RunReport {
    pub fn analysis_for(&self, entity: &EntityId) -> Option<&ComplianceAnalysis> {
        self.leaf_analyses
            .iter()
            .find(|analysis| &analysis.entity_id == entity)
    }

    pub fn aggregated_for(&self, entity: &EntityId) -> Option<&AggregatedAnalysis> {
        self.aggregated_analyses
            .iter()
            .find(|analysis| &analysis.entity_id == entity)
    }

    /// Failed nodes with their reason strings; the run itself never aborts.
    pub fn failed_entities(&self) -> Vec<(&EntityId, &str)> {
        let leaves = self
            .leaf_analyses
            .iter()
            .filter(|analysis| analysis.status == AnalysisStatus::Failed)
            .map(|analysis| {
                (
                    &analysis.entity_id,
                    analysis.error_message.as_deref().unwrap_or("unknown"),
                )
            });
        let parents = self
            .aggregated_analyses
            .iter()
            .filter(|analysis| analysis.status == AnalysisStatus::Failed)
            .map(|analysis| {
                (
                    &analysis.entity_id,
                    analysis.error_message.as_deref().unwrap_or("unknown"),
                )
            });
        leaves.chain(parents).collect()
    }
}

struct LeafEvaluation {
    analysis: ComplianceAnalysis,
    results: Vec<TestResult>,
}

impl LeafEvaluation {
    fn aborted(entity_id: EntityId) -> Self {
        let mut analysis = ComplianceAnalysis::begin(next_analysis_id(), entity_id.clone());
        analysis.start();
        analysis.fail(
            Vec::new(),
            AnalysisError::TaskAborted { entity: entity_id }.to_string(),
        );
        Self {
            analysis,
            results: Vec::new(),
        }
    }
}

struct NodeRatings {
    overall: CategoryRating,
    domains: BTreeMap<String, CategoryRating>,
    parameters: BTreeMap<String, CategoryRating>,
}

impl NodeRatings {
    fn from_summary(summary: &SummaryResults) -> Self {
        Self {
            overall: summary.overall_rating,
            domains: summary
                .domains
                .iter()
                .map(|(domain, entry)| (domain.clone(), entry.rating))
                .collect(),
            parameters: summary
                .parameters
                .iter()
                .map(|(parameter, entry)| (parameter.clone(), entry.rating_value))
                .collect(),
        }
    }

    fn from_aggregation(results: &AggregationResults) -> Self {
        Self {
            overall: results.overall_rating,
            domains: results
                .domains
                .iter()
                .map(|(domain, entry)| (domain.clone(), entry.rating))
                .collect(),
            parameters: results
                .parameters
                .iter()
                .map(|(parameter, entry)| (parameter.clone(), entry.rating_value))
                .collect(),
        }
    }
}

struct NodeOutcome {
    analysis_id: Option<AnalysisId>,
    status: AnalysisStatus,
    passed: bool,
    error: Option<String>,
    ratings: Option<NodeRatings>,
}

impl NodeOutcome {
    fn from_leaf(analysis: &ComplianceAnalysis) -> Self {
        Self {
            analysis_id: Some(analysis.id.clone()),
            status: analysis.status,
            passed: analysis.overall_pass,
            error: analysis.error_message.clone(),
            ratings: analysis
                .summary_results
                .as_ref()
                .map(NodeRatings::from_summary),
        }
    }

    fn from_aggregated(analysis: &AggregatedAnalysis) -> Self {
        Self {
            analysis_id: Some(analysis.id.clone()),
            status: analysis.status,
            passed: analysis
                .aggregation_results
                .as_ref()
                .map(|results| results.overall_pass)
                .unwrap_or(false),
            error: analysis.error_message.clone(),
            ratings: analysis
                .aggregation_results
                .as_ref()
                .map(NodeRatings::from_aggregation),
        }
    }

    fn empty() -> Self {
        Self {
            analysis_id: None,
            status: AnalysisStatus::Completed,
            passed: true,
            error: None,
            ratings: None,
        }
    }
}

fn evaluate_leaf(
    entity: SpatialEntity,
    rules: Vec<TestRule>,
    series_by_metric: HashMap<String, TimeSeries>,
    registry: &MetricRegistry,
) -> LeafEvaluation {
    let mut analysis = ComplianceAnalysis::begin(next_analysis_id(), entity.id.clone());
    analysis.start();
    tracing::debug!(entity = %entity.id, rules = rules.len(), "evaluating entity");

    let mut results: Vec<TestResult> = Vec::new();
    let mut summary_entries: Vec<(String, f64)> = Vec::new();
    let mut first_error: Option<String> = None;

    for rule in &rules {
        // a metric with no series at all is an ingestion gap, not a violation
        let Some(series) = series_by_metric.get(&rule.metric) else {
            continue;
        };
        match evaluate_rule(&entity.id, rule, series, registry) {
            Ok(result) => {
                summary_entries.push((rule.metric.clone(), result.out_of_range_percentage));
                results.push(result);
            }
            Err(err) => {
                tracing::warn!(
                    entity = %entity.id,
                    rule = %rule.id.0,
                    error = %err,
                    "rule evaluation failed"
                );
                let message = err.to_string();
                results.push(failed_result(&entity.id, rule, &message));
                if first_error.is_none() {
                    first_error = Some(message);
                }
            }
        }
    }

    let result_ids: Vec<TestResultId> = results.iter().map(|result| result.id.clone()).collect();
    match first_error {
        Some(message) => analysis.fail(result_ids, message),
        None => {
            let overall_pass = results.iter().all(|result| result.passed);
            let summary = build_summary(&summary_entries, registry);
            analysis.complete(result_ids, overall_pass, summary);
        }
    }

    LeafEvaluation { analysis, results }
}

fn evaluate_rule(
    entity_id: &EntityId,
    rule: &TestRule,
    series: &TimeSeries,
    registry: &MetricRegistry,
) -> Result<TestResult, AnalysisError> {
    let category = registry.category_of(&rule.metric);
    validate_resolution(&series.timestamps(), category)?;
    let normalized = ensure_minimum_resolution(series, category)?;
    let interval = detect_resolution(&normalized.timestamps()).map_err(ResolutionError::from)?;

    let samples: Vec<Sample> = match rule.window {
        Some(window) => normalized
            .samples
            .iter()
            .copied()
            .filter(|sample| window.contains(sample.timestamp))
            .collect(),
        None => normalized.samples.clone(),
    };
    if samples.is_empty() {
        return Err(AnalysisError::EmptyWindow {
            rule: rule.id.0.clone(),
        });
    }

    let mask = evaluator_for(rule.mode)(&samples, &rule.bounds);
    let total = mask.len();
    let non_compliant = mask.iter().filter(|flag| !**flag).count();
    let out_of_range_percentage = 100.0 * non_compliant as f64 / total as f64;
    let out_of_range_hours = non_compliant as f64 * interval.num_seconds() as f64 / 3600.0;

    let passed = match rule.tolerance {
        ToleranceBudget::Percentage(budget) => out_of_range_percentage <= budget,
        ToleranceBudget::Hours(budget) => out_of_range_hours <= budget,
    };

    let mut details = BTreeMap::new();
    details.insert(
        "compliant_samples".to_string(),
        json!(total - non_compliant),
    );
    details.insert(
        "missing_samples".to_string(),
        json!(samples.iter().filter(|sample| sample.value.is_none()).count()),
    );
    details.insert(
        "interval_seconds".to_string(),
        json!(interval.num_seconds()),
    );
    if let Some(threshold) = rule.threshold() {
        let max_deviation = samples
            .iter()
            .filter_map(|sample| sample.value)
            .map(|value| threshold.distance_from_compliance(value))
            .fold(0.0, f64::max);
        details.insert("max_deviation".to_string(), json!(max_deviation));
    }

    Ok(TestResult {
        id: next_test_result_id(),
        entity_id: entity_id.clone(),
        rule_id: rule.id.clone(),
        passed,
        out_of_range_hours,
        out_of_range_percentage,
        samples_evaluated: total,
        status: AnalysisStatus::Completed,
        error_message: None,
        details,
    })
}

fn failed_result(entity_id: &EntityId, rule: &TestRule, message: &str) -> TestResult {
    TestResult {
        id: next_test_result_id(),
        entity_id: entity_id.clone(),
        rule_id: rule.id.clone(),
        passed: false,
        out_of_range_hours: 0.0,
        out_of_range_percentage: 0.0,
        samples_evaluated: 0,
        status: AnalysisStatus::Failed,
        error_message: Some(message.to_string()),
        details: BTreeMap::new(),
    }
}
