mod aggregation;
mod domain;
mod orchestrator;
mod store;
mod summary;

#[cfg(test)]
mod tests;

pub use aggregation::{
    aggregate_children, aggregate_flags, aggregate_ratings, aggregate_values, AggregationError,
    AggregationStrategy, AggregatorSpec, ChildSummary, WeightCombination, WeightProperty,
    WeightedValue,
};
pub use domain::{
    AggregatedAnalysis, AnalysisId, AnalysisStatus, CategoryRating, ClimateDomain,
    ComplianceAnalysis, TestResult, TestResultId,
};
pub use orchestrator::{AnalysisError, AnalysisOrchestrator, FailedChildPolicy, RunReport};
pub use store::{AnalysisStore, MemoryAnalysisStore, StoreError};
pub use summary::{
    build_summary, rating_from_out_of_range, AggregationResults, DomainRating, ParameterRating,
    SummaryResults,
};
