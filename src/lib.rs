pub mod analysis;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod rules;
pub mod series;
pub mod telemetry;

pub use analysis::{
    AggregatedAnalysis, AggregationError, AggregationStrategy, AggregatorSpec, AnalysisError,
    AnalysisOrchestrator, AnalysisStatus, AnalysisStore, CategoryRating, ComplianceAnalysis,
    FailedChildPolicy, MemoryAnalysisStore, RunReport, SummaryResults, TestResult,
    WeightCombination,
};
pub use config::{AppEnvironment, ConfigError, EngineConfig, TelemetryConfig};
pub use error::EngineError;
pub use hierarchy::{EntityArena, EntityContext, EntityId, EntityKind, HierarchyError, SpatialEntity};
pub use rules::{
    ApplicabilityCondition, ComplianceThreshold, ConfigurationError, RuleMode, RuleSet, TestRule,
    ThresholdKind, ToleranceBudget, ValidationError,
};
pub use series::{
    DataCategory, MeteringPoint, MetricRegistry, ResolutionError, Sample, SeriesCatalog,
    TimeSeries,
};
