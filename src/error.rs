use crate::analysis::{AggregationError, AnalysisError, StoreError};
use crate::config::ConfigError;
use crate::hierarchy::HierarchyError;
use crate::telemetry::TelemetryError;
use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Hierarchy(HierarchyError),
    Analysis(AnalysisError),
    Aggregation(AggregationError),
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(err) => write!(f, "configuration error: {}", err),
            EngineError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            EngineError::Hierarchy(err) => write!(f, "hierarchy error: {}", err),
            EngineError::Analysis(err) => write!(f, "analysis error: {}", err),
            EngineError::Aggregation(err) => write!(f, "aggregation error: {}", err),
            EngineError::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(err) => Some(err),
            EngineError::Telemetry(err) => Some(err),
            EngineError::Hierarchy(err) => Some(err),
            EngineError::Analysis(err) => Some(err),
            EngineError::Aggregation(err) => Some(err),
            EngineError::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for EngineError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<HierarchyError> for EngineError {
    fn from(value: HierarchyError) -> Self {
        Self::Hierarchy(value)
    }
}

impl From<AnalysisError> for EngineError {
    fn from(value: AnalysisError) -> Self {
        Self::Analysis(value)
    }
}

impl From<AggregationError> for EngineError {
    fn from(value: AggregationError) -> Self {
        Self::Aggregation(value)
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
