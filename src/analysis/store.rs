use std::collections::HashMap;
use std::sync::Mutex;

use super::domain::{AggregatedAnalysis, ComplianceAnalysis, TestResult, TestResultId};
use crate::hierarchy::EntityId;

/// Error enumeration for analysis persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction so the orchestrator can be exercised in isolation;
/// callers own durable persistence.
pub trait AnalysisStore: Send + Sync {
    fn insert_test_result(&self, result: TestResult) -> Result<(), StoreError>;
    fn insert_analysis(&self, analysis: ComplianceAnalysis) -> Result<(), StoreError>;
    fn insert_aggregated(&self, analysis: AggregatedAnalysis) -> Result<(), StoreError>;
    fn test_result(&self, id: &TestResultId) -> Result<Option<TestResult>, StoreError>;
    fn analysis_for(&self, entity: &EntityId) -> Result<Option<ComplianceAnalysis>, StoreError>;
    fn aggregated_for(&self, entity: &EntityId) -> Result<Option<AggregatedAnalysis>, StoreError>;
}

/// In-memory store backing tests and the default orchestrator wiring.
#[derive(Debug, Default)]
pub struct MemoryAnalysisStore {
    test_results: Mutex<HashMap<TestResultId, TestResult>>,
    analyses: Mutex<HashMap<EntityId, ComplianceAnalysis>>,
    aggregated: Mutex<HashMap<EntityId, AggregatedAnalysis>>,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisStore for MemoryAnalysisStore {
    fn insert_test_result(&self, result: TestResult) -> Result<(), StoreError> {
        let mut guard = self
            .test_results
            .lock()
            .map_err(|_| StoreError::Unavailable("test result mutex poisoned".to_string()))?;
        if guard.contains_key(&result.id) {
            return Err(StoreError::Conflict(result.id.0.clone()));
        }
        guard.insert(result.id.clone(), result);
        Ok(())
    }

    fn insert_analysis(&self, analysis: ComplianceAnalysis) -> Result<(), StoreError> {
        let mut guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Unavailable("analysis mutex poisoned".to_string()))?;
        if guard.contains_key(&analysis.entity_id) {
            return Err(StoreError::Conflict(analysis.id.0.clone()));
        }
        guard.insert(analysis.entity_id.clone(), analysis);
        Ok(())
    }

    fn insert_aggregated(&self, analysis: AggregatedAnalysis) -> Result<(), StoreError> {
        let mut guard = self
            .aggregated
            .lock()
            .map_err(|_| StoreError::Unavailable("aggregated mutex poisoned".to_string()))?;
        if guard.contains_key(&analysis.entity_id) {
            return Err(StoreError::Conflict(analysis.id.0.clone()));
        }
        guard.insert(analysis.entity_id.clone(), analysis);
        Ok(())
    }

    fn test_result(&self, id: &TestResultId) -> Result<Option<TestResult>, StoreError> {
        let guard = self
            .test_results
            .lock()
            .map_err(|_| StoreError::Unavailable("test result mutex poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn analysis_for(&self, entity: &EntityId) -> Result<Option<ComplianceAnalysis>, StoreError> {
        let guard = self
            .analyses
            .lock()
            .map_err(|_| StoreError::Unavailable("analysis mutex poisoned".to_string()))?;
        Ok(guard.get(entity).cloned())
    }

    fn aggregated_for(&self, entity: &EntityId) -> Result<Option<AggregatedAnalysis>, StoreError> {
        let guard = self
            .aggregated
            .lock()
            .map_err(|_| StoreError::Unavailable("aggregated mutex poisoned".to_string()))?;
        Ok(guard.get(entity).cloned())
    }
}
