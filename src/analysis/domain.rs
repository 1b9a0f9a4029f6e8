use std::collections::BTreeMap;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::summary::{AggregationResults, SummaryResults};
use crate::hierarchy::EntityId;
use crate::rules::RuleId;

/// Identifier wrapper for test results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestResultId(pub String);

/// Identifier wrapper for entity analyses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub String);

/// Lifecycle of one entity's evaluation. `Completed` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// IEQ domain a metric belongs to, used to group summary ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateDomain {
    Thermal,
    Acoustic,
    Iaq,
    Luminous,
}

impl ClimateDomain {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Thermal => "thermal",
            Self::Acoustic => "acoustic",
            Self::Iaq => "iaq",
            Self::Luminous => "luminous",
        }
    }
}

/// Standard category rating: 1 (Category I, best) through 4 (Category IV,
/// worst). Serialized numerically; both numeric and roman-numeral spellings
/// are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryRating {
    CategoryI,
    CategoryII,
    CategoryIII,
    CategoryIV,
}

impl CategoryRating {
    pub const fn value(self) -> u8 {
        match self {
            Self::CategoryI => 1,
            Self::CategoryII => 2,
            Self::CategoryIII => 3,
            Self::CategoryIV => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CategoryI => "I",
            Self::CategoryII => "II",
            Self::CategoryIII => "III",
            Self::CategoryIV => "IV",
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::CategoryI),
            2 => Some(Self::CategoryII),
            3 => Some(Self::CategoryIII),
            4 => Some(Self::CategoryIV),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "I" | "1" => Some(Self::CategoryI),
            "II" | "2" => Some(Self::CategoryII),
            "III" | "3" => Some(Self::CategoryIII),
            "IV" | "4" => Some(Self::CategoryIV),
            _ => None,
        }
    }

    pub fn worst(self, other: Self) -> Self {
        if self.value() >= other.value() {
            self
        } else {
            other
        }
    }
}

impl Serialize for CategoryRating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for CategoryRating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RatingVisitor;

        impl<'de> Visitor<'de> for RatingVisitor {
            type Value = CategoryRating;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a rating 1..4 or a roman numeral I..IV")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                u8::try_from(value)
                    .ok()
                    .and_then(CategoryRating::from_value)
                    .ok_or_else(|| E::custom(format!("rating {value} outside 1..4")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u8::try_from(value)
                    .ok()
                    .and_then(CategoryRating::from_value)
                    .ok_or_else(|| E::custom(format!("rating {value} outside 1..4")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                CategoryRating::from_label(value)
                    .ok_or_else(|| E::custom(format!("unrecognized rating '{value}'")))
            }
        }

        deserializer.deserialize_any(RatingVisitor)
    }
}

/// Outcome of evaluating one rule against one entity's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: TestResultId,
    pub entity_id: EntityId,
    pub rule_id: RuleId,
    pub passed: bool,
    pub out_of_range_hours: f64,
    pub out_of_range_percentage: f64,
    pub samples_evaluated: usize,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

/// Per-entity roll-up of the entity's test results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAnalysis {
    pub id: AnalysisId,
    pub entity_id: EntityId,
    pub test_result_ids: Vec<TestResultId>,
    pub overall_pass: bool,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_results: Option<SummaryResults>,
}

impl ComplianceAnalysis {
    pub fn begin(id: AnalysisId, entity_id: EntityId) -> Self {
        Self {
            id,
            entity_id,
            test_result_ids: Vec::new(),
            overall_pass: false,
            status: AnalysisStatus::Pending,
            error_message: None,
            summary_results: None,
        }
    }

    pub fn start(&mut self) {
        if !self.status.is_terminal() {
            self.status = AnalysisStatus::Running;
        }
    }

    pub fn complete(
        &mut self,
        test_result_ids: Vec<TestResultId>,
        overall_pass: bool,
        summary_results: Option<SummaryResults>,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.test_result_ids = test_result_ids;
        self.overall_pass = overall_pass;
        self.summary_results = summary_results;
        self.status = AnalysisStatus::Completed;
    }

    pub fn fail(&mut self, test_result_ids: Vec<TestResultId>, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.test_result_ids = test_result_ids;
        self.overall_pass = false;
        self.error_message = Some(message.into());
        self.status = AnalysisStatus::Failed;
    }
}

/// Parent-level result combining child analyses through an aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedAnalysis {
    pub id: AnalysisId,
    pub entity_id: EntityId,
    pub child_analysis_ids: Vec<AnalysisId>,
    pub aggregator_id: String,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation_results: Option<AggregationResults>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_deserialize_from_numbers_and_roman_numerals() {
        let numeric: CategoryRating = serde_json::from_str("2").expect("numeric parses");
        assert_eq!(numeric, CategoryRating::CategoryII);

        let roman: CategoryRating = serde_json::from_str("\"IV\"").expect("roman parses");
        assert_eq!(roman, CategoryRating::CategoryIV);

        let lower: CategoryRating = serde_json::from_str("\"iii\"").expect("lowercase parses");
        assert_eq!(lower, CategoryRating::CategoryIII);

        let numeric_string: CategoryRating =
            serde_json::from_str("\"1\"").expect("numeric string parses");
        assert_eq!(numeric_string, CategoryRating::CategoryI);
    }

    #[test]
    fn ratings_serialize_numerically_and_reject_out_of_scale_values() {
        assert_eq!(
            serde_json::to_string(&CategoryRating::CategoryIII).expect("serializes"),
            "3"
        );
        assert!(serde_json::from_str::<CategoryRating>("5").is_err());
        assert!(serde_json::from_str::<CategoryRating>("\"V\"").is_err());
    }

    #[test]
    fn worst_prefers_the_higher_value() {
        assert_eq!(
            CategoryRating::CategoryII.worst(CategoryRating::CategoryIV),
            CategoryRating::CategoryIV
        );
        assert_eq!(
            CategoryRating::CategoryI.worst(CategoryRating::CategoryI),
            CategoryRating::CategoryI
        );
    }

    #[test]
    fn lifecycle_stops_at_the_first_terminal_state() {
        let mut analysis =
            ComplianceAnalysis::begin(AnalysisId("an-1".to_string()), EntityId::new("room-1"));
        assert_eq!(analysis.status, AnalysisStatus::Pending);

        analysis.start();
        assert_eq!(analysis.status, AnalysisStatus::Running);

        analysis.fail(Vec::new(), "series too coarse");
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert!(analysis.status.is_terminal());

        analysis.complete(Vec::new(), true, None);
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert_eq!(analysis.error_message.as_deref(), Some("series too coarse"));
    }
}
