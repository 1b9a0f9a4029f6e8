use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::analysis::ClimateDomain;

/// Classes of metered data with distinct resolution floors and default
/// aggregation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    IndoorClimate,
    Weather,
    Energy,
    Water,
}

impl DataCategory {
    /// Coarsest interval still acceptable for this class of data.
    pub fn minimum_resolution(self) -> Duration {
        match self {
            Self::IndoorClimate | Self::Weather => Duration::hours(1),
            Self::Energy | Self::Water => Duration::days(1),
        }
    }

    pub const fn default_method(self) -> AggregationMethod {
        match self {
            Self::IndoorClimate | Self::Weather => AggregationMethod::Mean,
            Self::Energy | Self::Water => AggregationMethod::Sum,
        }
    }
}

/// Resampling statistics supported by the resolution normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Mean,
    Median,
    Sum,
    Min,
    Max,
    First,
    Last,
    Count,
    Std,
}

/// Registry mapping metric names to categories and climate domains.
///
/// Unknown metrics fall back to `IndoorClimate`, the strictest resolution
/// floor, so unregistered data is never under-validated.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    categories: HashMap<String, DataCategory>,
    domains: HashMap<String, ClimateDomain>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl MetricRegistry {
    pub fn standard() -> Self {
        let mut registry = Self {
            categories: HashMap::new(),
            domains: HashMap::new(),
        };

        for metric in ["air_temperature", "operative_temperature"] {
            registry.register(metric, DataCategory::IndoorClimate, Some(ClimateDomain::Thermal));
        }
        for metric in ["co2", "relative_humidity", "voc", "pm25", "radon"] {
            registry.register(metric, DataCategory::IndoorClimate, Some(ClimateDomain::Iaq));
        }
        registry.register(
            "sound_pressure_level",
            DataCategory::IndoorClimate,
            Some(ClimateDomain::Acoustic),
        );
        for metric in ["illuminance", "daylight_factor"] {
            registry.register(metric, DataCategory::IndoorClimate, Some(ClimateDomain::Luminous));
        }
        for metric in ["outdoor_temperature", "solar_irradiance"] {
            registry.register(metric, DataCategory::Weather, Some(ClimateDomain::Thermal));
        }
        // consumption metrics carry no comfort domain
        for metric in ["electricity", "district_heating", "district_cooling"] {
            registry.register(metric, DataCategory::Energy, None);
        }
        registry.register("water_volume", DataCategory::Water, None);

        registry
    }

    pub fn register(
        &mut self,
        metric: impl Into<String>,
        category: DataCategory,
        domain: Option<ClimateDomain>,
    ) {
        let metric = metric.into();
        self.categories.insert(metric.clone(), category);
        if let Some(domain) = domain {
            self.domains.insert(metric, domain);
        }
    }

    pub fn category_of(&self, metric: &str) -> DataCategory {
        self.categories
            .get(metric)
            .copied()
            .unwrap_or(DataCategory::IndoorClimate)
    }

    pub fn domain_of(&self, metric: &str) -> Option<ClimateDomain> {
        self.domains.get(metric).copied()
    }
}
