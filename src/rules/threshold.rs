use serde::{Deserialize, Serialize};

const LIMIT_MAGNITUDE_CAP: f64 = 1e10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Bidirectional,
    UnidirectionalMin,
    UnidirectionalMax,
}

/// Validation errors raised at threshold construction.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind:?} threshold requires a {side} limit")]
    MissingLimit {
        kind: ThresholdKind,
        side: &'static str,
    },
    #[error("bidirectional threshold requires lower < upper (got {lower} and {upper})")]
    InvertedBounds { lower: f64, upper: f64 },
    #[error("limit {value} is outside the representable range of +/-1e10")]
    LimitOutOfRange { value: f64 },
    #[error("tolerance must be finite and non-negative (got {value})")]
    InvalidTolerance { value: f64 },
}

/// Immutable acceptable-range value object. Bounds are checked once at
/// construction; evaluation never fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceThreshold {
    kind: ThresholdKind,
    lower_limit: Option<f64>,
    upper_limit: Option<f64>,
    unit: String,
    tolerance: f64,
}

impl ComplianceThreshold {
    pub fn new(
        kind: ThresholdKind,
        lower_limit: Option<f64>,
        upper_limit: Option<f64>,
        unit: impl Into<String>,
        tolerance: f64,
    ) -> Result<Self, ValidationError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ValidationError::InvalidTolerance { value: tolerance });
        }
        for limit in [lower_limit, upper_limit].into_iter().flatten() {
            if !limit.is_finite() || limit.abs() > LIMIT_MAGNITUDE_CAP {
                return Err(ValidationError::LimitOutOfRange { value: limit });
            }
        }

        match kind {
            ThresholdKind::Bidirectional => {
                let lower = lower_limit.ok_or(ValidationError::MissingLimit {
                    kind,
                    side: "lower",
                })?;
                let upper = upper_limit.ok_or(ValidationError::MissingLimit {
                    kind,
                    side: "upper",
                })?;
                if lower >= upper {
                    return Err(ValidationError::InvertedBounds { lower, upper });
                }
            }
            ThresholdKind::UnidirectionalMin => {
                if lower_limit.is_none() {
                    return Err(ValidationError::MissingLimit {
                        kind,
                        side: "lower",
                    });
                }
            }
            ThresholdKind::UnidirectionalMax => {
                if upper_limit.is_none() {
                    return Err(ValidationError::MissingLimit {
                        kind,
                        side: "upper",
                    });
                }
            }
        }

        Ok(Self {
            kind,
            lower_limit,
            upper_limit,
            unit: unit.into(),
            tolerance,
        })
    }

    pub fn bidirectional(
        lower: f64,
        upper: f64,
        unit: impl Into<String>,
        tolerance: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(
            ThresholdKind::Bidirectional,
            Some(lower),
            Some(upper),
            unit,
            tolerance,
        )
    }

    pub fn at_least(
        lower: f64,
        unit: impl Into<String>,
        tolerance: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(ThresholdKind::UnidirectionalMin, Some(lower), None, unit, tolerance)
    }

    pub fn at_most(
        upper: f64,
        unit: impl Into<String>,
        tolerance: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(ThresholdKind::UnidirectionalMax, None, Some(upper), unit, tolerance)
    }

    pub fn kind(&self) -> ThresholdKind {
        self.kind
    }

    pub fn lower_limit(&self) -> Option<f64> {
        self.lower_limit
    }

    pub fn upper_limit(&self) -> Option<f64> {
        self.upper_limit
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Inclusive on both (tolerance-widened) bounds.
    pub fn is_compliant(&self, value: f64) -> bool {
        let above_lower = self
            .lower_limit
            .map(|lower| value >= lower - self.tolerance)
            .unwrap_or(true);
        let below_upper = self
            .upper_limit
            .map(|upper| value <= upper + self.tolerance)
            .unwrap_or(true);

        match self.kind {
            ThresholdKind::Bidirectional => above_lower && below_upper,
            ThresholdKind::UnidirectionalMin => above_lower,
            ThresholdKind::UnidirectionalMax => below_upper,
        }
    }

    /// Unsigned shortfall/excess from the nearest violated bound; zero when
    /// compliant.
    pub fn distance_from_compliance(&self, value: f64) -> f64 {
        if self.is_compliant(value) {
            return 0.0;
        }

        if let Some(lower) = self.lower_limit {
            let floor = lower - self.tolerance;
            if value < floor && self.kind != ThresholdKind::UnidirectionalMax {
                return floor - value;
            }
        }
        if let Some(upper) = self.upper_limit {
            let ceiling = upper + self.tolerance;
            if value > ceiling && self.kind != ThresholdKind::UnidirectionalMin {
                return value - ceiling;
            }
        }
        0.0
    }
}
