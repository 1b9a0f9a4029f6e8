use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use super::registry::{AggregationMethod, DataCategory};
use super::{Sample, TimeSeries};

#[derive(Debug, thiserror::Error)]
#[error("need at least {needed} timestamps to detect a resolution, got {got}")]
pub struct InsufficientDataError {
    pub needed: usize,
    pub got: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),
    #[error(
        "detected resolution of {detected_seconds}s is coarser than the required {minimum_seconds}s"
    )]
    TooCoarse {
        detected_seconds: i64,
        minimum_seconds: i64,
    },
}

/// Modal gap between consecutive timestamps.
pub fn detect_resolution(
    timestamps: &[DateTime<Utc>],
) -> Result<Duration, InsufficientDataError> {
    if timestamps.len() < 2 {
        return Err(InsufficientDataError {
            needed: 2,
            got: timestamps.len(),
        });
    }

    let mut gap_counts: HashMap<i64, usize> = HashMap::new();
    for pair in timestamps.windows(2) {
        let gap = (pair[1] - pair[0]).num_seconds();
        if gap > 0 {
            *gap_counts.entry(gap).or_insert(0) += 1;
        }
    }

    gap_counts
        .into_iter()
        .max_by(|(gap_a, count_a), (gap_b, count_b)| {
            // ties resolve to the finer gap
            count_a.cmp(count_b).then(gap_b.cmp(gap_a))
        })
        .map(|(gap, _)| Duration::seconds(gap))
        .ok_or(InsufficientDataError {
            needed: 2,
            got: timestamps.len(),
        })
}

/// Rejects series whose sampling is coarser than the category floor.
pub fn validate_resolution(
    timestamps: &[DateTime<Utc>],
    category: DataCategory,
) -> Result<Duration, ResolutionError> {
    let detected = detect_resolution(timestamps)?;
    let minimum = category.minimum_resolution();
    if detected > minimum {
        return Err(ResolutionError::TooCoarse {
            detected_seconds: detected.num_seconds(),
            minimum_seconds: minimum.num_seconds(),
        });
    }
    Ok(detected)
}

/// Resamples to `target` using epoch-aligned windows. Missing values never
/// enter a statistic; a window with only missing samples stays missing.
pub fn aggregate_to_resolution(
    series: &TimeSeries,
    target: Duration,
    method: Option<AggregationMethod>,
    category: DataCategory,
) -> TimeSeries {
    let target_seconds = target.num_seconds();
    if target_seconds <= 0 {
        return series.clone();
    }
    let method = method.unwrap_or_else(|| category.default_method());

    let mut windows: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
    for sample in &series.samples {
        let window = sample.timestamp.timestamp().div_euclid(target_seconds) * target_seconds;
        windows.entry(window).or_default().push(sample.value);
    }

    let samples = windows
        .into_iter()
        .filter_map(|(window, values)| {
            let timestamp = DateTime::<Utc>::from_timestamp(window, 0)?;
            Some(Sample::new(timestamp, apply_method(method, &values)))
        })
        .collect();

    TimeSeries {
        id: series.id.clone(),
        metric: series.metric.clone(),
        unit: series.unit.clone(),
        samples,
    }
}

/// Coarsens series sampled finer than the category floor; series already at
/// or coarser than the floor pass through unchanged. Never upsamples.
pub fn ensure_minimum_resolution(
    series: &TimeSeries,
    category: DataCategory,
) -> Result<TimeSeries, ResolutionError> {
    let detected = detect_resolution(&series.timestamps())?;
    let minimum = category.minimum_resolution();
    if detected >= minimum {
        return Ok(series.clone());
    }
    Ok(aggregate_to_resolution(series, minimum, None, category))
}

fn apply_method(method: AggregationMethod, values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if method == AggregationMethod::Count {
        return Some(present.len() as f64);
    }
    if present.is_empty() {
        return None;
    }

    match method {
        AggregationMethod::Mean => Some(present.iter().sum::<f64>() / present.len() as f64),
        AggregationMethod::Median => {
            let mut sorted = present.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Some((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Some(sorted[mid])
            }
        }
        AggregationMethod::Sum => Some(present.iter().sum()),
        AggregationMethod::Min => present.iter().copied().reduce(f64::min),
        AggregationMethod::Max => present.iter().copied().reduce(f64::max),
        AggregationMethod::First => present.first().copied(),
        AggregationMethod::Last => present.last().copied(),
        AggregationMethod::Std => {
            let mean = present.iter().sum::<f64>() / present.len() as f64;
            let variance = present
                .iter()
                .map(|value| (value - mean).powi(2))
                .sum::<f64>()
                / present.len() as f64;
            Some(variance.sqrt())
        }
        AggregationMethod::Count => Some(present.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesId;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, minute / 60, minute % 60, 0)
            .single()
            .expect("valid timestamp")
    }

    fn series(metric: &str, step_minutes: u32, values: &[Option<f64>]) -> TimeSeries {
        TimeSeries {
            id: SeriesId("s-1".to_string()),
            metric: metric.to_string(),
            unit: "unit".to_string(),
            samples: values
                .iter()
                .enumerate()
                .map(|(i, value)| Sample::new(ts(i as u32 * step_minutes), *value))
                .collect(),
        }
    }

    #[test]
    fn detects_modal_gap() {
        // one irregular 30 minute gap among 15 minute sampling
        let timestamps = vec![ts(0), ts(15), ts(30), ts(60), ts(75)];
        let detected = detect_resolution(&timestamps).expect("resolution detected");
        assert_eq!(detected, Duration::minutes(15));
    }

    #[test]
    fn detection_needs_two_timestamps() {
        match detect_resolution(&[ts(0)]) {
            Err(err) => {
                assert_eq!(err.needed, 2);
                assert_eq!(err.got, 1);
            }
            Ok(other) => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_daily_indoor_climate() {
        let timestamps: Vec<_> = (0..4)
            .map(|day| {
                Utc.with_ymd_and_hms(2025, 6, 1 + day, 0, 0, 0)
                    .single()
                    .expect("valid timestamp")
            })
            .collect();
        match validate_resolution(&timestamps, DataCategory::IndoorClimate) {
            Err(ResolutionError::TooCoarse {
                detected_seconds,
                minimum_seconds,
            }) => {
                assert_eq!(detected_seconds, 86_400);
                assert_eq!(minimum_seconds, 3_600);
            }
            other => panic!("expected too coarse error, got {other:?}"),
        }
    }

    #[test]
    fn ensure_minimum_is_noop_at_or_above_floor() {
        let hourly = series(
            "air_temperature",
            60,
            &[Some(20.0), Some(21.0), Some(22.0)],
        );
        let unchanged = ensure_minimum_resolution(&hourly, DataCategory::IndoorClimate)
            .expect("resolution handled");
        assert_eq!(unchanged, hourly);
    }

    #[test]
    fn ensure_minimum_coarsens_fine_climate_data_with_mean() {
        let quarter_hourly = series(
            "air_temperature",
            15,
            &[Some(20.0), Some(22.0), Some(24.0), Some(26.0), Some(30.0)],
        );
        let coarsened = ensure_minimum_resolution(&quarter_hourly, DataCategory::IndoorClimate)
            .expect("resolution handled");
        assert_eq!(coarsened.samples.len(), 2);
        assert_eq!(coarsened.samples[0].value, Some(23.0));
        assert_eq!(coarsened.samples[1].value, Some(30.0));
    }

    #[test]
    fn explicit_sum_resampling_totals_each_window() {
        let energy = series("electricity", 30, &[Some(1.5), Some(2.5), Some(3.0)]);
        let hourly = aggregate_to_resolution(
            &energy,
            Duration::hours(1),
            Some(AggregationMethod::Sum),
            DataCategory::Energy,
        );
        assert_eq!(hourly.samples.len(), 2);
        assert_eq!(hourly.samples[0].value, Some(4.0));
        assert_eq!(hourly.samples[1].value, Some(3.0));
    }

    #[test]
    fn all_missing_window_stays_missing() {
        let gappy = series("air_temperature", 15, &[None, None, None, None]);
        let coarsened = aggregate_to_resolution(
            &gappy,
            Duration::hours(1),
            None,
            DataCategory::IndoorClimate,
        );
        assert_eq!(coarsened.samples.len(), 1);
        assert_eq!(coarsened.samples[0].value, None);
    }

    #[test]
    fn count_reports_present_values_only() {
        let gappy = series("co2", 15, &[Some(400.0), None, Some(600.0), None]);
        let counted = aggregate_to_resolution(
            &gappy,
            Duration::hours(1),
            Some(AggregationMethod::Count),
            DataCategory::IndoorClimate,
        );
        assert_eq!(counted.samples[0].value, Some(2.0));
    }

    #[test]
    fn median_splits_even_windows() {
        let readings = series("co2", 15, &[Some(400.0), Some(500.0), Some(700.0), Some(800.0)]);
        let hourly = aggregate_to_resolution(
            &readings,
            Duration::hours(1),
            Some(AggregationMethod::Median),
            DataCategory::IndoorClimate,
        );
        assert_eq!(hourly.samples[0].value, Some(600.0));
    }
}
