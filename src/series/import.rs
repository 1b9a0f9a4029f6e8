use std::io::Read;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::{Sample, SeriesId, TimeSeries};

/// Errors raised while reading a materialized series export.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },
}

/// Reads a `Timestamp,Value` export into a time-ordered series. Blank value
/// cells become missing samples.
pub fn read_series<R: Read>(
    reader: R,
    id: impl Into<String>,
    metric: impl Into<String>,
    unit: impl Into<String>,
) -> Result<TimeSeries, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for (index, record) in csv_reader.deserialize::<SeriesRow>().enumerate() {
        let row = record?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| ImportError::Timestamp {
            row: index + 1,
            value: row.timestamp.clone(),
        })?;
        samples.push(Sample::new(timestamp, row.value));
    }

    samples.sort_by_key(|sample| sample.timestamp);

    Ok(TimeSeries {
        id: SeriesId(id.into()),
        metric: metric.into(),
        unit: unit.into(),
        samples,
    })
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Value", default, deserialize_with = "empty_cell_as_none")]
    value: Option<f64>,
}

fn empty_cell_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_blank_cells_as_missing_and_sorts_rows() {
        let csv = "Timestamp,Value\n\
                   2025-06-01T01:00:00Z,21.5\n\
                   2025-06-01T00:00:00Z,\n\
                   2025-06-01 02:00:00,22.0\n";
        let series =
            read_series(csv.as_bytes(), "s-1", "air_temperature", "C").expect("series parses");

        assert_eq!(series.samples.len(), 3);
        assert_eq!(series.samples[0].value, None);
        assert_eq!(series.samples[1].value, Some(21.5));
        assert_eq!(series.samples[2].value, Some(22.0));
        assert!(series.samples[0].timestamp < series.samples[1].timestamp);
    }

    #[test]
    fn rejects_unparseable_timestamps() {
        let csv = "Timestamp,Value\nnot-a-date,20.0\n";
        match read_series(csv.as_bytes(), "s-1", "co2", "ppm") {
            Err(ImportError::Timestamp { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }
}
