use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::track::error::TrackError;
use crate::track::raw::{RawPoint, RawValue};
use crate::track::sample::GeoSample;
use crate::track::timestamp::parse_timestamp;

// Brackets narrower than this are treated as a single instant.
const MIN_BRACKET_SECONDS: f64 = 1e-6;

/// Validates one raw record into a sample.
pub fn parse_point(point: &RawPoint) -> Result<GeoSample, TrackError> {
    let timestamp = point
        .timestamp
        .as_deref()
        .ok_or(TrackError::MissingField("timestamp"))?;

    Ok(GeoSample {
        timestamp: parse_timestamp(timestamp)?,
        latitude: resolve_coordinate(point.latitude.as_ref(), "latitude")?,
        longitude: resolve_coordinate(point.longitude.as_ref(), "longitude")?,
        elevation: point.elevation.as_ref().and_then(RawValue::as_finite_f64),
    })
}

fn resolve_coordinate(value: Option<&RawValue>, field: &'static str) -> Result<f64, TrackError> {
    let value = value.ok_or(TrackError::MissingField(field))?;
    value.as_finite_f64().ok_or_else(|| TrackError::Coordinate {
        field,
        value: value.to_string(),
    })
}

/// Counts the records that would survive validation.
pub fn usable_count(points: &[RawPoint]) -> usize {
    points
        .iter()
        .filter(|point| parse_point(point).is_ok())
        .count()
}

/// A merged, time-ordered track assembled from one or more sources.
#[derive(Debug, Clone, Default)]
pub struct TrackSeries {
    samples: Vec<GeoSample>,
}

impl TrackSeries {
    /// Merges raw records from every source into one ordered series.
    ///
    /// Records that fail validation are dropped with a warning. Fails only
    /// when nothing usable remains across all sources.
    pub fn build(sources: &[Vec<RawPoint>]) -> Result<TrackSeries, TrackError> {
        let mut samples = Vec::new();

        for (index, source) in sources.iter().enumerate() {
            let mut usable = Vec::new();
            for point in source {
                match parse_point(point) {
                    Ok(sample) => usable.push(sample),
                    Err(reason) => {
                        warn!("Dropping record from source {}: {}", index, reason);
                    }
                }
            }
            usable.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            debug!(
                "Source {}: {} of {} records usable",
                index,
                usable.len(),
                source.len()
            );
            samples.extend(usable);
        }

        if samples.is_empty() {
            return Err(TrackError::NoUsableSamples);
        }

        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(TrackSeries { samples })
    }

    #[allow(dead_code)]
    pub fn from_samples(mut samples: Vec<GeoSample>) -> TrackSeries {
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        TrackSeries { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// First and last timestamps covered, or `None` for an empty series.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some((first.timestamp, last.timestamp))
    }

    /// Position at `time`, interpolated between the bracketing samples.
    ///
    /// Returns `None` outside the recorded span. Coordinates interpolate as
    /// plain numbers, so a track hopping the antimeridian sweeps the long
    /// way around.
    pub fn locate(&self, time: DateTime<Utc>) -> Option<GeoSample> {
        let (start, end) = self.span()?;
        if time < start || time > end {
            return None;
        }

        let index = self
            .samples
            .partition_point(|sample| sample.timestamp < time);
        let after = &self.samples[index];
        if after.timestamp == time {
            return Some(*after);
        }

        // In range and not an exact hit, so a strictly-earlier sample exists.
        let before = &self.samples[index - 1];
        Some(interpolate(before, after, time))
    }
}

fn interpolate(before: &GeoSample, after: &GeoSample, time: DateTime<Utc>) -> GeoSample {
    let span = elapsed_seconds(before.timestamp, after.timestamp);
    if span < MIN_BRACKET_SECONDS {
        return *before;
    }

    let ratio = elapsed_seconds(before.timestamp, time) / span;
    let elevation = match (before.elevation, after.elevation) {
        (Some(a), Some(b)) => Some(a + (b - a) * ratio),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    GeoSample {
        timestamp: time,
        latitude: before.latitude + (after.latitude - before.latitude) * ratio,
        longitude: before.longitude + (after.longitude - before.longitude) * ratio,
        elevation,
    }
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        // Spans past ~292k years lose the sub-second part.
        None => delta.num_seconds() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample(secs: i64, latitude: f64, longitude: f64, elevation: Option<f64>) -> GeoSample {
        GeoSample {
            timestamp: at(secs),
            latitude,
            longitude,
            elevation,
        }
    }

    fn record(secs: i64, latitude: f64, longitude: f64) -> RawPoint {
        RawPoint {
            latitude: Some(RawValue::Number(latitude)),
            longitude: Some(RawValue::Number(longitude)),
            elevation: None,
            timestamp: Some(at(secs).to_rfc3339()),
        }
    }

    #[test]
    fn test_parse_point_accepts_text_fields() {
        let point = RawPoint {
            latitude: Some(RawValue::Text("48.2".into())),
            longitude: Some(RawValue::Text("16.37".into())),
            elevation: Some(RawValue::Text("171".into())),
            timestamp: Some("2024-06-01T12:00:00Z".into()),
        };
        let sample = parse_point(&point).unwrap();
        assert_eq!(sample.latitude, 48.2);
        assert_eq!(sample.longitude, 16.37);
        assert_eq!(sample.elevation, Some(171.0));
    }

    #[test]
    fn test_parse_point_accepts_numeric_fields() {
        let sample = parse_point(&record(0, 10.0, 20.0)).unwrap();
        assert_eq!(sample.latitude, 10.0);
        assert_eq!(sample.longitude, 20.0);
        assert_eq!(sample.elevation, None);
    }

    #[test]
    fn test_parse_point_is_idempotent() {
        let point = RawPoint {
            latitude: Some(RawValue::Text("48.2".into())),
            longitude: Some(RawValue::Number(16.37)),
            elevation: Some(RawValue::Text("171.5".into())),
            timestamp: Some("2024:06:01 12:30:45".into()),
        };
        assert_eq!(parse_point(&point).unwrap(), parse_point(&point).unwrap());
    }

    #[test]
    fn test_parse_point_rejects_missing_timestamp() {
        let mut point = record(0, 10.0, 20.0);
        point.timestamp = None;
        assert!(matches!(
            parse_point(&point),
            Err(TrackError::MissingField("timestamp"))
        ));
    }

    #[test]
    fn test_parse_point_rejects_missing_coordinate() {
        let mut point = record(0, 10.0, 20.0);
        point.longitude = None;
        assert!(matches!(
            parse_point(&point),
            Err(TrackError::MissingField("longitude"))
        ));
    }

    #[test]
    fn test_parse_point_rejects_non_finite_coordinate() {
        let mut point = record(0, 10.0, 20.0);
        point.latitude = Some(RawValue::Text("NaN".into()));
        assert!(matches!(
            parse_point(&point),
            Err(TrackError::Coordinate { field: "latitude", .. })
        ));

        point.latitude = Some(RawValue::Number(f64::INFINITY));
        assert!(matches!(
            parse_point(&point),
            Err(TrackError::Coordinate { field: "latitude", .. })
        ));
    }

    #[test]
    fn test_parse_point_degrades_bad_elevation_to_none() {
        let mut point = record(0, 10.0, 20.0);
        point.elevation = Some(RawValue::Text("n/a".into()));
        let sample = parse_point(&point).unwrap();
        assert_eq!(sample.elevation, None);
    }

    #[test]
    fn test_usable_count_skips_broken_records() {
        let mut broken = record(5, 1.0, 2.0);
        broken.timestamp = Some("garbage".into());
        let points = vec![record(0, 1.0, 2.0), broken, record(10, 3.0, 4.0)];
        assert_eq!(usable_count(&points), 2);
    }

    #[test]
    fn test_build_merges_sources_in_time_order() {
        let first = vec![record(30, 1.0, 1.0), record(10, 2.0, 2.0)];
        let second = vec![record(20, 3.0, 3.0), record(40, 4.0, 4.0)];
        let series = TrackSeries::build(&[first, second]).unwrap();

        assert_eq!(series.len(), 4);
        for pair in series.samples.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_build_drops_broken_records_but_keeps_the_rest() {
        let mut broken = record(5, 1.0, 2.0);
        broken.latitude = None;
        let series = TrackSeries::build(&[vec![record(0, 1.0, 2.0), broken]]).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_build_fails_with_no_sources() {
        assert!(matches!(
            TrackSeries::build(&[]),
            Err(TrackError::NoUsableSamples)
        ));
    }

    #[test]
    fn test_build_fails_when_nothing_survives() {
        let mut broken = record(0, 1.0, 2.0);
        broken.timestamp = Some("garbage".into());
        assert!(matches!(
            TrackSeries::build(&[vec![broken]]),
            Err(TrackError::NoUsableSamples)
        ));
    }

    #[test]
    fn test_locate_on_empty_series() {
        let series = TrackSeries::from_samples(vec![]);
        assert_eq!(series.locate(at(0)), None);
    }

    #[test]
    fn test_locate_outside_span() {
        let series = TrackSeries::from_samples(vec![
            sample(10, 1.0, 1.0, None),
            sample(20, 2.0, 2.0, None),
        ]);
        assert_eq!(series.locate(at(9)), None);
        assert_eq!(series.locate(at(21)), None);
        assert!(series.locate(at(10)).is_some());
        assert!(series.locate(at(20)).is_some());
    }

    #[test]
    fn test_locate_exact_match_returns_sample_unchanged() {
        let exact = sample(10, 1.5, 2.5, Some(30.0));
        let series = TrackSeries::from_samples(vec![
            sample(0, 0.0, 0.0, None),
            exact,
            sample(20, 9.0, 9.0, None),
        ]);
        assert_eq!(series.locate(at(10)), Some(exact));
    }

    #[test]
    fn test_locate_exact_match_prefers_first_duplicate() {
        let first = sample(10, 1.0, 1.0, None);
        let second = sample(10, 5.0, 5.0, None);
        let series = TrackSeries::from_samples(vec![sample(0, 0.0, 0.0, None), first, second]);
        assert_eq!(series.locate(at(10)), Some(first));
    }

    #[test]
    fn test_locate_interpolates_between_brackets() {
        let series = TrackSeries::from_samples(vec![
            sample(0, 0.0, 0.0, Some(0.0)),
            sample(10, 10.0, 20.0, Some(100.0)),
        ]);
        let found = series.locate(at(5)).unwrap();
        assert_eq!(found.timestamp, at(5));
        assert_eq!(found.latitude, 5.0);
        assert_eq!(found.longitude, 10.0);
        assert_eq!(found.elevation, Some(50.0));
    }

    #[test]
    fn test_locate_elevation_falls_back_to_known_side() {
        let series = TrackSeries::from_samples(vec![
            sample(0, 0.0, 0.0, None),
            sample(10, 10.0, 10.0, Some(50.0)),
        ]);
        assert_eq!(series.locate(at(5)).unwrap().elevation, Some(50.0));

        let series = TrackSeries::from_samples(vec![
            sample(0, 0.0, 0.0, None),
            sample(10, 10.0, 10.0, None),
        ]);
        assert_eq!(series.locate(at(5)).unwrap().elevation, None);
    }

    #[test]
    fn test_locate_degenerate_bracket_returns_earlier_sample() {
        let before = GeoSample {
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            latitude: 1.0,
            longitude: 1.0,
            elevation: None,
        };
        let after = GeoSample {
            timestamp: DateTime::from_timestamp(0, 800).unwrap(),
            latitude: 2.0,
            longitude: 2.0,
            elevation: None,
        };
        let series = TrackSeries::from_samples(vec![before, after]);
        let query = DateTime::from_timestamp(0, 400).unwrap();
        assert_eq!(series.locate(query), Some(before));
    }

    #[test]
    fn test_from_samples_sorts() {
        let series = TrackSeries::from_samples(vec![
            sample(20, 2.0, 2.0, None),
            sample(0, 0.0, 0.0, None),
            sample(10, 1.0, 1.0, None),
        ]);
        let found = series.locate(at(5)).unwrap();
        assert_eq!(found.latitude, 0.5);
    }

    #[test]
    fn test_locate_from_multiple_threads() {
        let series = TrackSeries::from_samples(vec![
            sample(0, 0.0, 0.0, None),
            sample(100, 10.0, 10.0, None),
        ]);
        let series = &series;

        std::thread::scope(|scope| {
            for offset in 0..4 {
                scope.spawn(move || {
                    for step in 0..25 {
                        let t = at(offset * 25 + step);
                        assert!(series.locate(t).is_some());
                    }
                });
            }
        });
    }
}
