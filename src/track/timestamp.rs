use chrono::{DateTime, NaiveDateTime, Utc};

use crate::track::error::TrackError;

// Zone-less layouts tried in order after RFC 3339 fails. Naive times
// are taken as UTC; the EXIF colon-date forms carry no sub-second part.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M",
];

/// Parses a timestamp in any accepted layout into UTC.
///
/// Zoned inputs are converted; naive ones are assumed to already be UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TrackError> {
    let text = text.trim();

    if let Ok(zoned) = DateTime::parse_from_rfc3339(text) {
        return Ok(zoned.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(TrackError::Timestamp(text.to_string()))
}
