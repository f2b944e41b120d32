use std::fmt;

/// A field value as it came off the wire: text, or already typed by the
/// producer. Resolved exactly once, at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

impl RawValue {
    /// Numeric view of the value, rejecting NaN and infinities.
    pub fn as_finite_f64(&self) -> Option<f64> {
        let value = match self {
            RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
            RawValue::Number(value) => *value,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(text) => f.write_str(text),
            RawValue::Number(value) => write!(f, "{}", value),
        }
    }
}

/// One record straight from a track source, nothing checked yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPoint {
    pub latitude: Option<RawValue>,
    pub longitude: Option<RawValue>,
    pub elevation: Option<RawValue>,
    pub timestamp: Option<String>,
}
