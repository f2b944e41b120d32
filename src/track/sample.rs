use chrono::{DateTime, Utc};
use serde::Serialize;

/// One track observation: where the subject was at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}
