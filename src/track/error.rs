use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("unparseable timestamp: {0}")]
    Timestamp(String),
    #[error("record missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {value}")]
    Coordinate { field: &'static str, value: String },
    #[error("no usable track samples")]
    NoUsableSamples,
}
