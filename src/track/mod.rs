mod error;
mod raw;
mod sample;
mod series;
mod timestamp;

pub use error::TrackError;
pub use raw::{RawPoint, RawValue};
pub use sample::GeoSample;
pub use series::{parse_point, usable_count, TrackSeries};
pub use timestamp::parse_timestamp;
