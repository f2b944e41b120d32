mod reader;

pub use reader::{extract_points, extract_with, Extraction, GpxError};
