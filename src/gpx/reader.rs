use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::track::{usable_count, RawPoint, RawValue};

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("malformed document: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Where point elements live in a document.
#[derive(Debug, Clone, Copy)]
pub enum Extraction {
    /// `<trkpt>` elements of a recorded track.
    TrackPoints,
    /// `<rtept>` elements of a planned route.
    RoutePoints,
    /// Bare `<wpt>` waypoints.
    Waypoints,
}

impl Extraction {
    fn element(self) -> &'static [u8] {
        match self {
            Extraction::TrackPoints => b"trkpt",
            Extraction::RoutePoints => b"rtept",
            Extraction::Waypoints => b"wpt",
        }
    }
}

const STRATEGIES: [Extraction; 3] = [
    Extraction::TrackPoints,
    Extraction::RoutePoints,
    Extraction::Waypoints,
];

// Child elements of a point that carry fields we keep.
enum Child {
    Elevation,
    Time,
}

impl Child {
    fn of(name: &[u8]) -> Option<Child> {
        match name {
            b"ele" => Some(Child::Elevation),
            b"time" => Some(Child::Time),
            _ => None,
        }
    }
}

/// Pulls raw point records out of a GPX document.
///
/// Every extraction strategy runs and the one whose records would best
/// survive ingestion wins, so a document with an unusable track section
/// can still fall back to its routes or waypoints.
pub fn extract_points(doc: &str) -> Result<Vec<RawPoint>, GpxError> {
    let mut best: Option<(usize, Vec<RawPoint>)> = None;

    for strategy in STRATEGIES {
        let candidate = extract_with(doc, strategy)?;
        let usable = usable_count(&candidate);
        debug!(
            "{:?}: {} records, {} usable",
            strategy,
            candidate.len(),
            usable
        );

        let better = match &best {
            Some((best_usable, best_points)) => {
                usable > *best_usable
                    || (usable == *best_usable && candidate.len() > best_points.len())
            }
            None => true,
        };
        if better {
            best = Some((usable, candidate));
        }
    }

    Ok(best.map(|(_, points)| points).unwrap_or_default())
}

/// Collects every element the strategy targets into a raw record.
///
/// Elements are matched by local name, so namespace-prefixed documents
/// are accepted.
pub fn extract_with(doc: &str, strategy: Extraction) -> Result<Vec<RawPoint>, GpxError> {
    let target = strategy.element();
    let mut reader = Reader::from_str(doc);

    let mut points = Vec::new();
    let mut current: Option<RawPoint> = None;
    let mut capture: Option<Child> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == target => {
                current = Some(point_from_attributes(e));
            }
            Event::Empty(ref e) if e.local_name().as_ref() == target => {
                points.push(point_from_attributes(e));
            }
            Event::Start(ref e) if current.is_some() => {
                capture = Child::of(e.local_name().as_ref());
                text.clear();
            }
            Event::Text(ref e) => {
                if capture.is_some() {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == target => {
                if let Some(point) = current.take() {
                    points.push(point);
                }
                capture = None;
            }
            Event::End(_) => {
                if let (Some(point), Some(child)) = (current.as_mut(), capture.take()) {
                    match child {
                        Child::Elevation => point.elevation = Some(raw_value(text.trim())),
                        Child::Time => point.timestamp = Some(text.trim().to_string()),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(points)
}

fn point_from_attributes(element: &BytesStart) -> RawPoint {
    let mut point = RawPoint::default();

    for attribute in element.attributes().flatten() {
        let value = match attribute.unescape_value() {
            Ok(value) => value,
            // A broken attribute reads as a missing field.
            Err(_) => continue,
        };
        match attribute.key.local_name().as_ref() {
            b"lat" => point.latitude = Some(raw_value(&value)),
            b"lon" => point.longitude = Some(raw_value(&value)),
            _ => {}
        }
    }

    point
}

// Numeric-looking text comes through typed; anything else stays text.
fn raw_value(text: &str) -> RawValue {
    match text.parse::<f64>() {
        Ok(value) => RawValue::Number(value),
        Err(_) => RawValue::Text(text.to_string()),
    }
}
