mod gpx;
mod track;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use log::warn;
use std::fs;
use std::process::ExitCode;

use crate::gpx::extract_points;
use crate::track::{parse_timestamp, usable_count, GeoSample, RawPoint, TrackSeries};

#[derive(Parser)]
#[command(name = "trackfix")]
#[command(about = "Match timestamps against recorded GPS tracks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the usable records and time span of track files
    Info {
        #[arg(required = true)]
        tracks: Vec<String>,
    },
    /// Find the position at a point in time
    Locate {
        /// Query time, in any accepted timestamp layout
        time: String,
        /// Track files to match against
        #[arg(required = true)]
        tracks: Vec<String>,
        /// Clock offset added to the query time, e.g. "90s" or "-2m"
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { tracks } => info(&tracks),
        Commands::Locate {
            time,
            tracks,
            offset,
            json,
        } => locate(&time, &tracks, offset.as_deref(), json),
    }
}

fn info(paths: &[String]) -> ExitCode {
    let sources = load_sources(paths);

    for (path, points) in &sources {
        println!(
            "{}: {} of {} records usable",
            path,
            usable_count(points),
            points.len()
        );
    }

    let lists: Vec<Vec<RawPoint>> = sources.into_iter().map(|(_, points)| points).collect();
    let series = match TrackSeries::build(&lists) {
        Ok(series) => series,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some((start, end)) = series.span() {
        println!(
            "merged: {} samples, {} .. {}",
            series.len(),
            format_time(start),
            format_time(end)
        );
    }

    ExitCode::SUCCESS
}

fn locate(time: &str, paths: &[String], offset: Option<&str>, json: bool) -> ExitCode {
    let mut query = match parse_timestamp(time) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(offset) = offset {
        match parse_offset(offset) {
            Ok(shift) => query = query + shift,
            Err(e) => {
                eprintln!("Invalid offset: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let lists: Vec<Vec<RawPoint>> = load_sources(paths)
        .into_iter()
        .map(|(_, points)| points)
        .collect();
    let series = match TrackSeries::build(&lists) {
        Ok(series) => series,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match series.locate(query) {
        Some(sample) => {
            if json {
                match serde_json::to_string_pretty(&sample) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{}", format_sample(&sample));
            }
            ExitCode::SUCCESS
        }
        None => {
            eprintln!(
                "no match: {} is outside the recorded span",
                format_time(query)
            );
            ExitCode::FAILURE
        }
    }
}

fn load_sources(paths: &[String]) -> Vec<(String, Vec<RawPoint>)> {
    let mut sources = Vec::new();

    for path in paths {
        let doc = match fs::read_to_string(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping {}: {}", path, e);
                continue;
            }
        };
        match extract_points(&doc) {
            Ok(points) => sources.push((path.clone(), points)),
            Err(e) => warn!("Skipping {}: {}", path, e),
        }
    }

    sources
}

// Signed clock offset: "90s", "+1h", "-2m".
fn parse_offset(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let dur = humantime::parse_duration(rest.trim())
        .map_err(|e| e.to_string())
        .and_then(|d| Duration::from_std(d).map_err(|e| e.to_string()))?;

    Ok(if neg { -dur } else { dur })
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn format_sample(sample: &GeoSample) -> String {
    let elevation = match sample.elevation {
        Some(meters) => format!(" ele {:.1}m", meters),
        None => String::new(),
    };
    format!(
        "{} lat {:.7} lon {:.7}{}",
        format_time(sample.timestamp),
        sample.latitude,
        sample.longitude,
        elevation
    )
}
