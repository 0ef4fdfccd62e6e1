use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde_json::Value;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use walkdir::WalkDir;

use geoset::{
    GeoCoordinate, IngestReport, PipelineConfig, ProjectionMethod, ReferencePoint, Session,
};

const OUTPUT_SUFFIX: &str = ".set.json";

/// Which survey schema an input file uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Schema {
    /// Decide from the JSON shape.
    Auto,
    /// `{zone, conduits[], manholes[]}`.
    Survey,
    /// List of `{id, name, gps_coordinates, directions, notes}`.
    Enclosures,
    /// Bare list of manhole-shaped `{id, mid, Latitude, Longitude}` records.
    Points,
    /// Placement log `{"points": [{latitude, longitude, altitude}]}`.
    Markers,
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Schema::Auto => "auto",
            Schema::Survey => "survey",
            Schema::Enclosures => "enclosures",
            Schema::Points => "points",
            Schema::Markers => "markers",
        };

        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Projection {
    Equirectangular,
    GridDifference,
}

impl From<Projection> for ProjectionMethod {
    fn from(p: Projection) -> Self {
        match p {
            Projection::Equirectangular => ProjectionMethod::Equirectangular,
            Projection::GridDifference => ProjectionMethod::GridDifference,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "survey2set", version)]
struct Args {
    /// Survey JSON files, or directories to search for `*.json`.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, env = "SURVEY2SET_OUTPUT_DIR", default_value = "sets")]
    output_dir: String,

    #[arg(long, env = "SURVEY2SET_OVERWRITE", default_value_t = false)]
    overwrite: bool,

    /// Either auto-detect or force the input schema.
    #[arg(long, env = "SURVEY2SET_SCHEMA", value_enum, default_value_t = Schema::Auto)]
    schema: Schema,

    /// Pipeline configuration JSON (radii, asset handles, line style, ...).
    #[arg(long, env = "SURVEY2SET_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the projection named in the config file.
    #[arg(long, env = "SURVEY2SET_PROJECTION", value_enum)]
    projection: Option<Projection>,

    /// Explicit origin latitude; otherwise taken from each input.
    #[arg(
        long,
        env = "SURVEY2SET_REFERENCE_LAT",
        requires = "reference_lon",
        allow_negative_numbers = true
    )]
    reference_lat: Option<f64>,

    #[arg(
        long,
        env = "SURVEY2SET_REFERENCE_LON",
        requires = "reference_lat",
        allow_negative_numbers = true
    )]
    reference_lon: Option<f64>,

    #[arg(
        long,
        env = "SURVEY2SET_REFERENCE_ALT",
        requires = "reference_lat",
        allow_negative_numbers = true
    )]
    reference_alt: Option<f64>,

    /// Name for the POI collection of every produced set.
    #[arg(long, env = "SURVEY2SET_NAME")]
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Written,
    Skipped,
}

/// Config file first, then command-line overrides.
fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PipelineConfig::from_json_str(&text)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(projection) = args.projection {
        config.projection = projection.into();
    }

    if let (Some(lat), Some(lon)) = (args.reference_lat, args.reference_lon) {
        let mut coordinate = GeoCoordinate::new(lat, lon)
            .context("invalid --reference-lat/--reference-lon")?;
        if let Some(alt) = args.reference_alt {
            coordinate = coordinate.with_altitude(alt);
        }
        config.reference = Some(ReferencePoint::new(coordinate));
    }

    if let Some(name) = &args.name {
        config.set_name = name.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Expand directories into the `*.json` files below them, skipping our own outputs.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_survey_file(path))
            .collect();

        found.sort();
        files.extend(found);
    }

    files
}

fn is_survey_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    name.ends_with(".json") && !name.ends_with(OUTPUT_SUFFIX)
}

fn output_path_for(input: &Path, output_dir: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .with_context(|| format!("{} has no file name", input.display()))?
        .to_string_lossy();

    Ok(Path::new(output_dir).join(format!("{}{}", stem, OUTPUT_SUFFIX)))
}

fn first_record(list: &[Value]) -> Option<&serde_json::Map<String, Value>> {
    list.iter().find_map(Value::as_object)
}

fn detect_record(record: &serde_json::Map<String, Value>) -> Schema {
    if record.contains_key("gps_coordinates") {
        Schema::Enclosures
    } else if record.contains_key("Latitude") || record.contains_key("mid") {
        Schema::Points
    } else if record.contains_key("latitude") || record.contains_key("altitude") {
        Schema::Markers
    } else {
        Schema::Points
    }
}

/// Guess the schema from the JSON shape. `None` if the text is not JSON or the
/// shape matches nothing.
fn detect_schema(text: &str) -> Option<Schema> {
    let value: Value = serde_json::from_str(text).ok()?;

    match &value {
        Value::Object(map) => {
            if ["zone", "conduits", "manholes"]
                .iter()
                .any(|key| map.contains_key(*key))
            {
                return Some(Schema::Survey);
            }

            if map.contains_key("enclosures") {
                return Some(Schema::Enclosures);
            }

            match map.get("points") {
                Some(Value::Array(list)) => {
                    Some(first_record(list).map_or(Schema::Markers, detect_record))
                }
                _ => None,
            }
        }
        Value::Array(list) => Some(first_record(list).map_or(Schema::Points, detect_record)),
        _ => None,
    }
}

fn ingest(session: &mut Session, schema: Schema, text: &str) -> geoset::Result<IngestReport> {
    match schema {
        Schema::Survey | Schema::Auto => session.ingest_survey(text),
        Schema::Enclosures => session.ingest_enclosures(text),
        Schema::Points => session.ingest_point_list(text),
        Schema::Markers => session.ingest_markers(text),
    }
}

fn process_one(path: &Path, args: &Args, config: &PipelineConfig) -> Result<Outcome> {
    let out_path = output_path_for(path, &args.output_dir)?;

    if out_path.exists() && !args.overwrite {
        debug!("Skipping existing file: {}", out_path.display());
        return Ok(Outcome::Skipped);
    }

    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let schema = match args.schema {
        Schema::Auto => detect_schema(&text).unwrap_or_else(|| {
            debug!("{}: no schema recognised, trying survey", path.display());
            Schema::Survey
        }),
        forced => forced,
    };

    info!(
        "Processing {} ({}) -> {}",
        path.display(),
        schema,
        out_path.display()
    );

    // One session per file: each input gets its own origin unless one was configured.
    let mut session = Session::new(config.clone());
    let report = ingest(&mut session, schema, &text)
        .with_context(|| format!("building set from {}", path.display()))?;

    if report.has_warnings() {
        warn!(
            "{}: {} record(s) skipped or degraded",
            path.display(),
            report.diagnostics.len()
        );
    }

    let file = File::create(&out_path)
        .with_context(|| format!("creating {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &report.set)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(Outcome::Written)
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating output dir {}", args.output_dir))?;

    let inputs = collect_inputs(&args.inputs);
    if inputs.is_empty() {
        bail!("no survey JSON files found in the given inputs");
    }

    info!("Processing {} inputs...", inputs.len());
    let started = Instant::now();

    // Each file is independent; failures are logged and counted, not fatal to the rest.
    let outcomes: Vec<Option<Outcome>> = inputs
        .par_iter()
        .map(|path| match process_one(path, &args, &config) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!("Error processing {}: {:#}", path.display(), err);
                None
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.is_none()).count();
    let written = outcomes
        .iter()
        .filter(|o| **o == Some(Outcome::Written))
        .count();

    info!(
        "Done in {:.2?}: {} written, {} skipped, {} failed",
        started.elapsed(),
        written,
        inputs.len() - written - failed,
        failed
    );

    if failed > 0 {
        bail!("{} of {} inputs failed", failed, inputs.len());
    }

    Ok(())
}
