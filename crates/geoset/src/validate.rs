//! Coordinate validation. Every failure here is per record: the record is
//! dropped, a warning diagnostic is recorded, and the batch carries on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoordinateField, Diagnostic, GeoSetError, Result};
use crate::projection::GeoCoordinate;
use crate::records::{
    ConduitRecord, DirectionalNotes, EnclosureRecord, GeoRecord, MarkerRecord, RawCoordinate,
    SurveyDocument,
};

/// Fewest valid segments that make a path.
pub const MIN_PATH_SEGMENTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Manhole,
    Enclosure,
    Conduit,
    Marker,
}

impl FeatureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FeatureKind::Manhole => "Manhole",
            FeatureKind::Enclosure => "Enclosure",
            FeatureKind::Conduit => "Conduit",
            FeatureKind::Marker => "Marker",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A point feature whose coordinates parsed and passed range checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPoint {
    pub kind: FeatureKind,
    pub id: String,
    /// Display name, e.g. `Manhole MH-7`.
    pub label: String,
    pub description: String,
    pub coordinate: GeoCoordinate,
    pub directions: DirectionalNotes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidVertex {
    /// Position of the segment in the original input list.
    pub index: usize,
    pub coordinate: GeoCoordinate,
    pub note: String,
}

/// A conduit with at least [`MIN_PATH_SEGMENTS`] valid segments, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidConduit {
    pub name: String,
    pub description: String,
    pub id: Option<i64>,
    pub vertices: Vec<ValidVertex>,
}

#[derive(Debug, Default)]
pub struct ValidatedBatch {
    pub zone: Option<String>,
    pub points: Vec<ValidPoint>,
    pub conduits: Vec<ValidConduit>,
    /// First valid segment of any conduit in input order, including conduits
    /// later dropped for having too few segments.
    pub first_segment: Option<GeoCoordinate>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidatedBatch {
    fn keep_point(&mut self, point: Result<ValidPoint>) {
        match point {
            Ok(point) => self.points.push(point),
            Err(err) => self.diagnostics.push(Diagnostic::warning(err)),
        }
    }
}

/// Parse both axes, then range-check. Errors name `subject`.
fn validate_coordinate(
    subject: &str,
    latitude: &RawCoordinate,
    longitude: &RawCoordinate,
) -> Result<GeoCoordinate> {
    let lat = latitude
        .parse()
        .map_err(|reason| GeoSetError::invalid(subject, CoordinateField::Latitude, reason))?;
    let lon = longitude
        .parse()
        .map_err(|reason| GeoSetError::invalid(subject, CoordinateField::Longitude, reason))?;

    GeoCoordinate::new(lat, lon).map_err(|err| err.with_subject(subject))
}

fn manhole_point(record: &GeoRecord, position: usize) -> Result<ValidPoint> {
    let label = if record.label_id().trim().is_empty() {
        format!("{} #{}", FeatureKind::Manhole, position + 1)
    } else {
        format!("{} {}", FeatureKind::Manhole, record.label_id())
    };

    let coordinate = validate_coordinate(&label, &record.latitude, &record.longitude)?;

    Ok(ValidPoint {
        kind: FeatureKind::Manhole,
        id: record.id.clone(),
        label,
        description: record.description.clone(),
        coordinate,
        directions: record.directions.clone(),
    })
}

fn enclosure_point(record: &EnclosureRecord, position: usize) -> Result<ValidPoint> {
    let label = if !record.name.trim().is_empty() {
        record.name.clone()
    } else if !record.id.trim().is_empty() {
        format!("{} {}", FeatureKind::Enclosure, record.id)
    } else {
        format!("{} #{}", FeatureKind::Enclosure, position + 1)
    };

    let coordinate = validate_coordinate(
        &label,
        &record.gps_coordinates.latitude,
        &record.gps_coordinates.longitude,
    )?;

    Ok(ValidPoint {
        kind: FeatureKind::Enclosure,
        id: record.id.clone(),
        label,
        description: record.notes.clone(),
        coordinate,
        directions: record.directions.clone(),
    })
}

fn marker_point(record: &MarkerRecord, position: usize) -> Result<ValidPoint> {
    let label = format!("{} {}", FeatureKind::Marker, position + 1);
    let mut coordinate = validate_coordinate(&label, &record.latitude, &record.longitude)?;

    if !record.altitude.is_missing() {
        let altitude = record
            .altitude
            .parse()
            .map_err(|reason| GeoSetError::invalid(&label, CoordinateField::Altitude, reason))?;
        coordinate = coordinate.with_altitude(altitude);
    }

    Ok(ValidPoint {
        kind: FeatureKind::Marker,
        id: (position + 1).to_string(),
        label,
        description: String::new(),
        coordinate,
        directions: DirectionalNotes::new(),
    })
}

/// Validate every segment; keep the conduit only if enough of them survive.
fn validate_conduit(record: &ConduitRecord, position: usize, batch: &mut ValidatedBatch) {
    let name = if record.name.trim().is_empty() {
        format!("{} #{}", FeatureKind::Conduit, position + 1)
    } else {
        record.name.clone()
    };

    let mut vertices = Vec::with_capacity(record.segments.len());
    for (index, segment) in record.segments.iter().enumerate() {
        let subject = format!("{} segment {}", name, index);
        match validate_coordinate(&subject, &segment.lat, &segment.lng) {
            Ok(coordinate) => vertices.push(ValidVertex {
                index,
                coordinate,
                note: segment.notes.clone(),
            }),
            Err(err) => batch.diagnostics.push(Diagnostic::warning(err)),
        }
    }

    if batch.first_segment.is_none() {
        batch.first_segment = vertices.first().map(|v| v.coordinate);
    }

    if vertices.len() < MIN_PATH_SEGMENTS {
        batch.diagnostics.push(Diagnostic::warning(GeoSetError::InsufficientPath {
            subject: format!("conduit {}", name),
            feature: "a path",
            valid: vertices.len(),
            needed: MIN_PATH_SEGMENTS,
        }));
        return;
    }

    log::debug!(
        "Conduit {}: {}/{} segments valid",
        name,
        vertices.len(),
        record.segments.len()
    );

    batch.conduits.push(ValidConduit {
        name,
        description: record.description.clone(),
        id: record.id,
        vertices,
    });
}

pub fn validate_survey(doc: &SurveyDocument) -> ValidatedBatch {
    let mut batch = ValidatedBatch {
        zone: doc.zone.clone(),
        ..Default::default()
    };

    for (position, record) in doc.manholes.iter().enumerate() {
        batch.keep_point(manhole_point(record, position));
    }

    for (position, record) in doc.conduits.iter().enumerate() {
        validate_conduit(record, position, &mut batch);
    }

    batch
}

pub fn validate_point_list(records: &[GeoRecord]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    for (position, record) in records.iter().enumerate() {
        batch.keep_point(manhole_point(record, position));
    }
    batch
}

pub fn validate_enclosures(records: &[EnclosureRecord]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    for (position, record) in records.iter().enumerate() {
        batch.keep_point(enclosure_point(record, position));
    }
    batch
}

pub fn validate_markers(records: &[MarkerRecord]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    for (position, record) in records.iter().enumerate() {
        batch.keep_point(marker_point(record, position));
    }
    batch
}
