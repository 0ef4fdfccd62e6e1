use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::path::LinePath;
use crate::poi::PointOfInterest;
use crate::projection::ProjectionMethod;
use crate::reference::ReferencePoint;

/// Everything one ingest produced against one reference point. Read-only;
/// rebuilding makes a new set with a new id.
#[derive(Debug, Clone, Serialize)]
pub struct SpatialSet {
    id: Uuid,
    name: String,
    lines_name: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<String>,
    reference: ReferencePoint,
    method: ProjectionMethod,
    points: Vec<PointOfInterest>,
    lines: Vec<LinePath>,
}

impl SpatialSet {
    pub(crate) fn new(
        name: String,
        lines_name: String,
        zone: Option<String>,
        reference: ReferencePoint,
        method: ProjectionMethod,
        points: Vec<PointOfInterest>,
        lines: Vec<LinePath>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            lines_name,
            created_at: Utc::now(),
            zone,
            reference,
            method,
            points,
            lines,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines_name(&self) -> &str {
        &self.lines_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn reference(&self) -> &ReferencePoint {
        &self.reference
    }

    pub fn method(&self) -> ProjectionMethod {
        self.method
    }

    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }

    pub fn lines(&self) -> &[LinePath] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.lines.is_empty()
    }

    pub fn point_named(&self, name: &str) -> Option<&PointOfInterest> {
        self.points.iter().find(|p| p.name() == name)
    }
}
