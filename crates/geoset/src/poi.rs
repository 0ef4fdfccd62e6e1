use serde::Serialize;

use crate::config::{AssetBindings, FeatureDefaults, PlacementMode};
use crate::error::{Diagnostic, GeoSetError, Result};
use crate::projection::{LocalPosition, Projector};
use crate::records::DirectionalNotes;
use crate::validate::{FeatureKind, ValidConduit, ValidPoint, ValidVertex};

/// Fewest valid segments for a conduit midpoint POI.
pub const MIN_MIDPOINT_SEGMENTS: usize = 3;

/// A located feature ready for placement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointOfInterest {
    name: String,
    description: String,
    kind: FeatureKind,
    position: LocalPosition,
    tracking_radius_m: f64,
    close_tracking_radius_m: f64,
    placement: PlacementMode,
    relative_height_m: f64,
    facing_heading_deg: f64,
    assets: AssetBindings,
    #[serde(skip_serializing_if = "DirectionalNotes::is_empty")]
    directions: DirectionalNotes,
}

impl PointOfInterest {
    fn build(
        name: String,
        description: String,
        kind: FeatureKind,
        position: LocalPosition,
        defaults: &FeatureDefaults,
        directions: DirectionalNotes,
    ) -> Self {
        Self {
            name,
            description,
            kind,
            position,
            tracking_radius_m: defaults.tracking_radius_m,
            close_tracking_radius_m: defaults.close_tracking_radius_m,
            placement: defaults.placement,
            relative_height_m: defaults.relative_height_m,
            facing_heading_deg: defaults.facing_heading_deg,
            assets: defaults.assets.clone(),
            directions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn position(&self) -> LocalPosition {
        self.position
    }

    pub fn tracking_radius_m(&self) -> f64 {
        self.tracking_radius_m
    }

    pub fn close_tracking_radius_m(&self) -> f64 {
        self.close_tracking_radius_m
    }

    pub fn placement(&self) -> PlacementMode {
        self.placement
    }

    pub fn relative_height_m(&self) -> f64 {
        self.relative_height_m
    }

    pub fn facing_heading_deg(&self) -> f64 {
        self.facing_heading_deg
    }

    pub fn assets(&self) -> &AssetBindings {
        &self.assets
    }

    pub fn directions(&self) -> &DirectionalNotes {
        &self.directions
    }
}

/// POI for a validated point feature. Only fails if projection does.
pub fn assemble_point(
    point: &ValidPoint,
    projector: &Projector,
    defaults: &FeatureDefaults,
) -> Result<PointOfInterest> {
    let position = projector.project(&point.coordinate)?;

    Ok(PointOfInterest::build(
        point.label.clone(),
        point.description.clone(),
        point.kind,
        position,
        defaults,
        point.directions.clone(),
    ))
}

fn conduit_description(conduit: &ValidConduit, vertex: &ValidVertex) -> String {
    format!("{}\nNotes: {}", conduit.description, vertex.note)
}

/// Start, Midpoint (three or more vertices) and End POIs for one conduit, in
/// that order. A skipped midpoint is reported as an info diagnostic.
pub fn assemble_conduit_points(
    conduit: &ValidConduit,
    projector: &Projector,
    defaults: &FeatureDefaults,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<PointOfInterest>> {
    let vertices = &conduit.vertices;
    let count = vertices.len();

    let mut picks: Vec<(&str, &ValidVertex)> = Vec::with_capacity(3);
    if let Some(first) = vertices.first() {
        picks.push(("Start", first));
    }
    if count >= MIN_MIDPOINT_SEGMENTS {
        picks.push(("Midpoint", &vertices[count / 2]));
    } else if count > 0 {
        diagnostics.push(Diagnostic::info(GeoSetError::InsufficientPath {
            subject: format!("conduit {}", conduit.name),
            feature: "a midpoint",
            valid: count,
            needed: MIN_MIDPOINT_SEGMENTS,
        }));
    }
    if count >= 2 {
        if let Some(last) = vertices.last() {
            picks.push(("End", last));
        }
    }

    picks
        .into_iter()
        .map(|(role, vertex)| -> Result<PointOfInterest> {
            let position = projector.project(&vertex.coordinate)?;
            Ok(PointOfInterest::build(
                format!("{} {}", conduit.name, role),
                conduit_description(conduit, vertex),
                FeatureKind::Conduit,
                position,
                defaults,
                DirectionalNotes::new(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureTable;
    use crate::projection::{GeoCoordinate, ProjectionMethod};
    use crate::reference::ReferencePoint;

    fn coord(lat: f64, lon: f64) -> GeoCoordinate {
        GeoCoordinate::new(lat, lon).unwrap()
    }

    fn projector() -> Projector {
        Projector::new(
            ProjectionMethod::Equirectangular,
            ReferencePoint::new(coord(41.7212, -73.9325)),
        )
        .unwrap()
    }

    fn conduit(n: usize) -> ValidConduit {
        ValidConduit {
            name: "Line A".into(),
            description: "Fiber trunk".into(),
            id: Some(3),
            vertices: (0..n)
                .map(|i| ValidVertex {
                    index: i,
                    coordinate: coord(41.7212 + 0.0001 * i as f64, -73.9325),
                    note: format!("seg {i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn point_feature_takes_label_and_defaults() {
        let mut directions = DirectionalNotes::new();
        directions.insert("North".into(), vec!["door".into()]);

        let point = ValidPoint {
            kind: FeatureKind::Enclosure,
            id: "E1".into(),
            label: "Cabinet 1".into(),
            description: "locked".into(),
            coordinate: coord(41.7212, -73.9325),
            directions,
        };

        let table = FeatureTable::default();
        let poi = assemble_point(&point, &projector(), &table.enclosure).unwrap();
        assert_eq!(poi.name(), "Cabinet 1");
        assert_eq!(poi.description(), "locked");
        assert_eq!(poi.kind(), FeatureKind::Enclosure);
        assert_eq!(poi.position(), LocalPosition::ORIGIN);
        assert_eq!(poi.tracking_radius_m(), 75.0);
        assert_eq!(poi.close_tracking_radius_m(), 15.0);
        assert_eq!(poi.directions()["North"], ["door"]);
    }

    #[test]
    fn conduit_poi_counts() {
        let defaults = FeatureTable::default().conduit;
        for (n, expected) in [(0, 0), (1, 1), (2, 2), (3, 3), (6, 3)] {
            let mut diagnostics = Vec::new();
            let pois =
                assemble_conduit_points(&conduit(n), &projector(), &defaults, &mut diagnostics)
                    .unwrap();
            assert_eq!(pois.len(), expected, "{n} vertices");
        }
    }

    #[test]
    fn conduit_poi_names_and_notes() {
        let defaults = FeatureTable::default().conduit;
        let mut diagnostics = Vec::new();
        let line = conduit(4);
        let pois = assemble_conduit_points(&line, &projector(), &defaults, &mut diagnostics)
            .unwrap();

        let names: Vec<_> = pois.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Line A Start", "Line A Midpoint", "Line A End"]);
        assert_eq!(pois[0].description(), "Fiber trunk\nNotes: seg 0");
        // count / 2
        assert_eq!(pois[1].description(), "Fiber trunk\nNotes: seg 2");
        assert_eq!(pois[2].description(), "Fiber trunk\nNotes: seg 3");
        assert!(pois.iter().all(|p| p.kind() == FeatureKind::Conduit));
        assert!(diagnostics.is_empty());
        assert!(pois[2].position().north > pois[0].position().north);
    }

    #[test]
    fn two_vertex_conduit_reports_skipped_midpoint() {
        let defaults = FeatureTable::default().conduit;
        let mut diagnostics = Vec::new();
        let pois = assemble_conduit_points(&conduit(2), &projector(), &defaults, &mut diagnostics)
            .unwrap();

        assert_eq!(pois.len(), 2);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, crate::error::Severity::Info);
    }
}
