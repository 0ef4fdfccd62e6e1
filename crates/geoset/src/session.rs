//! One processing session: a configuration plus the reference slot every set
//! built in the session is projected against.

use log::info;

use crate::config::PipelineConfig;
use crate::error::{Diagnostic, GeoSetError, Result};
use crate::path::{assemble_path, LinePath};
use crate::poi::{assemble_conduit_points, assemble_point, PointOfInterest};
use crate::projection::Projector;
use crate::records;
use crate::reference::{ReferencePoint, ReferenceSlot};
use crate::set::SpatialSet;
use crate::validate::{self, FeatureKind, ValidatedBatch};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A built set and the recoverable problems found while building it.
#[derive(Debug)]
pub struct IngestReport {
    pub set: SpatialSet,
    pub diagnostics: Vec<Diagnostic>,
}

impl IngestReport {
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == crate::error::Severity::Warning)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    config: PipelineConfig,
    reference: ReferenceSlot,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Session {
    /// A configured `reference` starts the session with an explicit origin.
    pub fn new(config: PipelineConfig) -> Self {
        let reference = match config.reference {
            Some(point) => ReferenceSlot::explicit(point),
            None => ReferenceSlot::Unset,
        };

        Self { config, reference }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceSlot {
        &self.reference
    }

    pub fn set_reference(&mut self, point: ReferencePoint) -> Result<()> {
        self.reference.set(point)
    }

    /// Drop the current origin. Sets already built keep their own copy.
    pub fn reset_reference(&mut self) {
        self.reference.reset();
    }

    pub fn resolve_reference(&mut self, batch: &ValidatedBatch) -> Result<ReferencePoint> {
        self.reference.resolve(batch)
    }

    pub fn projector(&self) -> Result<Projector> {
        self.projector_for(&self.reference)
    }

    fn projector_for(&self, slot: &ReferenceSlot) -> Result<Projector> {
        let reference = slot.point().ok_or(GeoSetError::MissingReference)?;
        Projector::new(self.config.projection, *reference)
    }

    pub fn ingest_survey(&mut self, text: &str) -> Result<IngestReport> {
        let doc = records::parse_survey(text)?;
        self.ingest(validate::validate_survey(&doc))
    }

    pub fn ingest_enclosures(&mut self, text: &str) -> Result<IngestReport> {
        let list = records::parse_enclosures(text)?;
        self.ingest(validate::validate_enclosures(&list))
    }

    pub fn ingest_point_list(&mut self, text: &str) -> Result<IngestReport> {
        let list = records::parse_point_list(text)?;
        self.ingest(validate::validate_point_list(&list))
    }

    pub fn ingest_markers(&mut self, text: &str) -> Result<IngestReport> {
        let list = records::parse_markers(text)?;
        self.ingest(validate::validate_markers(&list))
    }

    /// Resolve the origin if needed, project the batch, and freeze the origin.
    /// The session's slot only changes once the set has been built.
    pub fn ingest(&mut self, batch: ValidatedBatch) -> Result<IngestReport> {
        let mut slot = self.reference;
        slot.resolve(&batch)?;

        let report = self.build(&slot, batch)?;
        slot.freeze();
        self.reference = slot;

        info!(
            "Built set '{}' ({}): {} POIs, {} lines, {} diagnostics",
            report.set.name(),
            report.set.method(),
            report.set.points().len(),
            report.set.lines().len(),
            report.diagnostics.len()
        );

        Ok(report)
    }

    fn build(&self, slot: &ReferenceSlot, batch: ValidatedBatch) -> Result<IngestReport> {
        let projector = self.projector_for(slot)?;
        let ValidatedBatch {
            zone,
            points: features,
            conduits,
            mut diagnostics,
            ..
        } = batch;

        #[cfg(feature = "parallel")]
        let feature_iter = features.par_iter();
        #[cfg(not(feature = "parallel"))]
        let feature_iter = features.iter();

        let assembled: Vec<Result<PointOfInterest>> = feature_iter
            .map(|p| {
                assemble_point(p, &projector, self.config.defaults_for(p.kind))
                    .map_err(|err| err.with_subject(p.label.as_str()))
            })
            .collect();

        // A point that cannot be projected is dropped like any other invalid record.
        let mut points = Vec::with_capacity(assembled.len());
        for result in assembled {
            match result {
                Ok(poi) => points.push(poi),
                Err(err) => diagnostics.push(Diagnostic::warning(err)),
            }
        }

        let conduit_defaults = self.config.defaults_for(FeatureKind::Conduit);
        let mut lines: Vec<LinePath> = Vec::with_capacity(conduits.len());
        for conduit in &conduits {
            let path = match assemble_path(conduit, &projector, self.config.line_style) {
                Ok(path) => path,
                Err(err) => {
                    let subject = format!("conduit {}", conduit.name);
                    diagnostics.push(Diagnostic::warning(err.with_subject(subject)));
                    continue;
                }
            };

            points.extend(assemble_conduit_points(
                conduit,
                &projector,
                conduit_defaults,
                &mut diagnostics,
            )?);
            lines.push(path);
        }

        let set = SpatialSet::new(
            self.config.set_name.clone(),
            self.config.line_set_name.clone(),
            zone,
            *projector.reference(),
            projector.method(),
            points,
            lines,
        );

        Ok(IngestReport { set, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoordinateField, Severity};
    use crate::projection::{GeoCoordinate, LocalPosition, ProjectionMethod};
    use crate::reference::ReferenceSource;

    const SCENARIO: &str = r#"{
        "zone": "Donnelly",
        "manholes": [
            {"id": "1", "mid": "MH-1", "description": "Vault", "Latitude": "41.7212", "Longitude": "-73.9325"}
        ],
        "conduits": [{
            "name": "Line A",
            "description": "Fiber trunk",
            "id": 4,
            "segment": [
                {"lat": "41.7213", "lng": "-73.9324", "notes": "a"},
                {"lat": "41.7214", "lng": "-73.9323", "notes": "b"},
                {"lat": "41.7215", "lng": "-73.9322", "notes": "c"},
                {"lat": "41.7216", "lng": "-73.9321", "notes": "d"}
            ]
        }]
    }"#;

    fn survey_with_segments(n: usize) -> String {
        let segments: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"lat": {}, "lng": -73.9}}"#, 41.7 + 0.0001 * i as f64))
            .collect();
        format!(
            r#"{{"conduits": [{{"name": "L", "segment": [{}]}}]}}"#,
            segments.join(",")
        )
    }

    #[test]
    fn scenario_manhole_and_line() {
        let mut session = Session::default();
        let report = session.ingest_survey(SCENARIO).unwrap();
        let set = &report.set;

        assert_eq!(set.points().len(), 4);
        assert_eq!(set.lines().len(), 1);
        assert_eq!(set.lines()[0].vertices().len(), 4);
        assert_eq!(set.zone(), Some("Donnelly"));

        let reference = set.reference();
        assert_eq!((reference.latitude(), reference.longitude()), (41.7212, -73.9325));
        assert_eq!(session.reference().source(), Some(ReferenceSource::FirstPoint));

        let manhole = set.point_named("Manhole MH-1").unwrap();
        assert_eq!(manhole.position(), LocalPosition::ORIGIN);
        assert!(set.point_named("Line A Start").is_some());
        assert!(set.point_named("Line A Midpoint").is_some());
        assert!(set.point_named("Line A End").is_some());
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn malformed_latitude_drops_one_manhole() {
        let mut session = Session::default();
        let report = session
            .ingest_survey(
                r#"{"manholes": [
                    {"mid": "1", "Latitude": "abc", "Longitude": "-73.93"},
                    {"mid": "2", "Latitude": "41.72", "Longitude": "-73.93"}
                ]}"#,
            )
            .unwrap();

        let names: Vec<_> = report.set.points().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Manhole 2"]);
        assert!(report.has_warnings());
        assert!(matches!(
            report.diagnostics[0].error,
            GeoSetError::InvalidCoordinate {
                field: CoordinateField::Latitude,
                ..
            }
        ));
        assert_eq!(report.set.reference().latitude(), 41.72);
    }

    #[test]
    fn segment_count_decides_output() {
        for (segments, pois, lines) in [(2, 2, 1), (3, 3, 1), (5, 3, 1)] {
            let mut session = Session::default();
            let report = session.ingest_survey(&survey_with_segments(segments)).unwrap();
            assert_eq!(report.set.points().len(), pois, "{segments} segments");
            assert_eq!(report.set.lines().len(), lines, "{segments} segments");
            assert_eq!(report.set.lines()[0].vertices().len(), segments);
        }

        let mut session = Session::default();
        let report = session.ingest_survey(&survey_with_segments(2)).unwrap();
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Info));
    }

    #[test]
    fn empty_conduit_alone_has_no_reference() {
        let mut session = Session::default();
        let err = session
            .ingest_survey(&survey_with_segments(0))
            .unwrap_err();
        assert!(matches!(err, GeoSetError::NoReferenceAvailable));
        assert!(session.reference().point().is_none());
    }

    #[test]
    fn one_segment_conduit_alone_still_sets_the_origin() {
        let mut session = Session::default();
        let report = session.ingest_survey(&survey_with_segments(1)).unwrap();

        assert!(report.set.is_empty());
        assert_eq!(
            (report.set.reference().latitude(), report.set.reference().longitude()),
            (41.7, -73.9)
        );
        assert_eq!(
            session.reference().source(),
            Some(ReferenceSource::FirstConduitSegment)
        );
        assert!(matches!(
            report.diagnostics[0].error,
            GeoSetError::InsufficientPath { valid: 1, .. }
        ));
    }

    #[test]
    fn sparse_first_conduit_wins_the_origin() {
        let mut session = Session::default();
        let report = session
            .ingest_survey(
                r#"{"conduits": [
                    {"name": "Stub", "segment": [{"lat": 41.7, "lng": -73.9}]},
                    {"name": "Full", "segment": [
                        {"lat": 40.0, "lng": -72.0},
                        {"lat": 40.001, "lng": -72.0}
                    ]}
                ]}"#,
            )
            .unwrap();

        let reference = report.set.reference();
        assert_eq!((reference.latitude(), reference.longitude()), (41.7, -73.9));
        assert_eq!(report.set.lines().len(), 1);
        assert_eq!(report.set.lines()[0].name(), "Full");
    }

    #[test]
    fn failed_build_leaves_the_slot_untouched() {
        // Bypasses `PipelineConfig::validate`, so the projector cannot be built.
        let unchecked = ReferencePoint::new(GeoCoordinate {
            latitude: 95.0,
            longitude: 0.0,
            altitude: None,
        });
        let mut session = Session::new(PipelineConfig {
            reference: Some(unchecked),
            ..Default::default()
        });

        assert!(session.ingest_survey(SCENARIO).is_err());
        assert!(!session.reference().is_frozen());

        session.reset_reference();
        assert!(session.ingest_survey("{\"manholes\": 3}").is_err());
        assert_eq!(*session.reference(), ReferenceSlot::Unset);

        let report = session.ingest_survey(SCENARIO).unwrap();
        assert_eq!(report.set.reference().latitude(), 41.7212);
        assert!(session.reference().is_frozen());
    }

    #[test]
    fn point_outside_the_grid_zone_is_dropped() {
        let mut session = Session::new(PipelineConfig {
            projection: ProjectionMethod::GridDifference,
            ..Default::default()
        });
        let report = session
            .ingest_point_list(
                r#"[
                    {"mid": "1", "Latitude": 0.0, "Longitude": 3.0},
                    {"mid": "2", "Latitude": 0.0, "Longitude": 93.0},
                    {"mid": "3", "Latitude": 0.001, "Longitude": 3.001}
                ]"#,
            )
            .unwrap();

        let names: Vec<_> = report.set.points().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Manhole 1", "Manhole 3"]);
        match &report.diagnostics[0].error {
            GeoSetError::InvalidCoordinate { subject, field, .. } => {
                assert_eq!(subject, "Manhole 2");
                assert_eq!(*field, CoordinateField::Longitude);
            }
            other => panic!("unexpected {other}"),
        }

        let json = serde_json::to_string(&report.set).unwrap();
        assert!(!json.contains("null"));
    }

    #[test]
    fn sparse_conduit_is_skipped_next_to_a_manhole() {
        let mut session = Session::default();
        let report = session
            .ingest_survey(
                r#"{"manholes": [{"mid": "1", "Latitude": 41.7, "Longitude": -73.9}],
                    "conduits": [{"name": "Stub", "segment": [{"lat": 41.7, "lng": -73.9}]}]}"#,
            )
            .unwrap();

        assert_eq!(report.set.points().len(), 1);
        assert!(report.set.lines().is_empty());
        assert!(matches!(
            report.diagnostics[0].error,
            GeoSetError::InsufficientPath { valid: 1, .. }
        ));
    }

    #[test]
    fn explicit_reference_wins_and_freezes() {
        let explicit = ReferencePoint::new(GeoCoordinate::new(41.7, -73.9).unwrap());
        let mut session = Session::new(PipelineConfig {
            reference: Some(explicit),
            ..Default::default()
        });

        let report = session.ingest_survey(SCENARIO).unwrap();
        assert_eq!(*report.set.reference(), explicit);
        assert_ne!(
            report.set.point_named("Manhole MH-1").map(|p| p.position()),
            Some(LocalPosition::ORIGIN)
        );

        assert!(session.reference().is_frozen());
        let other = ReferencePoint::new(GeoCoordinate::new(10.0, 10.0).unwrap());
        assert!(matches!(
            session.set_reference(other),
            Err(GeoSetError::ReferenceFrozen)
        ));

        session.reset_reference();
        session.set_reference(other).unwrap();
        assert_eq!(*report.set.reference(), explicit);
    }

    #[test]
    fn later_batches_reuse_the_frozen_origin() {
        let mut session = Session::default();
        let first = session.ingest_survey(SCENARIO).unwrap();
        let second = session
            .ingest_point_list(r#"[{"mid": "9", "Latitude": 41.8, "Longitude": -73.8}]"#)
            .unwrap();

        assert_eq!(first.set.reference(), second.set.reference());
        assert_ne!(first.set.id(), second.set.id());
    }

    #[test]
    fn projector_needs_a_reference() {
        let session = Session::default();
        assert!(matches!(
            session.projector().unwrap_err(),
            GeoSetError::MissingReference
        ));
    }

    #[test]
    fn malformed_document_is_fatal() {
        let mut session = Session::default();
        let err = session.ingest_survey(r#"{"manholes": 3}"#).unwrap_err();
        assert!(err.is_fatal());
        assert!(session.reference().point().is_none());
    }

    #[test]
    fn markers_carry_vertical_offset() {
        let mut session = Session::default();
        let report = session
            .ingest_markers(
                r#"{"points": [
                    {"latitude": 41.7, "longitude": -73.9, "altitude": 10.0},
                    {"latitude": 41.7001, "longitude": -73.9, "altitude": 12.5}
                ]}"#,
            )
            .unwrap();

        let second = report.set.point_named("Marker 2").unwrap();
        assert_eq!(second.kind(), FeatureKind::Marker);
        assert_eq!(second.position().up, 2.5);
        assert!(second.position().north > 10.0);
    }

    #[test]
    fn enclosures_use_their_names() {
        let mut session = Session::new(PipelineConfig {
            projection: ProjectionMethod::GridDifference,
            ..Default::default()
        });
        let report = session
            .ingest_enclosures(
                r#"{"enclosures": [{
                    "id": "E1", "name": "Cabinet 1", "notes": "locked",
                    "gps_coordinates": {"latitude": "41.72", "longitude": "-73.93"}
                }]}"#,
            )
            .unwrap();

        assert_eq!(report.set.method(), ProjectionMethod::GridDifference);
        let poi = &report.set.points()[0];
        assert_eq!(poi.name(), "Cabinet 1");
        assert_eq!(poi.kind(), FeatureKind::Enclosure);
        assert!(poi.position().horizontal_distance() < 1e-6);
    }
}
