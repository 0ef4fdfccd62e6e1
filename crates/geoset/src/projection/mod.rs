//! Geographic -> local tangent-plane projection.
//!
//! Two strategies sit behind [`ProjectionMethod`]; they are not numerically
//! interchangeable, so a set records which one produced it.
//!
//! - `Equirectangular`: small-angle approximation on a sphere of radius
//!   [`EARTH_RADIUS_M`]. Site-scale baselines only; error grows with distance from
//!   the reference and towards the poles.
//! - `GridDifference`: both points projected into the UTM zone of the reference,
//!   local offset = difference of grid coordinates.
//!
//! Local axes: east -> first, north -> second, vertical carried separately as
//! `target.altitude - reference.altitude` (missing altitude counts as 0).

pub mod utm;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoordinateField, GeoSetError, Result};
use crate::reference::ReferencePoint;
use utm::{UtmCoordinate, UtmZone};

pub mod wgs84 {
    /// Semi-major axis (equatorial radius) in meters.
    pub const A: f64 = 6_378_137.0;

    /// Flattening factor (1 / 298.257223563).
    pub const F: f64 = 1.0 / 298.257_223_563;

    /// First eccentricity squared.
    pub const E2: f64 = F * (2.0 - F);
}

/// Sphere radius used by the equirectangular approximation.
pub const EARTH_RADIUS_M: f64 = wgs84::A;

/// Targets this far (or farther) in longitude from the grid zone's central
/// meridian cannot be projected into that zone.
pub const MAX_GRID_MERIDIAN_OFFSET_DEG: f64 = 90.0;

/// A validated geographic coordinate in degrees; altitude in meters when known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl GeoCoordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range degrees.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self {
            latitude,
            longitude,
            altitude: None,
        };
        coord.check()?;
        Ok(coord)
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Range check: latitude in [-90, 90], longitude in [-180, 180], altitude finite.
    pub fn check(&self) -> Result<()> {
        let subject = || format!("({}, {})", self.latitude, self.longitude);

        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoSetError::invalid(
                subject(),
                CoordinateField::Latitude,
                format!("{} is outside [-90, 90]", self.latitude),
            ));
        }

        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoSetError::invalid(
                subject(),
                CoordinateField::Longitude,
                format!("{} is outside [-180, 180]", self.longitude),
            ));
        }

        if let Some(alt) = self.altitude {
            if !alt.is_finite() {
                return Err(GeoSetError::invalid(
                    subject(),
                    CoordinateField::Altitude,
                    format!("{} is not finite", alt),
                ));
            }
        }

        Ok(())
    }

    #[inline]
    fn altitude_or_zero(&self) -> f64 {
        self.altitude.unwrap_or(0.0)
    }
}

/// Offset from the reference point in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl LocalPosition {
    pub const ORIGIN: Self = Self {
        east: 0.0,
        north: 0.0,
        up: 0.0,
    };

    /// Renderer axis order: `[east, up, north]`.
    #[inline]
    pub fn to_xyz(&self) -> [f64; 3] {
        [self.east, self.up, self.north]
    }

    #[inline]
    pub fn horizontal_distance(&self) -> f64 {
        self.east.hypot(self.north)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    #[default]
    Equirectangular,
    GridDifference,
}

impl fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectionMethod::Equirectangular => "equirectangular",
            ProjectionMethod::GridDifference => "grid_difference",
        };

        f.write_str(s)
    }
}

/// A projection bound to one reference point. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Projector {
    method: ProjectionMethod,
    reference: ReferencePoint,
    /// Reference in its own UTM zone; only for `GridDifference`.
    grid_origin: Option<UtmCoordinate>,
}

impl Projector {
    pub fn new(method: ProjectionMethod, reference: ReferencePoint) -> Result<Self> {
        reference.coordinate().check()?;

        let grid_origin = match method {
            ProjectionMethod::Equirectangular => None,
            ProjectionMethod::GridDifference => {
                Some(utm::to_utm(reference.latitude(), reference.longitude()))
            }
        };

        Ok(Self {
            method,
            reference,
            grid_origin,
        })
    }

    pub fn method(&self) -> ProjectionMethod {
        self.method
    }

    pub fn reference(&self) -> &ReferencePoint {
        &self.reference
    }

    /// The UTM zone targets are projected into, for `GridDifference`.
    pub fn grid_zone(&self) -> Option<UtmZone> {
        self.grid_origin.map(|g| g.zone)
    }

    pub fn project(&self, target: &GeoCoordinate) -> Result<LocalPosition> {
        target.check()?;

        let reference = self.reference.coordinate();
        let up = target.altitude_or_zero() - reference.altitude_or_zero();

        let (east, north) = match self.grid_origin {
            None => {
                let ref_lat = reference.latitude.to_radians();
                let d_lat = target.latitude.to_radians() - ref_lat;
                let d_lon = (target.longitude - reference.longitude).to_radians();

                (
                    EARTH_RADIUS_M * d_lon * ref_lat.cos(),
                    EARTH_RADIUS_M * d_lat,
                )
            }
            Some(origin) => {
                let from_meridian =
                    (target.longitude - origin.zone.central_meridian_deg()).abs();
                let grid = utm::to_utm_in_zone(target.latitude, target.longitude, origin.zone);

                // At 90° from the central meridian the series diverges; beyond it wraps.
                if from_meridian >= MAX_GRID_MERIDIAN_OFFSET_DEG
                    || !grid.easting.is_finite()
                    || !grid.northing.is_finite()
                {
                    return Err(GeoSetError::invalid(
                        format!("({}, {})", target.latitude, target.longitude),
                        CoordinateField::Longitude,
                        format!("outside the grid zone {} of the reference", origin.zone),
                    ));
                }

                (grid.easting - origin.easting, grid.northing - origin.northing)
            }
        };

        Ok(LocalPosition { east, north, up })
    }

    /// Invert [`Projector::project`] against the same reference.
    pub fn unproject(&self, local: &LocalPosition) -> Result<GeoCoordinate> {
        let reference = self.reference.coordinate();

        let (latitude, longitude) = match self.grid_origin {
            None => {
                let cos_lat = reference.latitude.to_radians().cos();
                if cos_lat.abs() < 1e-12 {
                    return Err(GeoSetError::invalid(
                        format!("reference ({}, {})", reference.latitude, reference.longitude),
                        CoordinateField::Latitude,
                        "east offsets are undefined at a pole",
                    ));
                }

                (
                    reference.latitude + (local.north / EARTH_RADIUS_M).to_degrees(),
                    reference.longitude + (local.east / (EARTH_RADIUS_M * cos_lat)).to_degrees(),
                )
            }
            Some(origin) => utm::from_utm(&UtmCoordinate {
                zone: origin.zone,
                easting: origin.easting + local.east,
                northing: origin.northing + local.north,
            }),
        };

        let altitude = match reference.altitude {
            Some(alt) => Some(alt + local.up),
            None if local.up != 0.0 => Some(local.up),
            None => None,
        };

        let coord = GeoCoordinate {
            latitude,
            longitude,
            altitude,
        };
        coord.check()?;

        Ok(coord)
    }
}

/// Project one point against a reference with the chosen strategy.
pub fn project(
    point: &GeoCoordinate,
    reference: &ReferencePoint,
    method: ProjectionMethod,
) -> Result<LocalPosition> {
    Projector::new(method, *reference)?.project(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: [ProjectionMethod; 2] = [
        ProjectionMethod::Equirectangular,
        ProjectionMethod::GridDifference,
    ];

    fn reference(lat: f64, lon: f64) -> ReferencePoint {
        ReferencePoint::new(GeoCoordinate::new(lat, lon).unwrap())
    }

    #[test]
    fn reference_projects_to_origin() {
        for &(lat, lon) in &[(41.7212, -73.9325), (-33.8688, 151.2093), (0.0, 0.0)] {
            let r = reference(lat, lon);
            for method in BOTH {
                let p = project(r.coordinate(), &r, method).unwrap();
                assert!(p.east.abs() < 1e-6 && p.north.abs() < 1e-6, "{method}: {p:?}");
                assert_eq!(p.up, 0.0);
            }
        }
    }

    #[test]
    fn equirectangular_formula() {
        let r = reference(41.7212, -73.9325);
        let target = GeoCoordinate::new(41.7222, -73.9315).unwrap();
        let p = project(&target, &r, ProjectionMethod::Equirectangular).unwrap();

        let expected_north = EARTH_RADIUS_M * 0.001_f64.to_radians();
        let expected_east = expected_north * 41.7212_f64.to_radians().cos();
        assert!((p.north - expected_north).abs() < 1e-3);
        assert!((p.east - expected_east).abs() < 1e-3);
        assert!(p.east > 0.0 && p.north > 0.0);
    }

    #[test]
    fn vertical_is_altitude_difference() {
        let r = ReferencePoint::new(GeoCoordinate::new(41.0, -73.0).unwrap().with_altitude(10.0));
        let high = GeoCoordinate::new(41.0001, -73.0).unwrap().with_altitude(25.5);
        let unknown = GeoCoordinate::new(41.0001, -73.0).unwrap();

        for method in BOTH {
            let projector = Projector::new(method, r).unwrap();
            assert_eq!(projector.project(&high).unwrap().up, 15.5);
            assert_eq!(projector.project(&unknown).unwrap().up, -10.0);
        }
    }

    #[test]
    fn equirectangular_round_trip() {
        let projector =
            Projector::new(ProjectionMethod::Equirectangular, reference(41.7212, -73.9325))
                .unwrap();

        for &(lat, lon) in &[(41.7212, -73.9325), (41.7301, -73.9100), (41.7000, -73.9500)] {
            let target = GeoCoordinate::new(lat, lon).unwrap();
            let back = projector.unproject(&projector.project(&target).unwrap()).unwrap();
            assert!((back.latitude - lat).abs() <= 1e-6);
            assert!((back.longitude - lon).abs() <= 1e-6);
        }
    }

    #[test]
    fn grid_round_trip() {
        let projector =
            Projector::new(ProjectionMethod::GridDifference, reference(41.7212, -73.9325))
                .unwrap();
        assert_eq!(projector.grid_zone().map(|z| z.number), Some(18));

        let target = GeoCoordinate::new(41.7301, -73.9100).unwrap();
        let back = projector.unproject(&projector.project(&target).unwrap()).unwrap();
        assert!((back.latitude - target.latitude).abs() <= 1e-7);
        assert!((back.longitude - target.longitude).abs() <= 1e-7);
    }

    #[test]
    fn strategies_agree_on_short_baselines() {
        let r = reference(41.7212, -73.9325);
        // Roughly 100 m north-east of the reference.
        let target = GeoCoordinate::new(41.72184, -73.93165).unwrap();

        let a = project(&target, &r, ProjectionMethod::Equirectangular).unwrap();
        let b = project(&target, &r, ProjectionMethod::GridDifference).unwrap();

        let (da, db) = (a.horizontal_distance(), b.horizontal_distance());
        assert!(da > 80.0 && da < 120.0, "baseline {da}");
        assert!((da - db).abs() / da < 0.01, "equirectangular {da} vs grid {db}");
    }

    #[test]
    fn out_of_range_target_is_rejected() {
        let r = reference(41.0, -73.0);
        let bad = GeoCoordinate {
            latitude: 91.0,
            longitude: 0.0,
            altitude: None,
        };

        for method in BOTH {
            let err = project(&bad, &r, method).unwrap_err();
            assert!(matches!(
                err,
                GeoSetError::InvalidCoordinate {
                    field: CoordinateField::Latitude,
                    ..
                }
            ));
        }

        assert!(GeoCoordinate::new(0.0, 180.5).is_err());
        assert!(GeoCoordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn grid_rejects_targets_far_from_the_zone() {
        let projector =
            Projector::new(ProjectionMethod::GridDifference, reference(0.0, 3.0)).unwrap();
        assert_eq!(projector.grid_zone().map(|z| z.number), Some(31));

        for lon in [93.0, -177.0, 120.0] {
            let target = GeoCoordinate::new(0.0, lon).unwrap();
            let err = projector.project(&target).unwrap_err();
            assert!(
                matches!(
                    err,
                    GeoSetError::InvalidCoordinate {
                        field: CoordinateField::Longitude,
                        ..
                    }
                ),
                "lon {lon}: {err}"
            );
        }

        // Neighbouring zone still projects into the reference's zone.
        let near = projector.project(&GeoCoordinate::new(0.0, 9.5).unwrap()).unwrap();
        assert!(near.east.is_finite() && near.north.is_finite());
        assert!(near.east > 700_000.0);

        // Equirectangular has no zone limit.
        let flat = project(
            &GeoCoordinate::new(0.0, 93.0).unwrap(),
            &reference(0.0, 3.0),
            ProjectionMethod::Equirectangular,
        )
        .unwrap();
        assert!(flat.east.is_finite());
    }

    #[test]
    fn axis_order() {
        let p = LocalPosition {
            east: 1.0,
            north: 2.0,
            up: 3.0,
        };
        assert_eq!(p.to_xyz(), [1.0, 3.0, 2.0]);
    }
}
