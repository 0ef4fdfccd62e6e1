use serde::{Deserialize, Serialize};

use crate::error::{GeoSetError, Result};
use crate::projection::GeoCoordinate;
use crate::validate::ValidatedBatch;

/// Origin of the local coordinate system for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferencePoint(GeoCoordinate);

impl ReferencePoint {
    pub fn new(coordinate: GeoCoordinate) -> Self {
        Self(coordinate)
    }

    pub fn coordinate(&self) -> &GeoCoordinate {
        &self.0
    }

    pub fn latitude(&self) -> f64 {
        self.0.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.0.longitude
    }

    pub fn altitude(&self) -> Option<f64> {
        self.0.altitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    Explicit,
    FirstPoint,
    FirstConduitSegment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ReferenceSlot {
    #[default]
    Unset,
    Resolved {
        point: ReferencePoint,
        source: ReferenceSource,
        /// Set once any output has been produced against this point.
        frozen: bool,
    },
}

impl ReferenceSlot {
    pub fn explicit(point: ReferencePoint) -> Self {
        ReferenceSlot::Resolved {
            point,
            source: ReferenceSource::Explicit,
            frozen: false,
        }
    }

    pub fn point(&self) -> Option<&ReferencePoint> {
        match self {
            ReferenceSlot::Unset => None,
            ReferenceSlot::Resolved { point, .. } => Some(point),
        }
    }

    pub fn source(&self) -> Option<ReferenceSource> {
        match self {
            ReferenceSlot::Unset => None,
            ReferenceSlot::Resolved { source, .. } => Some(*source),
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, ReferenceSlot::Resolved { frozen: true, .. })
    }

    /// Caller-supplied reference. Refused once output exists for the current one.
    pub fn set(&mut self, point: ReferencePoint) -> Result<()> {
        if self.is_frozen() {
            return Err(GeoSetError::ReferenceFrozen);
        }

        point.coordinate().check()?;
        *self = ReferenceSlot::explicit(point);
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = ReferenceSlot::Unset;
    }

    pub(crate) fn freeze(&mut self) {
        if let ReferenceSlot::Resolved { frozen, .. } = self {
            *frozen = true;
        }
    }

    /// Resolve from the batch if unset: first valid point feature, else the first
    /// valid conduit segment in input order. A no-op when already set.
    pub fn resolve(&mut self, batch: &ValidatedBatch) -> Result<ReferencePoint> {
        if let Some(point) = self.point() {
            return Ok(*point);
        }

        let (coordinate, source) = if let Some(first) = batch.points.first() {
            (first.coordinate, ReferenceSource::FirstPoint)
        } else if let Some(segment) = batch.first_segment {
            (segment, ReferenceSource::FirstConduitSegment)
        } else {
            return Err(GeoSetError::NoReferenceAvailable);
        };

        let point = ReferencePoint::new(coordinate);
        log::info!(
            "Reference point set from {:?}: {}, {}",
            source,
            point.latitude(),
            point.longitude()
        );

        *self = ReferenceSlot::Resolved {
            point,
            source,
            frozen: false,
        };

        Ok(point)
    }
}
