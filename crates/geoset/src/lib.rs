//! GEOSET: survey JSON -> projected spatial sets in a local metric frame.
//!
//! Pipeline, one batch at a time:
//!
//! ```text
//!   text ──parse──> records ──validate──> ValidatedBatch
//!                                            │
//!                     ReferenceSlot <─resolve┘  (explicit > first point > first segment)
//!                          │
//!                      Projector  (equirectangular | UTM grid difference)
//!                          │
//!          PointOfInterest[] + LinePath[] ──> SpatialSet
//! ```
//!
//! - Coordinates arrive as numbers or text and are validated per record; bad
//!   records are dropped with a [`Diagnostic`], never failing the batch.
//! - Only [`GeoSetError::MalformedInput`] and [`GeoSetError::NoReferenceAvailable`]
//!   abort a batch.
//! - The reference point is owned by a [`Session`] and frozen once a set has been
//!   produced against it.
//! - Local axes: east, north, up (meters). [`LocalPosition::to_xyz`] gives the
//!   renderer order `[east, up, north]`.
//!
//! The crate performs no I/O; reading inputs and persisting sets is the caller's job.

pub mod config;
pub mod error;
pub mod path;
pub mod poi;
pub mod projection;
pub mod records;
pub mod reference;
pub mod session;
pub mod set;
pub mod validate;

pub use config::{AssetHandle, FeatureDefaults, LineStyle, PipelineConfig, PlacementMode};
pub use error::{CoordinateField, Diagnostic, GeoSetError, Result, Severity};
pub use path::LinePath;
pub use poi::PointOfInterest;
pub use projection::{project, GeoCoordinate, LocalPosition, ProjectionMethod, Projector};
pub use reference::{ReferencePoint, ReferenceSlot, ReferenceSource};
pub use session::{IngestReport, Session};
pub use set::SpatialSet;
pub use validate::FeatureKind;
