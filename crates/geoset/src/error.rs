use std::fmt;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = GeoSetError> = std::result::Result<T, E>;

/// Which part of a coordinate failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateField {
    Latitude,
    Longitude,
    Altitude,
}

impl fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordinateField::Latitude => "latitude",
            CoordinateField::Longitude => "longitude",
            CoordinateField::Altitude => "altitude",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum GeoSetError {
    /// A top-level section of the input could not be decoded. Fatal for the batch.
    #[error("malformed input in section `{section}`: {source}")]
    MalformedInput {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// One coordinate field is unparseable or out of range. The record is dropped.
    #[error("invalid {field} for {subject}: {reason}")]
    InvalidCoordinate {
        subject: String,
        field: CoordinateField,
        reason: String,
    },

    /// A conduit has too few valid segments for a path or a derived feature.
    #[error("{subject} has {valid} valid segment(s), {needed} needed for {feature}")]
    InsufficientPath {
        subject: String,
        feature: &'static str,
        valid: usize,
        needed: usize,
    },

    #[error("no reference point available: no explicit reference, no valid point feature and no valid conduit segment")]
    NoReferenceAvailable,

    #[error("projection requested before a reference point was resolved")]
    MissingReference,

    #[error("reference point is frozen after producing output; reset it explicitly first")]
    ReferenceFrozen,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GeoSetError {
    /// Whether this kind aborts a whole batch with no partial output.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GeoSetError::MalformedInput { .. } | GeoSetError::NoReferenceAvailable
        )
    }

    pub(crate) fn invalid(
        subject: impl Into<String>,
        field: CoordinateField,
        reason: impl Into<String>,
    ) -> Self {
        GeoSetError::InvalidCoordinate {
            subject: subject.into(),
            field,
            reason: reason.into(),
        }
    }

    /// Rename the subject of a coordinate error; other kinds pass through.
    pub(crate) fn with_subject(self, subject: impl Into<String>) -> Self {
        match self {
            GeoSetError::InvalidCoordinate { field, reason, .. } => {
                GeoSetError::invalid(subject, field, reason)
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// A recoverable problem found while building a set. Never a failure of the run.
#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: GeoSetError,
}

impl Diagnostic {
    pub fn warning(error: GeoSetError) -> Self {
        log::warn!("{}", error);
        Self {
            severity: Severity::Warning,
            error,
        }
    }

    pub fn info(error: GeoSetError) -> Self {
        log::debug!("{}", error);
        Self {
            severity: Severity::Info,
            error,
        }
    }
}

/// Written as `{severity, error}` with the error as its message text.
impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Diagnostic", 2)?;
        state.serialize_field("severity", &self.severity)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };

        write!(f, "{}: {}", level, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(GeoSetError::MalformedInput {
            section: "document",
            source: bad_json
        }
        .is_fatal());
        assert!(GeoSetError::NoReferenceAvailable.is_fatal());
        assert!(!GeoSetError::MissingReference.is_fatal());
        assert!(!GeoSetError::invalid("Manhole 7", CoordinateField::Latitude, "abc").is_fatal());
    }

    #[test]
    fn diagnostic_display_names_subject_and_field() {
        let d = Diagnostic::warning(GeoSetError::invalid(
            "Manhole 7",
            CoordinateField::Latitude,
            "`abc` is not a number",
        ));
        assert_eq!(
            d.to_string(),
            "warning: invalid latitude for Manhole 7: `abc` is not a number"
        );
    }

    #[test]
    fn diagnostic_serializes_message() {
        let d = Diagnostic::info(GeoSetError::InsufficientPath {
            subject: "conduit Line A".into(),
            feature: "a midpoint",
            valid: 2,
            needed: 3,
        });

        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["severity"], "info");
        assert_eq!(
            value["error"],
            "conduit Line A has 2 valid segment(s), 3 needed for a midpoint"
        );
    }

    #[test]
    fn with_subject_only_renames_coordinate_errors() {
        let err = GeoSetError::invalid("(1, 2)", CoordinateField::Longitude, "far")
            .with_subject("Manhole 4");
        assert_eq!(err.to_string(), "invalid longitude for Manhole 4: far");

        let err = GeoSetError::MissingReference.with_subject("Manhole 4");
        assert!(matches!(err, GeoSetError::MissingReference));
    }
}
