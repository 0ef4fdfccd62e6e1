//! Typed intermediate records decoded from the survey JSON schemas.
//!
//! Decoding is tolerant below the section level: text fields accept any scalar,
//! coordinates accept numbers or text, and `null` list entries are skipped. A
//! section that is not a list of objects fails the whole document with
//! [`GeoSetError::MalformedInput`] naming the section.

use std::collections::BTreeMap;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{GeoSetError, Result};

/// A coordinate exactly as it appeared in the input, before numeric validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawCoordinate {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl RawCoordinate {
    /// Parse to a finite `f64`. The error string says what was wrong with the input.
    pub fn parse(&self) -> std::result::Result<f64, String> {
        let value = match self {
            RawCoordinate::Missing => return Err("missing".to_string()),
            RawCoordinate::Number(v) => *v,
            RawCoordinate::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("`{}` is not a number", text))?,
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("{} is not finite", value))
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawCoordinate::Missing)
    }
}

impl From<f64> for RawCoordinate {
    fn from(v: f64) -> Self {
        RawCoordinate::Number(v)
    }
}

impl From<&str> for RawCoordinate {
    fn from(s: &str) -> Self {
        RawCoordinate::Text(s.to_string())
    }
}

impl From<Value> for RawCoordinate {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawCoordinate::Missing,
            Value::Number(n) => n
                .as_f64()
                .map_or(RawCoordinate::Missing, RawCoordinate::Number),
            Value::String(s) => RawCoordinate::Text(s),
            other => RawCoordinate::Text(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for RawCoordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(RawCoordinate::from)
    }
}

/// Compass direction -> free-text notes, as carried by enclosures.
pub type DirectionalNotes = BTreeMap<String, Vec<String>>;

/// A point feature (manhole) from the survey schema or a bare point list.
///
/// Coordinates may be spelled `Latitude`/`latitude`/`lat` and
/// `Longitude`/`longitude`/`lng`; the first non-null spelling in that order wins.
#[derive(Debug, Clone, Default)]
pub struct GeoRecord {
    pub id: String,
    pub mid: String,
    pub description: String,
    pub latitude: RawCoordinate,
    pub longitude: RawCoordinate,
    pub directions: DirectionalNotes,
}

impl GeoRecord {
    /// The identifier shown to people: `mid` when present, else `id`.
    pub fn label_id(&self) -> &str {
        if self.mid.trim().is_empty() {
            &self.id
        } else {
            &self.mid
        }
    }
}

impl<'de> Deserialize<'de> for GeoRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map: Map<String, Value> = Map::deserialize(deserializer)?;

        let directions = match map.remove("directions") {
            Some(value) => {
                lenient::directions(value).map_err(<D::Error as de::Error>::custom)?
            }
            None => DirectionalNotes::new(),
        };

        Ok(Self {
            id: take_text(&mut map, "id"),
            mid: take_text(&mut map, "mid"),
            description: take_text(&mut map, "description"),
            latitude: take_coordinate(&mut map, &["Latitude", "latitude", "lat"]),
            longitude: take_coordinate(&mut map, &["Longitude", "longitude", "lng"]),
            directions,
        })
    }
}

/// One vertex of a conduit. Accepts `lat`/`latitude` and `lng`/`lon`/`longitude`.
#[derive(Debug, Clone, Default)]
pub struct SegmentRecord {
    pub lat: RawCoordinate,
    pub lng: RawCoordinate,
    pub notes: String,
}

impl<'de> Deserialize<'de> for SegmentRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map: Map<String, Value> = Map::deserialize(deserializer)?;

        Ok(Self {
            lat: take_coordinate(&mut map, &["lat", "latitude"]),
            lng: take_coordinate(&mut map, &["lng", "lon", "longitude"]),
            notes: take_text(&mut map, "notes"),
        })
    }
}

fn take_text(map: &mut Map<String, Value>, key: &str) -> String {
    map.remove(key).map(lenient::scalar_text).unwrap_or_default()
}

/// Remove every spelling in `keys`; keep the first one that is not `null`.
fn take_coordinate(map: &mut Map<String, Value>, keys: &[&str]) -> RawCoordinate {
    let mut found = RawCoordinate::Missing;

    for key in keys {
        if let Some(value) = map.remove(*key) {
            if found.is_missing() {
                found = RawCoordinate::from(value);
            }
        }
    }

    found
}

/// A surveyed path. Segment order is the path direction and is never changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConduitRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub id: Option<i64>,
    #[serde(default, rename = "segment", alias = "segments", deserialize_with = "lenient::list")]
    pub segments: Vec<SegmentRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpsCoordinates {
    #[serde(default)]
    pub latitude: RawCoordinate,
    #[serde(default)]
    pub longitude: RawCoordinate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnclosureRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default)]
    pub gps_coordinates: GpsCoordinates,
    #[serde(default, deserialize_with = "lenient::directions")]
    pub directions: DirectionalNotes,
    #[serde(default, deserialize_with = "lenient::text")]
    pub notes: String,
}

/// One entry of a field placement log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkerRecord {
    #[serde(default)]
    pub latitude: RawCoordinate,
    #[serde(default)]
    pub longitude: RawCoordinate,
    #[serde(default)]
    pub altitude: RawCoordinate,
}

/// The survey schema: a zone, its conduits and its manholes.
#[derive(Debug, Clone, Default)]
pub struct SurveyDocument {
    pub zone: Option<String>,
    pub conduits: Vec<ConduitRecord>,
    pub manholes: Vec<GeoRecord>,
}

fn malformed(section: &'static str) -> impl FnOnce(serde_json::Error) -> GeoSetError {
    move |source| GeoSetError::MalformedInput { section, source }
}

/// Decode one list-valued section. Absent or `null` is an empty list.
fn decode_list<T: DeserializeOwned>(value: Option<Value>, section: &'static str) -> Result<Vec<T>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => {
            let items: Vec<Option<T>> =
                serde_json::from_value(value).map_err(malformed(section))?;
            Ok(items.into_iter().flatten().collect())
        }
    }
}

/// Decode a document that is either a bare list or an object wrapping the list
/// under `wrapper`.
fn decode_wrapped_list<T: DeserializeOwned>(text: &str, wrapper: &'static str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(text).map_err(malformed("document"))?;

    match value {
        Value::Object(mut map) => match map.remove(wrapper) {
            Some(list) => decode_list(Some(list), wrapper),
            None => decode_list(Some(Value::Object(map)), "document"),
        },
        other => decode_list(Some(other), "document"),
    }
}

/// Parse the survey schema (`zone`, `conduits[]`, `manholes[]`).
pub fn parse_survey(text: &str) -> Result<SurveyDocument> {
    let mut root: Map<String, Value> =
        serde_json::from_str(text).map_err(malformed("document"))?;

    let zone = match root.remove("zone") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };

    let conduits = decode_list(root.remove("conduits"), "conduits")?;
    let manholes = decode_list(root.remove("manholes"), "manholes")?;

    log::debug!(
        "Parsed survey {:?}: {} manholes, {} conduits",
        zone,
        manholes.len(),
        conduits.len()
    );

    Ok(SurveyDocument {
        zone,
        conduits,
        manholes,
    })
}

/// Parse the enclosure schema: a list of enclosures, bare or under `enclosures`.
pub fn parse_enclosures(text: &str) -> Result<Vec<EnclosureRecord>> {
    decode_wrapped_list(text, "enclosures")
}

/// Parse a bare list of manhole-shaped point records (or one wrapped under `points`).
pub fn parse_point_list(text: &str) -> Result<Vec<GeoRecord>> {
    decode_wrapped_list(text, "points")
}

/// Parse a placement log: `{"points": [{latitude, longitude, altitude}]}` or a bare list.
pub fn parse_markers(text: &str) -> Result<Vec<MarkerRecord>> {
    decode_wrapped_list(text, "points")
}

mod lenient {
    use super::DirectionalNotes;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn scalar_text(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Value::deserialize(deserializer).map(scalar_text)
    }

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// A list whose `null` entries are dropped; `null` itself is an empty list.
    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items: Option<Vec<Option<T>>> = Option::deserialize(deserializer)?;
        Ok(items.unwrap_or_default().into_iter().flatten().collect())
    }

    pub fn directions<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DirectionalNotes, D::Error> {
        let mut out = DirectionalNotes::new();

        if let Value::Object(map) = Value::deserialize(deserializer)? {
            for (direction, notes) in map {
                let notes: Vec<String> = match notes {
                    Value::Null => continue,
                    Value::Array(items) => items
                        .into_iter()
                        .filter(|v| !v.is_null())
                        .map(scalar_text)
                        .collect(),
                    other => vec![scalar_text(other)],
                };

                if !notes.is_empty() {
                    out.insert(direction, notes);
                }
            }
        }

        Ok(out)
    }
}
