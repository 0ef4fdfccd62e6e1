//! Caller-supplied defaults for a pipeline run.
//!
//! Every field has a default, so a partial JSON document overrides only what it
//! names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSetError, Result};
use crate::projection::ProjectionMethod;
use crate::reference::ReferencePoint;
use crate::validate::FeatureKind;

pub const DEFAULT_SET_NAME: &str = "Generated POI Set";
pub const DEFAULT_LINE_SET_NAME: &str = "Generated Conduit Lines";

pub const DEFAULT_TRACKING_RADIUS_M: f64 = 75.0;
pub const DEFAULT_CLOSE_TRACKING_RADIUS_M: f64 = 15.0;

/// Reference to a visual asset owned by the consumer. Never resolved here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a consumer should anchor a POI vertically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    #[default]
    AlignWithGround,
    FixedHeight,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetBindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<AssetHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<AssetHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<AssetHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<AssetHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    pub tracking_radius_m: f64,
    pub close_tracking_radius_m: f64,
    pub placement: PlacementMode,
    pub relative_height_m: f64,
    pub facing_heading_deg: f64,
    pub assets: AssetBindings,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            tracking_radius_m: DEFAULT_TRACKING_RADIUS_M,
            close_tracking_radius_m: DEFAULT_CLOSE_TRACKING_RADIUS_M,
            placement: PlacementMode::AlignWithGround,
            relative_height_m: 0.0,
            facing_heading_deg: 0.0,
            assets: AssetBindings::default(),
        }
    }
}

impl FeatureDefaults {
    fn with_canvas(canvas: &str) -> Self {
        Self {
            assets: AssetBindings {
                canvas: Some(AssetHandle::new(canvas)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn check(&self, kind: FeatureKind) -> Result<()> {
        let radii = [
            ("tracking_radius_m", self.tracking_radius_m),
            ("close_tracking_radius_m", self.close_tracking_radius_m),
        ];

        for (name, value) in radii {
            if !value.is_finite() || value < 0.0 {
                return Err(GeoSetError::Config(format!(
                    "features.{}.{} must be a non-negative number, got {}",
                    kind_key(kind),
                    name,
                    value
                )));
            }
        }

        if self.close_tracking_radius_m > self.tracking_radius_m {
            return Err(GeoSetError::Config(format!(
                "features.{}: close_tracking_radius_m ({}) exceeds tracking_radius_m ({})",
                kind_key(kind),
                self.close_tracking_radius_m,
                self.tracking_radius_m
            )));
        }

        if !self.relative_height_m.is_finite() || !self.facing_heading_deg.is_finite() {
            return Err(GeoSetError::Config(format!(
                "features.{}: height and heading must be finite",
                kind_key(kind)
            )));
        }

        Ok(())
    }
}

fn kind_key(kind: FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Manhole => "manhole",
        FeatureKind::Enclosure => "enclosure",
        FeatureKind::Conduit => "conduit",
        FeatureKind::Marker => "marker",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureTable {
    pub manhole: FeatureDefaults,
    pub enclosure: FeatureDefaults,
    pub conduit: FeatureDefaults,
    pub marker: FeatureDefaults,
}

impl Default for FeatureTable {
    fn default() -> Self {
        let mut manhole = FeatureDefaults::with_canvas("Prefabs/POIManhole");
        manhole.assets.icon = Some(AssetHandle::new("Prefabs/POIManholeIcon"));

        Self {
            manhole,
            enclosure: FeatureDefaults::with_canvas("Prefabs/POIManhole"),
            conduit: FeatureDefaults::with_canvas("Prefabs/POIFiberLine"),
            marker: FeatureDefaults::with_canvas("Prefabs/POIManhole"),
        }
    }
}

impl FeatureTable {
    pub fn get(&self, kind: FeatureKind) -> &FeatureDefaults {
        match kind {
            FeatureKind::Manhole => &self.manhole,
            FeatureKind::Enclosure => &self.enclosure,
            FeatureKind::Conduit => &self.conduit,
            FeatureKind::Marker => &self.marker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStyle {
    /// Linear RGBA in [0, 1].
    pub color: [f32; 4],
    pub width_m: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 0.0, 0.0, 1.0],
            width_m: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub projection: ProjectionMethod,
    /// Pre-set origin. When absent the session resolves one from the input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferencePoint>,
    pub set_name: String,
    pub line_set_name: String,
    pub line_style: LineStyle,
    pub features: FeatureTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionMethod::default(),
            reference: None,
            set_name: DEFAULT_SET_NAME.to_string(),
            line_set_name: DEFAULT_LINE_SET_NAME.to_string(),
            line_style: LineStyle::default(),
            features: FeatureTable::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| GeoSetError::Config(format!("cannot decode config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in [
            FeatureKind::Manhole,
            FeatureKind::Enclosure,
            FeatureKind::Conduit,
            FeatureKind::Marker,
        ] {
            self.features.get(kind).check(kind)?;
        }

        if let Some(reference) = &self.reference {
            reference
                .coordinate()
                .check()
                .map_err(|err| GeoSetError::Config(format!("reference: {}", err)))?;
        }

        let style = &self.line_style;
        if !style.width_m.is_finite() || style.width_m <= 0.0 {
            return Err(GeoSetError::Config(format!(
                "line_style.width_m must be positive, got {}",
                style.width_m
            )));
        }
        if style.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(GeoSetError::Config(
                "line_style.color components must be within [0, 1]".to_string(),
            ));
        }

        Ok(())
    }

    pub fn defaults_for(&self, kind: FeatureKind) -> &FeatureDefaults {
        self.features.get(kind)
    }
}
