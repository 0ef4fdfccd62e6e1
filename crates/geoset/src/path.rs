use serde::Serialize;

use crate::config::LineStyle;
use crate::error::{GeoSetError, Result};
use crate::projection::{LocalPosition, Projector};
use crate::validate::{ValidConduit, ValidVertex, MIN_PATH_SEGMENTS};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A projected conduit polyline. Always holds at least two vertices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePath {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conduit_id: Option<i64>,
    color: [f32; 4],
    width_m: f32,
    vertices: Vec<LocalPosition>,
}

impl LinePath {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        conduit_id: Option<i64>,
        style: LineStyle,
        vertices: Vec<LocalPosition>,
    ) -> Result<Self> {
        let name = name.into();

        if vertices.len() < MIN_PATH_SEGMENTS {
            return Err(GeoSetError::InsufficientPath {
                subject: format!("conduit {}", name),
                feature: "a path",
                valid: vertices.len(),
                needed: MIN_PATH_SEGMENTS,
            });
        }

        Ok(Self {
            name,
            description: description.into(),
            conduit_id,
            color: style.color,
            width_m: style.width_m,
            vertices,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn conduit_id(&self) -> Option<i64> {
        self.conduit_id
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn width_m(&self) -> f32 {
        self.width_m
    }

    pub fn vertices(&self) -> &[LocalPosition] {
        &self.vertices
    }

    /// Sum of segment lengths on the horizontal plane.
    pub fn horizontal_length_m(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| {
                LocalPosition {
                    east: w[1].east - w[0].east,
                    north: w[1].north - w[0].north,
                    up: 0.0,
                }
                .horizontal_distance()
            })
            .sum()
    }
}

fn project_vertices(vertices: &[ValidVertex], projector: &Projector) -> Result<Vec<LocalPosition>> {
    #[cfg(feature = "parallel")]
    let iter = vertices.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = vertices.iter();

    // Collecting preserves input order in both cases.
    iter.map(|v| projector.project(&v.coordinate)).collect()
}

/// Project every vertex of a validated conduit, keeping segment order.
pub fn assemble_path(
    conduit: &ValidConduit,
    projector: &Projector,
    style: LineStyle,
) -> Result<LinePath> {
    let vertices = project_vertices(&conduit.vertices, projector)?;

    LinePath::new(
        conduit.name.clone(),
        conduit.description.clone(),
        conduit.id,
        style,
        vertices,
    )
}
