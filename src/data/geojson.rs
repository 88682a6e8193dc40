//! Minimal GeoJSON reader for mask documents.
//!
//! Only polygonal geometry matters for sea and land masks; every other object
//! type parses but contributes nothing.

use crate::{Error, Result};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;

/// Positions may carry an altitude; only the first two values are used
type Position = Vec<f64>;
type Ring = Vec<Position>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Node {
    FeatureCollection {
        features: Vec<Node>,
    },
    Feature {
        geometry: Option<Box<Node>>,
    },
    GeometryCollection {
        geometries: Vec<Node>,
    },
    Polygon {
        coordinates: Vec<Ring>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Ring>>,
    },
    #[serde(other)]
    Other,
}

/// All polygons of a GeoJSON document, in document order
pub fn parse_polygons(text: &str) -> Result<MultiPolygon<f64>> {
    let root: Node = serde_json::from_str(text).map_err(|e| Error::Mask(format!("invalid GeoJSON: {}", e)))?;
    let mut polygons = Vec::new();
    collect(&root, &mut polygons);
    Ok(MultiPolygon(polygons))
}

fn collect(node: &Node, polygons: &mut Vec<Polygon<f64>>) {
    match node {
        Node::FeatureCollection { features } => features.iter().for_each(|f| collect(f, polygons)),
        Node::Feature { geometry } => {
            if let Some(geometry) = geometry {
                collect(geometry, polygons);
            }
        }
        Node::GeometryCollection { geometries } => geometries.iter().for_each(|g| collect(g, polygons)),
        Node::Polygon { coordinates } => polygons.extend(polygon(coordinates)),
        Node::MultiPolygon { coordinates } => polygons.extend(coordinates.iter().filter_map(|p| polygon(p))),
        Node::Other => {}
    }
}

fn polygon(rings: &[Ring]) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| line_string(ring)).filter(|ring| ring.0.len() >= 3);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn line_string(ring: &[Position]) -> LineString<f64> {
    ring.iter()
        .filter_map(|p| match p.as_slice() {
            [x, y, ..] => Some(Coord { x: *x, y: *y }),
            _ => None,
        })
        .collect()
}
