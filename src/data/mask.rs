//! Sea and land mask documents for the relief colorizer.
//!
//! Polygons are kept in degrees, as read from GeoJSON. Point classification runs
//! per scanline: all polygon edges crossing a latitude are intersected once,
//! paired up per polygon (even-odd rule, so holes stay holes) and the inside
//! spans of all polygons are merged. Overlapping polygons form their union.

use super::geojson::parse_polygons;
use crate::{Error, Result};
use geo::BoundingRect;
use geo_types::{LineString, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};
use std::path::Path;

/// One polygonal mask document
#[derive(Debug, Clone)]
pub struct MaskDocument {
    polygons: MultiPolygon<f64>,
    bounds: Option<Rect<f64>>,
}

impl MaskDocument {
    pub fn from_polygons(polygons: MultiPolygon<f64>) -> Self {
        let bounds = polygons.bounding_rect();
        Self { polygons, bounds }
    }

    pub fn from_geojson_str(geojson: &str) -> Result<Self> {
        let polygons = parse_polygons(geojson)?;
        if polygons.0.is_empty() {
            return Err(Error::Mask("document contains no polygons".to_string()));
        }
        Ok(Self::from_polygons(polygons))
    }

    pub fn from_geojson_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text)
            .map_err(|e| Error::Mask(format!("{}: {}", path.display(), e)))
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MaskEdge {
    a: [f64; 2],
    b: [f64; 2],
    /// Polygon the edge belongs to, unique across documents
    polygon: usize,
}

impl MaskEdge {
    /// Half-open in latitude so a shared vertex is counted once
    fn crosses(&self, lat: f64) -> bool {
        (self.a[1] <= lat) != (self.b[1] <= lat)
    }

    fn crossing_lon(&self, lat: f64) -> f64 {
        let t = (lat - self.a[1]) / (self.b[1] - self.a[1]);
        self.a[0] + t * (self.b[0] - self.a[0])
    }
}

impl RTreeObject for MaskEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

/// Disjoint longitude spans `(west, east]` inside the mask along one latitude
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSpans(Vec<(f64, f64)>);

impl RowSpans {
    /// Pair up the crossings of each polygon and merge the resulting spans.
    /// Expects `crossings` sorted by polygon, then longitude.
    fn from_crossings(crossings: &[(usize, f64)]) -> Self {
        let mut spans: Vec<(f64, f64)> = Vec::with_capacity(crossings.len() / 2);
        let mut rest = crossings;
        while let Some(&(polygon, _)) = rest.first() {
            let end = rest.iter().position(|c| c.0 != polygon).unwrap_or(rest.len());
            spans.extend(rest[..end].chunks_exact(2).map(|pair| (pair[0].1, pair[1].1)));
            rest = &rest[end..];
        }
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
        for (west, east) in spans {
            match merged.last_mut() {
                Some(last) if west <= last.1 => last.1 = last.1.max(east),
                _ => merged.push((west, east)),
            }
        }
        Self(merged)
    }

    pub fn contains(&self, lon: f64) -> bool {
        let i = self.0.partition_point(|&(_, east)| east < lon);
        self.0.get(i).map_or(false, |&(west, _)| west < lon)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Edge index over a set of mask documents
#[derive(Debug, Default)]
pub struct MaskIndex {
    edges: RTree<MaskEdge>,
    bounds: Vec<Rect<f64>>,
    documents: usize,
    polygons: usize,
}

impl MaskIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    pub fn document_count(&self) -> usize {
        self.documents
    }

    pub fn add_document(&mut self, document: &MaskDocument) {
        for polygon in &document.polygons.0 {
            let tag = self.polygons;
            self.insert_ring(polygon.exterior(), tag);
            for interior in polygon.interiors() {
                self.insert_ring(interior, tag);
            }
            self.polygons += 1;
        }
        if let Some(bounds) = document.bounds {
            self.bounds.push(bounds);
        }
        self.documents += 1;
    }

    fn insert_ring(&mut self, ring: &LineString<f64>, polygon: usize) {
        for line in ring.lines() {
            let edge = MaskEdge {
                a: [line.start.x, line.start.y],
                b: [line.end.x, line.end.y],
                polygon,
            };
            // horizontal edges never cross a scanline
            if edge.a[1] != edge.b[1] {
                self.edges.insert(edge);
            }
        }
    }

    /// Inside spans of the mask along the latitude `lat` (degrees)
    pub fn row_spans(&self, lat: f64) -> RowSpans {
        let in_bounds = self
            .bounds
            .iter()
            .any(|b| b.min().y <= lat && lat <= b.max().y);
        if !in_bounds {
            return RowSpans::default();
        }
        let row = AABB::from_corners([-1.0e6, lat], [1.0e6, lat]);
        let mut crossings: Vec<(usize, f64)> = self
            .edges
            .locate_in_envelope_intersecting(&row)
            .filter(|edge| edge.crosses(lat))
            .map(|edge| (edge.polygon, edge.crossing_lon(lat)))
            .collect();
        crossings.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        RowSpans::from_crossings(&crossings)
    }

    /// Whether the point (degrees) lies inside any mask polygon
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.row_spans(lat).contains(lon)
    }
}
