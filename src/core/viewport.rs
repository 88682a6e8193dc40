use crate::core::geo::{gd, inverse_gd, GeoCoord};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Projection used to display the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Projection {
    /// Orthographic view of a rotating globe
    Spherical,
    /// Plate carrée: longitude and latitude map linearly to x and y
    Equirectangular,
    /// Mercator: linear in longitude, inverse Gudermannian in latitude
    Mercator,
}

/// Camera state for one render call: projection, pixel size, globe radius and orientation.
///
/// The radius is the number of pixels per projection unit: on the globe it is the
/// disk radius, on flat maps the full 360° of longitude spans `4 * radius` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub projection: Projection,
    pub width: u32,
    pub height: u32,
    pub radius: i32,
    /// Geographic point shown at the canvas center
    pub center: GeoCoord,
    /// World → view rotation. View axes: x right, y up, z towards the viewer.
    pub orientation: UnitQuaternion<f64>,
}

impl Viewport {
    /// Creates a viewport looking at `center`
    pub fn new(projection: Projection, width: u32, height: u32, radius: i32, center: GeoCoord) -> Self {
        Self {
            projection,
            width,
            height,
            radius: radius.max(1),
            center,
            orientation: orientation_facing(center),
        }
    }

    /// Sets the center and recomputes the orientation accordingly
    pub fn set_center(&mut self, center: GeoCoord) {
        self.center = center;
        self.orientation = orientation_facing(center);
    }

    pub fn set_radius(&mut self, radius: i32) {
        self.radius = radius.max(1);
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Radians of longitude covered by one pixel on flat projections
    pub fn flat_scale(&self) -> f64 {
        FRAC_PI_2 / self.radius as f64
    }

    /// Pixel offset of `(x, y)` from the canvas center, integer-exact
    pub fn center_offset(&self, x: u32, y: u32) -> (i64, i64) {
        (
            x as i64 - (self.width / 2) as i64,
            y as i64 - (self.height / 2) as i64,
        )
    }

    /// Whether the pixel lies on the visible globe disk.
    ///
    /// Points with `dx² + dy² == radius²` are outside.
    pub fn is_on_globe(&self, dx: i64, dy: i64) -> bool {
        let r = self.radius as i64;
        dx * dx + dy * dy < r * r
    }

    /// Inverse projection of one canvas pixel. `None` for pixels off the map.
    pub fn geo_at(&self, x: u32, y: u32) -> Option<GeoCoord> {
        let (dx, dy) = self.center_offset(x, y);
        match self.projection {
            Projection::Spherical => self.globe_geo_at(dx, dy),
            Projection::Equirectangular => {
                let scale = self.flat_scale();
                let lat = self.center.lat - dy as f64 * scale;
                if lat.abs() > FRAC_PI_2 {
                    return None;
                }
                let lon = GeoCoord::wrap_lon(self.center.lon + dx as f64 * scale);
                Some(GeoCoord::new(lon, lat))
            }
            Projection::Mercator => {
                let scale = self.flat_scale();
                let y = inverse_gd(self.center.lat) - dy as f64 * scale;
                if y.abs() > PI {
                    return None;
                }
                let lon = GeoCoord::wrap_lon(self.center.lon + dx as f64 * scale);
                Some(GeoCoord::new(lon, gd(y)))
            }
        }
    }

    /// Globe hit test: reconstructs the sphere point under `(dx, dy)` and rotates it
    /// back into world space.
    pub fn globe_geo_at(&self, dx: i64, dy: i64) -> Option<GeoCoord> {
        if !self.is_on_globe(dx, dy) {
            return None;
        }
        let r = self.radius as f64;
        let qx = dx as f64 / r;
        let qy = -(dy as f64) / r;
        let qz = (1.0 - qx * qx - qy * qy).max(0.0).sqrt();
        Some(self.view_to_geo(Vector3::new(qx, qy, qz)))
    }

    /// Rotates a unit view-space vector into world space and converts it to a coordinate
    pub fn view_to_geo(&self, view: Vector3<f64>) -> GeoCoord {
        let world = self.orientation.inverse_transform_vector(&view);
        GeoCoord::from_unit_vector([world.x, world.y, world.z])
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Projection::Spherical, 640, 480, 180, GeoCoord::default())
    }
}

/// World → view rotation that puts `center` in front of the viewer with north up.
pub fn orientation_facing(center: GeoCoord) -> UnitQuaternion<f64> {
    let (sin_lat, cos_lat) = center.lat.sin_cos();
    let (sin_lon, cos_lon) = center.lon.sin_cos();

    let east = Vector3::new(-sin_lon, cos_lon, 0.0);
    let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    let forward = Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

    let matrix = Matrix3::from_rows(&[east.transpose(), north.transpose(), forward.transpose()]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(matrix))
}
