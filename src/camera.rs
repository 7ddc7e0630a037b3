// Minimal camera model: enough of the map transform to project tile-space label
// geometry into the viewport.

use crate::geometry::Point;
use crate::tile::{EXTENT, OverscaledTileId, TILE_SIZE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const DEFAULT_FOV: f64 = 0.6435011087932844;

/// Column-major 4×4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [f64; 16]);

impl Default for Mat4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat4 {
    pub fn identity() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Self(m)
    }

    pub fn perspective(fovy: f64, aspect: f64, near: f64, far: f64) -> Self {
        let f = 1.0 / (fovy / 2.0).tan();
        let nf = 1.0 / (near - far);
        let mut m = [0.0; 16];
        m[0] = f / aspect;
        m[5] = f;
        m[10] = (far + near) * nf;
        m[11] = -1.0;
        m[14] = 2.0 * far * near * nf;
        Self(m)
    }

    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
            }
        }
        Mat4(out)
    }

    pub fn translate(&self, x: f64, y: f64, z: f64) -> Mat4 {
        let mut t = Mat4::identity();
        t.0[12] = x;
        t.0[13] = y;
        t.0[14] = z;
        self.mul(&t)
    }

    pub fn scale(&self, x: f64, y: f64, z: f64) -> Mat4 {
        let mut s = Mat4::identity();
        s.0[0] = x;
        s.0[5] = y;
        s.0[10] = z;
        self.mul(&s)
    }

    pub fn rotate_x(&self, rad: f64) -> Mat4 {
        let (s, c) = rad.sin_cos();
        let mut r = Mat4::identity();
        r.0[5] = c;
        r.0[6] = s;
        r.0[9] = -s;
        r.0[10] = c;
        self.mul(&r)
    }

    pub fn rotate_z(&self, rad: f64) -> Mat4 {
        let (s, c) = rad.sin_cos();
        let mut r = Mat4::identity();
        r.0[0] = c;
        r.0[1] = s;
        r.0[4] = -s;
        r.0[5] = c;
        self.mul(&r)
    }

    pub fn transform_vec4(&self, v: [f64; 4]) -> [f64; 4] {
        let m = &self.0;
        let mut out = [0.0; 4];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = (0..4).map(|col| m[col * 4 + row] * v[col]).sum();
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
    /// Degrees, clockwise.
    pub bearing: f64,
    /// Degrees from the nadir.
    pub pitch: f64,
    pub center_lng: f64,
    pub center_lat: f64,
    pub fov: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            width: 512.0,
            height: 512.0,
            zoom: 0.0,
            bearing: 0.0,
            pitch: 0.0,
            center_lng: 0.0,
            center_lat: 0.0,
            fov: DEFAULT_FOV,
        }
    }
}

impl Transform {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Map rotation in radians, counter-clockwise.
    pub fn angle(&self) -> f64 {
        -self.bearing * PI / 180.0
    }

    pub fn bearing_in_radians(&self) -> f64 {
        self.bearing * PI / 180.0
    }

    pub fn pitch_in_radians(&self) -> f64 {
        self.pitch * PI / 180.0
    }

    pub fn zoom_fraction(&self) -> f64 {
        self.zoom - self.zoom.floor()
    }

    pub fn camera_to_center_distance(&self) -> f64 {
        0.5 / (self.fov / 2.0).tan() * self.height
    }

    /// Centre of the viewport in world pixels.
    pub fn center_point(&self) -> Point {
        let world = self.world_size();
        let x = (180.0 + self.center_lng) / 360.0 * world;
        let y = (180.0
            - 180.0 / PI * (PI / 4.0 + self.center_lat * PI / 360.0).tan().ln())
            / 360.0
            * world;
        Point::new(x, y)
    }

    fn far_z(&self) -> f64 {
        let half_fov = self.fov / 2.0;
        let pitch = self.pitch_in_radians();
        let ground_angle = PI / 2.0 + pitch;
        let d = self.camera_to_center_distance();
        let top_half = half_fov.sin() * d / (PI - ground_angle - half_fov).clamp(0.01, PI - 0.01).sin();
        let furthest = (PI / 2.0 - pitch).cos() * top_half + d;
        furthest * 1.01
    }

    /// World-pixel to clip-space matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        let d = self.camera_to_center_distance();
        let center = self.center_point();
        Mat4::perspective(self.fov, self.width / self.height, self.height / 50.0, self.far_z())
            .scale(1.0, -1.0, 1.0)
            .translate(0.0, 0.0, -d)
            .rotate_x(self.pitch_in_radians())
            .rotate_z(self.angle())
            .translate(-center.x, -center.y, 0.0)
    }

    /// Tile-unit to clip-space matrix for one tile.
    pub fn tile_matrix(&self, tile_id: &OverscaledTileId) -> Mat4 {
        let scale = self.world_size() / 2f64.powi(i32::from(tile_id.canonical.z));
        self.projection_matrix()
            .translate(
                tile_id.unwrapped_x() * scale,
                f64::from(tile_id.canonical.y) * scale,
                0.0,
            )
            .scale(scale / EXTENT, scale / EXTENT, 1.0)
    }
}

/// Hooks for map projections other than flat web mercator.
pub trait SymbolProjection: Send + Sync {
    /// Whether symbols must be projected with [`SymbolProjection::project_tile_point`]
    /// instead of the tile matrix.
    fn use_special_projection_for_symbols(&self) -> bool {
        false
    }

    fn is_occluded(&self, _x: f64, _y: f64, _tile_id: &OverscaledTileId) -> bool {
        false
    }

    /// Scale correction for pitched text under curved projections.
    fn pitched_text_correction(
        &self,
        _transform: &Transform,
        _anchor: Point,
        _tile_id: &OverscaledTileId,
    ) -> f64 {
        1.0
    }

    /// Projects a tile point into clip space, returning `[x, y, z, w]`.
    fn project_tile_point(
        &self,
        x: f64,
        y: f64,
        z: f64,
        tile_id: &OverscaledTileId,
        transform: &Transform,
    ) -> [f64; 4] {
        transform.tile_matrix(tile_id).transform_vec4([x, y, z, 1.0])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MercatorProjection;

impl SymbolProjection for MercatorProjection {}
