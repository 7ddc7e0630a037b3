use serde::{Deserialize, Serialize};

/// Number of tile units along one side of a tile.
pub const EXTENT: f64 = 8192.0;

/// Source tile size in CSS pixels at its own zoom level.
pub const TILE_SIZE: f64 = 512.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalTileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl CanonicalTileId {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverscaledTileId {
    pub overscaled_z: u8,
    #[serde(default)]
    pub wrap: i32,
    pub canonical: CanonicalTileId,
}

impl OverscaledTileId {
    pub fn new(overscaled_z: u8, wrap: i32, z: u8, x: u32, y: u32) -> Self {
        Self {
            overscaled_z: overscaled_z.max(z),
            wrap,
            canonical: CanonicalTileId::new(z, x, y),
        }
    }

    pub fn overscale_factor(&self) -> f64 {
        2f64.powi(i32::from(self.overscaled_z) - i32::from(self.canonical.z))
    }

    /// Pixel size of the tile when drawn at `overscaled_z`.
    pub fn tile_size(&self) -> f64 {
        TILE_SIZE * self.overscale_factor()
    }

    /// Tile x position with world copies unwrapped.
    pub fn unwrapped_x(&self) -> f64 {
        f64::from(self.canonical.x) + f64::from(self.wrap) * 2f64.powi(i32::from(self.canonical.z))
    }

    /// Converts a tile-unit point to longitude/latitude degrees.
    pub fn tile_to_lng_lat(&self, x: f64, y: f64) -> (f64, f64) {
        let scale = 2f64.powi(i32::from(self.canonical.z));
        let world_x = (self.unwrapped_x() + x / EXTENT) / scale;
        let world_y = (f64::from(self.canonical.y) + y / EXTENT) / scale;
        let lng = world_x * 360.0 - 180.0;
        let y2 = 180.0 - world_y * 360.0;
        let lat = 360.0 / std::f64::consts::PI * (y2 * std::f64::consts::PI / 180.0).exp().atan() - 90.0;
        (lng, lat)
    }

    /// Converts longitude/latitude degrees back into this tile's units.
    pub fn lng_lat_to_tile(&self, lng: f64, lat: f64) -> (f64, f64) {
        let scale = 2f64.powi(i32::from(self.canonical.z));
        let world_x = (180.0 + lng) / 360.0;
        let world_y = (180.0
            - 180.0 / std::f64::consts::PI
                * (std::f64::consts::PI / 4.0 + lat * std::f64::consts::PI / 360.0)
                    .tan()
                    .ln())
            / 360.0;
        (
            (world_x * scale - self.unwrapped_x()) * EXTENT,
            (world_y * scale - f64::from(self.canonical.y)) * EXTENT,
        )
    }
}
