pub mod feature;
pub mod grid;
pub mod space;

pub use feature::{CollisionBox, FeatureRef, LabelGeometry, LabelGeometryBuilder, ShapedExtents};
pub use grid::{FeatureKey, GridKey, OverlapMode, QueryHit, SpatialGrid, overlap_allowed};
pub use space::{
    CollisionCircle, CollisionSpace, LineLabel, PlacedBox, PlacedCircles, TileProjection,
    VIEWPORT_PADDING,
};
