pub mod camera;
#[cfg(feature = "cli")]
pub mod cli;
pub mod collision;
pub mod config;
pub mod debug_render;
pub mod dump;
pub mod error;
pub mod geometry;
pub mod glyph_metrics;
pub mod placement;
pub mod scene;
pub mod symbol;
pub mod tile;
pub mod warn;

#[cfg(feature = "cli")]
pub use cli::run;
pub use collision::{CollisionSpace, OverlapMode, SpatialGrid};
pub use config::{Config, load_config};
pub use error::PlacementError;
pub use placement::{Placement, PlacementEngine};
pub use symbol::{SymbolBucket, TextShaper, get_anchors, perform_symbol_layout};
