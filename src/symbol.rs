pub mod anchors;
pub mod bucket;
pub mod feature;
pub mod glyphs;
pub mod layout;
pub mod merge_lines;
pub mod quads;
pub mod script;
pub mod shaping;
pub mod style;
pub mod tagged_string;
pub mod variable_anchor;

pub use anchors::{Anchor, LabelExtent, get_anchors, get_center_anchor};
pub use bucket::{
    BucketOptions, CollisionArrays, CollisionDebug, CollisionDebugBox, PlacedSymbol, SortKeyRange, SymbolBucket,
    SymbolInstance, TextCollision,
};
pub use feature::{GeometryType, SymbolFeature};
pub use glyphs::{Formatted, GlyphMap, GlyphMetrics, GlyphPositions, ImagePosition, ImagePositions, ONE_EM};
pub use layout::{LayoutResources, anchor_is_too_close, perform_symbol_layout};
pub use merge_lines::merge_lines;
pub use shaping::{BidiProcessor, Shaping, TextShaper, WritingMode};
pub use style::{SymbolLayout, SymbolPaint, SymbolPlacement, TextAnchor, TextJustify};
