use crate::collision::CollisionBox;
use crate::geometry::Point;
use crate::symbol::bucket::{
    BucketOptions, BufferKind, CollisionArrays, SymbolBucket, SymbolInstance, TextCollision,
};
use crate::symbol::glyphs::Rect;
use crate::symbol::quads::SymbolQuad;
use crate::symbol::shaping::WritingMode;
use crate::symbol::style::{SymbolLayout, SymbolPaint};
use crate::tile::OverscaledTileId;

/// A point label with one glyph quad and a text box of `width` x `height` tile units
/// centered on its anchor.
#[derive(Debug, Clone, Copy)]
pub struct TestLabel {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub cross_tile_id: u32,
}

impl TestLabel {
    pub fn new(x: f64, y: f64, cross_tile_id: u32) -> Self {
        Self {
            x,
            y,
            width: 320.0,
            height: 160.0,
            cross_tile_id,
        }
    }
}

fn glyph_quad() -> SymbolQuad {
    SymbolQuad {
        tl: Point::new(-5.0, -5.0),
        tr: Point::new(5.0, -5.0),
        bl: Point::new(-5.0, 5.0),
        br: Point::new(5.0, 5.0),
        tex: Rect::default(),
        writing_mode: Some(WritingMode::Horizontal),
        glyph_offset: [0.0, 0.0],
        is_sdf: true,
        section_index: 0,
    }
}

pub fn label_bucket(
    bucket_instance_id: u32,
    source_id: &str,
    layout: SymbolLayout,
    labels: &[TestLabel],
) -> SymbolBucket {
    let options = BucketOptions {
        source_id: source_id.to_string(),
        tile_id: OverscaledTileId::new(0, 0, 0, 0, 0),
        ..BucketOptions::default()
    };
    let mut bucket = SymbolBucket::new(options, layout, SymbolPaint::default());
    bucket.bucket_instance_id = bucket_instance_id;

    for (feature_index, label) in labels.iter().enumerate() {
        let anchor = Point::new(label.x, label.y);
        let placed = bucket.add_symbols(
            BufferKind::Text,
            vec![glyph_quad()],
            16.0,
            [0.0, 0.0],
            WritingMode::Horizontal,
            anchor,
            None,
            0..0,
            None,
        );
        let box_index = bucket.collision_boxes.len();
        bucket.collision_boxes.push(CollisionBox {
            anchor,
            x1: -label.width / 2.0,
            y1: -label.height / 2.0,
            x2: label.width / 2.0,
            y2: label.height / 2.0,
            feature_index: feature_index as u32,
            source_layer_index: 0,
            bucket_index: 0,
        });
        bucket.symbol_instances.push(SymbolInstance {
            anchor,
            right_justified_text: None,
            center_justified_text: Some(placed),
            left_justified_text: None,
            vertical_text: None,
            placed_icon: None,
            vertical_placed_icon: None,
            key: format!("label-{}", label.cross_tile_id),
            feature_index: feature_index as u32,
            num_horizontal_glyph_vertices: 4,
            num_vertical_glyph_vertices: 0,
            num_icon_vertices: 0,
            num_vertical_icon_vertices: 0,
            collision: CollisionArrays {
                text: TextCollision::Boxes {
                    horizontal: Some(box_index),
                    vertical: None,
                },
                icon: None,
                vertical_icon: None,
            },
            cross_tile_id: label.cross_tile_id,
            text_box_scale: 1.0,
            text_anchor_offsets: 0..0,
        });
    }
    bucket
}
