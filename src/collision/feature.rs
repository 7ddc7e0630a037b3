use crate::geometry::Point;
use serde::Serialize;
use std::ops::Range;

/// Tile-space collision rectangle relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionBox {
    pub anchor: Point,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub feature_index: u32,
    pub source_layer_index: u32,
    pub bucket_index: u32,
}

/// Extents of a shaped text block or positioned icon, in glyph-metric units.
pub trait ShapedExtents {
    /// `[left, top, right, bottom]`, with any icon text-fit stretching already applied.
    fn extents(&self) -> [f64; 4];

    /// Extra padding in CSS order `[left, top, right, bottom]`.
    fn collision_padding(&self) -> Option<[f64; 4]> {
        None
    }
}

/// Collision geometry of one label part: a range into the bucket's box array and,
/// for line-aligned labels, the diameter of the circles laid along the line at runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelGeometry {
    pub boxes: Range<usize>,
    pub circle_diameter: Option<f64>,
}

impl LabelGeometry {
    pub fn empty_at(index: usize) -> Self {
        Self {
            boxes: index..index,
            circle_diameter: None,
        }
    }

    pub fn has_box(&self) -> bool {
        !self.boxes.is_empty()
    }
}

/// Identifies the feature a box belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureRef {
    pub feature_index: u32,
    pub source_layer_index: u32,
    pub bucket_index: u32,
}

pub struct LabelGeometryBuilder<'a> {
    boxes: &'a mut Vec<CollisionBox>,
}

impl<'a> LabelGeometryBuilder<'a> {
    pub fn new(boxes: &'a mut Vec<CollisionBox>) -> Self {
        Self { boxes }
    }

    /// Builds the collision geometry for one shaped label part.
    ///
    /// Line-aligned parts get no box, only a circle diameter which is floored at 10.
    /// A part whose padded height is not positive gets neither. Point parts get one box,
    /// padded with `padding` (CSS order `[top, right, bottom, left]`) and rotated by
    /// `rotate` degrees.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        anchor: Point,
        feature: FeatureRef,
        shaped: &dyn ShapedExtents,
        box_scale: f64,
        padding: [f64; 4],
        align_line: bool,
        rotate: f64,
    ) -> LabelGeometry {
        let start = self.boxes.len();
        let [left, top, right, bottom] = shaped.extents();
        let collision_padding = shaped.collision_padding();

        if align_line {
            let mut top = top;
            let mut bottom = bottom;
            if let Some(p) = collision_padding {
                top -= p[1];
                bottom += p[3];
            }
            let height = bottom - top;
            let circle_diameter = (height > 0.0).then(|| height.max(10.0));
            return LabelGeometry {
                boxes: start..start,
                circle_diameter,
            };
        }

        let mut y1 = top * box_scale - padding[0];
        let mut y2 = bottom * box_scale + padding[2];
        let mut x1 = left * box_scale - padding[3];
        let mut x2 = right * box_scale + padding[1];

        if let Some(p) = collision_padding {
            x1 -= p[0] * box_scale;
            y1 -= p[1] * box_scale;
            x2 += p[2] * box_scale;
            y2 += p[3] * box_scale;
        }

        if rotate != 0.0 {
            let radians = rotate.to_radians();
            let corners = [
                Point::new(x1, y1).rotate(radians),
                Point::new(x2, y1).rotate(radians),
                Point::new(x1, y2).rotate(radians),
                Point::new(x2, y2).rotate(radians),
            ];
            x1 = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
            x2 = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
            y1 = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
            y2 = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        }

        self.boxes.push(CollisionBox {
            anchor,
            x1,
            y1,
            x2,
            y2,
            feature_index: feature.feature_index,
            source_layer_index: feature.source_layer_index,
            bucket_index: feature.bucket_index,
        });

        LabelGeometry {
            boxes: start..self.boxes.len(),
            circle_diameter: None,
        }
    }
}
