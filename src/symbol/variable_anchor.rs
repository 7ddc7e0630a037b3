use super::glyphs::ONE_EM;
use super::style::{SymbolLayout, TextAnchor, TextJustify};
use crate::geometry::Point;

/// Assumed distance from the top of the em box to the baseline, `ONE_EM - 17`.
pub const BASELINE_OFFSET: f64 = 7.0;

/// Marks an offset's y value as "use the x value as a radial offset".
pub const INVALID_TEXT_OFFSET: f64 = f64::INFINITY;

/// Converts a text offset (or a radial offset when `offset[1]` is
/// [`INVALID_TEXT_OFFSET`]) into the x/y shift for `anchor`.
pub fn evaluate_variable_offset(anchor: TextAnchor, offset: [f64; 2]) -> [f64; 2] {
    if offset[1] != INVALID_TEXT_OFFSET {
        from_text_offset(anchor, offset[0], offset[1])
    } else {
        from_radial_offset(anchor, offset[0])
    }
}

fn from_radial_offset(anchor: TextAnchor, radial_offset: f64) -> [f64; 2] {
    let radial = radial_offset.max(0.0);
    // r² + r² = radial²
    let hypotenuse = radial / std::f64::consts::SQRT_2;
    let y = match anchor {
        TextAnchor::TopRight | TextAnchor::TopLeft => hypotenuse - BASELINE_OFFSET,
        TextAnchor::BottomRight | TextAnchor::BottomLeft => -hypotenuse + BASELINE_OFFSET,
        TextAnchor::Bottom => -radial + BASELINE_OFFSET,
        TextAnchor::Top => radial - BASELINE_OFFSET,
        _ => 0.0,
    };
    let x = match anchor {
        TextAnchor::TopRight | TextAnchor::BottomRight => -hypotenuse,
        TextAnchor::TopLeft | TextAnchor::BottomLeft => hypotenuse,
        TextAnchor::Left => radial,
        TextAnchor::Right => -radial,
        _ => 0.0,
    };
    [x, y]
}

fn from_text_offset(anchor: TextAnchor, offset_x: f64, offset_y: f64) -> [f64; 2] {
    let offset_x = offset_x.abs();
    let offset_y = offset_y.abs();
    let y = if anchor.is_top() {
        offset_y - BASELINE_OFFSET
    } else if anchor.is_bottom() {
        -offset_y + BASELINE_OFFSET
    } else {
        0.0
    };
    let x = if anchor.is_right() {
        -offset_x
    } else if anchor.is_left() {
        offset_x
    } else {
        0.0
    };
    [x, y]
}

/// Candidate anchors with their pixel offsets for a layer with variable anchors.
///
/// `text-variable-anchor-offset` wins and is converted from ems with the baseline
/// shift applied. Otherwise `text-variable-anchor` is combined with the radial offset
/// when one is set, or with `text-offset`.
pub fn get_text_variable_anchor_offset(layout: &SymbolLayout) -> Option<Vec<(TextAnchor, Point)>> {
    if let Some(values) = &layout.text_variable_anchor_offset {
        return Some(
            values
                .iter()
                .map(|(anchor, offset)| {
                    let mut y = offset[1] * ONE_EM;
                    if anchor.is_top() {
                        y -= BASELINE_OFFSET;
                    } else if anchor.is_bottom() {
                        y += BASELINE_OFFSET;
                    }
                    (*anchor, Point::new(offset[0] * ONE_EM, y))
                })
                .collect(),
        );
    }

    let anchors = layout.text_variable_anchor.as_ref()?;
    let text_offset = match layout.text_radial_offset {
        Some(radial) => [radial * ONE_EM, INVALID_TEXT_OFFSET],
        None => [layout.text_offset[0] * ONE_EM, layout.text_offset[1] * ONE_EM],
    };
    Some(
        anchors
            .iter()
            .map(|anchor| {
                let [x, y] = evaluate_variable_offset(*anchor, text_offset);
                (*anchor, Point::new(x, y))
            })
            .collect(),
    )
}

/// `(horizontal, vertical)` alignment factors in `[0, 1]`.
pub fn get_anchor_alignment(anchor: TextAnchor) -> (f64, f64) {
    let horizontal = if anchor.is_right() {
        1.0
    } else if anchor.is_left() {
        0.0
    } else {
        0.5
    };
    let vertical = if anchor.is_bottom() {
        1.0
    } else if anchor.is_top() {
        0.0
    } else {
        0.5
    };
    (horizontal, vertical)
}

/// Justification matching the horizontal side of the anchor.
pub fn get_anchor_justification(anchor: TextAnchor) -> TextJustify {
    if anchor.is_right() {
        TextJustify::Right
    } else if anchor.is_left() {
        TextJustify::Left
    } else {
        TextJustify::Center
    }
}
