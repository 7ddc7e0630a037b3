// Collision debug view: the viewport boxes and circles tested by the last placement,
// drawn as SVG and optionally rasterised.

use crate::collision::VIEWPORT_PADDING;
use crate::config::RenderConfig;
use crate::scene::PreparedScene;
use crate::symbol::bucket::{CollisionDebugBox, DebugBoxKind, SymbolBucket};
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

pub fn render_collision_svg(scene: &PreparedScene, config: &RenderConfig) -> String {
    let width = config.width.max(1.0);
    let height = config.height.max(1.0);
    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        config.background
    );

    for bucket in scene.buckets() {
        render_bucket(&mut svg, bucket, config);
    }

    svg.push_str("</svg>");
    svg
}

fn render_bucket(svg: &mut String, bucket: &SymbolBucket, config: &RenderConfig) {
    if let Some(debug) = &bucket.collision_debug {
        for debug_box in &debug.boxes {
            if !was_tested(debug_box) {
                continue;
            }
            let [x1, y1, x2, y2] = debug_box.viewport_box;
            let _ = write!(
                svg,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
                x1,
                y1,
                (x2 - x1).max(0.0),
                (y2 - y1).max(0.0),
                box_color(debug_box, config),
                config.stroke_width
            );

            if debug_box.kind == DebugBoxKind::Text
                && !debug_box.vertical
                && debug_box.placed
                && let Some(instance) = bucket.symbol_instances.get(debug_box.symbol_index)
                && !instance.key.is_empty()
            {
                let _ = write!(
                    svg,
                    "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"sans-serif\" font-size=\"10\" text-anchor=\"middle\" dominant-baseline=\"central\" fill=\"{}\">{}</text>",
                    (x1 + x2) / 2.0,
                    (y1 + y2) / 2.0,
                    config.anchor_color,
                    escape_xml(&instance.key)
                );
            }
        }
    }

    for circle in &bucket.collision_circles {
        let color = if circle.collision {
            &config.collision_color
        } else {
            &config.circle_color
        };
        let _ = write!(
            svg,
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            circle.x, circle.y, circle.radius, color, config.stroke_width
        );
    }
}

/// Boxes of symbols placement never reached (duplicates of a label placed in another
/// tile, or frames without debug data) carry no viewport box.
fn was_tested(debug_box: &CollisionDebugBox) -> bool {
    debug_box
        .viewport_box
        .iter()
        .any(|&v| v != 0.0 && v != -VIEWPORT_PADDING)
}

fn box_color<'a>(debug_box: &CollisionDebugBox, config: &'a RenderConfig) -> &'a str {
    if debug_box.not_used {
        &config.unused_box_color
    } else if !debug_box.placed {
        &config.collision_color
    } else {
        match debug_box.kind {
            DebugBoxKind::Text => &config.text_box_color,
            DebugBoxKind::Icon => &config.icon_box_color,
        }
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, svg)?,
        None => print!("{svg}"),
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, config: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.default_size = usvg::Size::from_wh(config.width, config.height)
        .ok_or_else(|| anyhow::anyhow!("invalid render size {}x{}", config.width, config.height))?;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _config: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the 'png' feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
