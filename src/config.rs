use crate::symbol::bucket::DEFAULT_MAX_GLYPHS;
use crate::tile::EXTENT;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Glyph capacity of one bucket; features past it are dropped with a warning.
    pub max_glyphs: usize,
    /// Extent of feature coordinates in scene files.
    pub tile_extent: f64,
    pub merge_lines: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_glyphs: DEFAULT_MAX_GLYPHS,
            tile_extent: EXTENT,
            merge_lines: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub fade_duration_ms: f64,
    pub cross_source_collisions: bool,
    pub show_collision_boxes: bool,
    /// Time between simulated frames.
    pub frame_interval_ms: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: 300.0,
            cross_source_collisions: true,
            show_collision_boxes: false,
            frame_interval_ms: 16.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub text_box_color: String,
    pub icon_box_color: String,
    pub unused_box_color: String,
    pub circle_color: String,
    pub collision_color: String,
    pub anchor_color: String,
    pub stroke_width: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 512.0,
            height: 512.0,
            background: "#FFFFFF".to_string(),
            text_box_color: "#1F77B4".to_string(),
            icon_box_color: "#2CA02C".to_string(),
            unused_box_color: "#BBBBBB".to_string(),
            circle_color: "#9467BD".to_string(),
            collision_color: "#D62728".to_string(),
            anchor_color: "#333333".to_string(),
            stroke_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub placement: PlacementConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    max_glyphs: Option<usize>,
    tile_extent: Option<f64>,
    merge_lines: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacementConfigFile {
    fade_duration: Option<f64>,
    cross_source_collisions: Option<bool>,
    show_collision_boxes: Option<bool>,
    frame_interval: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
    text_box_color: Option<String>,
    icon_box_color: Option<String>,
    unused_box_color: Option<String>,
    circle_color: Option<String>,
    collision_color: Option<String>,
    anchor_color: Option<String>,
    stroke_width: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    placement: Option<PlacementConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Applies the overrides in `contents` (JSON5) on top of the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.max_glyphs {
            config.layout.max_glyphs = v;
        }
        if let Some(v) = layout.tile_extent {
            if v <= 0.0 {
                anyhow::bail!("layout.tileExtent must be positive, got {v}");
            }
            config.layout.tile_extent = v;
        }
        if let Some(v) = layout.merge_lines {
            config.layout.merge_lines = v;
        }
    }

    if let Some(placement) = parsed.placement {
        if let Some(v) = placement.fade_duration {
            if v < 0.0 {
                anyhow::bail!("placement.fadeDuration must not be negative, got {v}");
            }
            config.placement.fade_duration_ms = v;
        }
        if let Some(v) = placement.cross_source_collisions {
            config.placement.cross_source_collisions = v;
        }
        if let Some(v) = placement.show_collision_boxes {
            config.placement.show_collision_boxes = v;
        }
        if let Some(v) = placement.frame_interval {
            config.placement.frame_interval_ms = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
        if let Some(v) = render.text_box_color {
            config.render.text_box_color = v;
        }
        if let Some(v) = render.icon_box_color {
            config.render.icon_box_color = v;
        }
        if let Some(v) = render.unused_box_color {
            config.render.unused_box_color = v;
        }
        if let Some(v) = render.circle_color {
            config.render.circle_color = v;
        }
        if let Some(v) = render.collision_color {
            config.render.collision_color = v;
        }
        if let Some(v) = render.anchor_color {
            config.render.anchor_color = v;
        }
        if let Some(v) = render.stroke_width {
            config.render.stroke_width = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config.layout.max_glyphs, 65535);
        assert_eq!(config.layout.tile_extent, 8192.0);
        assert_eq!(config.placement.fade_duration_ms, 300.0);
        assert!(config.placement.cross_source_collisions);
        assert!(!config.layout.merge_lines);
    }

    #[test]
    fn overrides_are_field_by_field() {
        let config = parse_config(
            r##"{
                // comments and trailing commas are fine
                placement: { fadeDuration: 0, showCollisionBoxes: true, },
                layout: { maxGlyphs: 128, mergeLines: true },
                render: { background: "#000000" },
            }"##,
        )
        .expect("config parses");
        assert_eq!(config.placement.fade_duration_ms, 0.0);
        assert!(config.placement.show_collision_boxes);
        assert!(config.placement.cross_source_collisions);
        assert_eq!(config.placement.frame_interval_ms, 16.0);
        assert_eq!(config.layout.max_glyphs, 128);
        assert!(config.layout.merge_lines);
        assert_eq!(config.render.background, "#000000");
        assert_eq!(config.render.width, 512.0);
    }

    #[test]
    fn negative_fade_duration_is_rejected() {
        let err = parse_config("{ placement: { fadeDuration: -1 } }").unwrap_err();
        assert!(err.to_string().contains("fadeDuration"), "{err}");
    }
}
